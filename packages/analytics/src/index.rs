//! Single-pass grouping of incident records.
//!
//! [`RecordIndex::build`] parses every record once, applies the field
//! fallback policy, interns city and crime-type labels, and groups record
//! positions by city, hour, crime type, and (city, hour). Every downstream
//! component reads these groupings instead of rescanning raw records.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;

use chrono::{NaiveDate, NaiveDateTime};
use crime_insight_incident_models::{
    DEFAULT_HOUR, FieldDefect, Gender, IncidentRecord, REQUIRED_FIELD_COUNT, parsing,
};

use crate::risk::percentile;

/// Label used when a record's city or crime type is blank.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Records processed between progress callbacks in
/// [`RecordIndex::build_with_progress`].
pub const INDEX_PROGRESS_CHUNK: usize = 10_000;

/// Interned city identifier, valid for the index that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CityId(usize);

/// Interned crime-type identifier, valid for the index that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CrimeTypeId(usize);

/// A record after parsing and fallback resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedIncident {
    /// City the incident belongs to.
    pub city: CityId,
    /// Crime type of the incident.
    pub crime_type: CrimeTypeId,
    /// Hour of occurrence, [`DEFAULT_HOUR`] when unparsable.
    pub hour: u8,
    /// Date of occurrence.
    pub date: Option<NaiveDate>,
    /// Date and time of occurrence.
    pub occurred_at: Option<NaiveDateTime>,
    /// Victim age.
    pub victim_age: Option<u8>,
    /// Victim gender.
    pub victim_gender: Gender,
    /// Whether a weapon was recorded.
    pub weapon: bool,
    /// Whether the crime type is violent.
    pub violent: bool,
    /// Whether the case is closed.
    pub closed: bool,
    /// Number of well-formed required fields.
    pub quality: u32,
}

#[derive(Default)]
struct Interner {
    names: Vec<String>,
    lookup: HashMap<String, usize>,
}

impl Interner {
    fn intern(&mut self, raw: &str) -> usize {
        let name = raw.trim();
        let name = if name.is_empty() { UNKNOWN_LABEL } else { name };
        if let Some(&id) = self.lookup.get(name) {
            return id;
        }
        let id = self.names.len();
        self.names.push(name.to_string());
        self.lookup.insert(name.to_string(), id);
        id
    }

    fn sorted(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Groupings and cached aggregates over one incident set.
///
/// Built once per analysis run and discarded when the input changes. The
/// city, hour, crime-type, and cell groupings each partition the same set
/// of record positions.
pub struct RecordIndex {
    incidents: Vec<IndexedIncident>,
    cities: Interner,
    crime_types: Interner,
    by_city: Vec<Vec<usize>>,
    by_hour: [Vec<usize>; 24],
    by_crime_type: Vec<Vec<usize>>,
    by_cell: HashMap<(CityId, u8), Vec<usize>>,
    city_quality: Vec<u64>,
    defects: u64,
    cell_p25: f64,
    cell_p75: f64,
}

impl RecordIndex {
    /// Builds the index in a single pass. Never fails: malformed fields
    /// fall back to defaults and lower the data-quality score.
    #[must_use]
    pub fn build(records: &[IncidentRecord]) -> Self {
        let Ok(index) = Self::build_with_progress(records, |_, _| Ok::<(), Infallible>(()));
        index
    }

    /// Builds the index, calling `on_chunk(processed, total)` every
    /// [`INDEX_PROGRESS_CHUNK`] records and once at the end.
    ///
    /// The callback is the build's only yield point; returning an error
    /// aborts the build.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `on_chunk`.
    pub fn build_with_progress<E>(
        records: &[IncidentRecord],
        mut on_chunk: impl FnMut(usize, usize) -> Result<(), E>,
    ) -> Result<Self, E> {
        let mut index = Self {
            incidents: Vec::with_capacity(records.len()),
            cities: Interner::default(),
            crime_types: Interner::default(),
            by_city: Vec::new(),
            by_hour: std::array::from_fn(|_| Vec::new()),
            by_crime_type: Vec::new(),
            by_cell: HashMap::new(),
            city_quality: Vec::new(),
            defects: 0,
            cell_p25: 0.0,
            cell_p75: 0.0,
        };

        for (pos, record) in records.iter().enumerate() {
            if pos > 0 && pos % INDEX_PROGRESS_CHUNK == 0 {
                on_chunk(pos, records.len())?;
            }
            index.insert(pos, record);
        }

        let mut cells: Vec<f64> = index
            .by_cell
            .values()
            .map(|positions| count_f64(positions.len()))
            .collect();
        cells.sort_by(f64::total_cmp);
        index.cell_p25 = percentile(&cells, 0.25);
        index.cell_p75 = percentile(&cells, 0.75);

        if index.defects > 0 {
            log::debug!(
                "Indexed {} records with {} field defect(s)",
                index.incidents.len(),
                index.defects
            );
        }

        on_chunk(records.len(), records.len())?;
        Ok(index)
    }

    fn insert(&mut self, pos: usize, record: &IncidentRecord) {
        let mut defects = 0u32;
        let mut note = |defect: &FieldDefect| {
            log::trace!("Record {}: {defect}", record.report_number);
            defects += 1;
        };

        let hour = parsing::parse_hour(&record.time_occurred)
            .inspect_err(&mut note)
            .unwrap_or(DEFAULT_HOUR);
        let date = parsing::parse_date(&record.date_occurred)
            .inspect_err(&mut note)
            .ok();
        let victim_age = parsing::parse_age(&record.victim_age)
            .inspect_err(&mut note)
            .ok();
        let victim_gender = parsing::parse_gender(&record.victim_gender)
            .inspect_err(&mut note)
            .unwrap_or(Gender::Unknown);
        if record.crime_type.trim().is_empty() {
            note(&FieldDefect::MissingValue);
        }
        let occurred_at = parsing::parse_occurrence(&record.date_occurred, &record.time_occurred).ok();

        let city = CityId(self.cities.intern(&record.city));
        let crime_type = CrimeTypeId(self.crime_types.intern(&record.crime_type));
        if city.0 == self.by_city.len() {
            self.by_city.push(Vec::new());
            self.city_quality.push(0);
        }
        if crime_type.0 == self.by_crime_type.len() {
            self.by_crime_type.push(Vec::new());
        }

        let quality = REQUIRED_FIELD_COUNT.saturating_sub(defects);
        self.defects += u64::from(defects);
        self.city_quality[city.0] += u64::from(quality);

        self.by_city[city.0].push(pos);
        self.by_hour[usize::from(hour)].push(pos);
        self.by_crime_type[crime_type.0].push(pos);
        self.by_cell.entry((city, hour)).or_default().push(pos);

        self.incidents.push(IndexedIncident {
            city,
            crime_type,
            hour,
            date,
            occurred_at,
            victim_age,
            victim_gender,
            weapon: record.involves_weapon(),
            violent: record.is_violent(),
            closed: record.case_closed,
            quality,
        });
    }

    /// Total number of records.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.incidents.len() as u64
    }

    /// Returns `true` if the index holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.incidents.is_empty()
    }

    /// All indexed incidents in input order.
    #[must_use]
    pub fn incidents(&self) -> &[IndexedIncident] {
        &self.incidents
    }

    /// Total number of field defects encountered.
    #[must_use]
    pub const fn defect_count(&self) -> u64 {
        self.defects
    }

    /// Number of distinct cities.
    #[must_use]
    pub fn city_count(&self) -> usize {
        self.by_city.len()
    }

    /// City names, sorted.
    #[must_use]
    pub fn city_names(&self) -> Vec<&str> {
        self.cities.sorted()
    }

    /// Crime-type labels, sorted.
    #[must_use]
    pub fn crime_type_names(&self) -> Vec<&str> {
        self.crime_types.sorted()
    }

    /// Looks up a city by its trimmed name.
    #[must_use]
    pub fn city_id(&self, name: &str) -> Option<CityId> {
        self.cities.lookup.get(name.trim()).copied().map(CityId)
    }

    /// Looks up a crime type by its trimmed label.
    #[must_use]
    pub fn crime_type_id(&self, name: &str) -> Option<CrimeTypeId> {
        self.crime_types.lookup.get(name.trim()).copied().map(CrimeTypeId)
    }

    /// Name of an interned city. Empty for an id from another index.
    #[must_use]
    pub fn city_name(&self, id: CityId) -> &str {
        self.cities.names.get(id.0).map_or("", String::as_str)
    }

    /// Label of an interned crime type. Empty for an id from another index.
    #[must_use]
    pub fn crime_type_name(&self, id: CrimeTypeId) -> &str {
        self.crime_types.names.get(id.0).map_or("", String::as_str)
    }

    fn city_positions(&self, city: CityId) -> &[usize] {
        self.by_city.get(city.0).map_or(&[][..], Vec::as_slice)
    }

    fn resolve<'a>(&'a self, positions: &'a [usize]) -> impl Iterator<Item = &'a IndexedIncident> + 'a {
        positions.iter().map(|&pos| &self.incidents[pos])
    }

    /// Incidents in `city`.
    pub fn city_incidents(&self, city: CityId) -> impl Iterator<Item = &IndexedIncident> {
        self.resolve(self.city_positions(city))
    }

    /// Number of incidents in `city`.
    #[must_use]
    pub fn city_total(&self, city: CityId) -> u64 {
        self.city_positions(city).len() as u64
    }

    /// Incidents during `hour` across all cities.
    pub fn hour_incidents(&self, hour: u8) -> impl Iterator<Item = &IndexedIncident> {
        let positions = self.by_hour.get(usize::from(hour)).map_or(&[][..], Vec::as_slice);
        self.resolve(positions)
    }

    /// Number of incidents during `hour` across all cities.
    #[must_use]
    pub fn hour_count(&self, hour: u8) -> u64 {
        self.by_hour.get(usize::from(hour)).map_or(0, |v| v.len() as u64)
    }

    /// Incident counts for every hour of the day.
    #[must_use]
    pub fn hour_counts(&self) -> [u64; 24] {
        std::array::from_fn(|hour| self.by_hour[hour].len() as u64)
    }

    /// Incidents with crime type `crime_type`.
    pub fn crime_type_incidents(
        &self,
        crime_type: CrimeTypeId,
    ) -> impl Iterator<Item = &IndexedIncident> {
        let positions = self.by_crime_type.get(crime_type.0).map_or(&[][..], Vec::as_slice);
        self.resolve(positions)
    }

    /// Incidents in `city` during `hour`.
    pub fn cell_incidents(&self, city: CityId, hour: u8) -> impl Iterator<Item = &IndexedIncident> {
        let positions = self.by_cell.get(&(city, hour)).map_or(&[][..], Vec::as_slice);
        self.resolve(positions)
    }

    /// Number of incidents in `city` during `hour`.
    #[must_use]
    pub fn cell_count(&self, city: CityId, hour: u8) -> u64 {
        self.by_cell.get(&(city, hour)).map_or(0, |v| v.len() as u64)
    }

    /// 25th and 75th percentiles of all non-empty (city, hour) cell counts.
    #[must_use]
    pub const fn cell_percentiles(&self) -> (f64, f64) {
        (self.cell_p25, self.cell_p75)
    }

    /// Fraction of required fields that are well-formed across `city`.
    #[must_use]
    pub fn city_data_quality(&self, city: CityId) -> f64 {
        let records = self.city_positions(city).len() as u64;
        quality_fraction(self.city_quality.get(city.0).copied().unwrap_or(0), records)
    }

    /// Fraction of required fields that are well-formed across all records.
    #[must_use]
    pub fn data_quality(&self) -> f64 {
        quality_fraction(self.city_quality.iter().sum(), self.total())
    }

    /// Record totals of the city, hour, crime-type, and cell groupings.
    #[must_use]
    pub fn grouping_totals(&self) -> [u64; 4] {
        let len = |positions: &Vec<usize>| positions.len() as u64;
        [
            self.by_city.iter().map(len).sum(),
            self.by_hour.iter().map(len).sum(),
            self.by_crime_type.iter().map(len).sum(),
            self.by_cell.values().map(len).sum(),
        ]
    }
}

fn quality_fraction(well_formed: u64, records: u64) -> f64 {
    if records == 0 {
        return 0.0;
    }
    ratio(well_formed, records * u64::from(REQUIRED_FIELD_COUNT))
}

/// `numerator / denominator` as `f64`, zero when the denominator is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

#[allow(clippy::cast_precision_loss)]
const fn count_f64(n: usize) -> f64 {
    n as f64
}

/// Returns the key with the highest count; ties go to the smallest key.
pub(crate) fn mode<K: Ord + Copy>(counts: &BTreeMap<K, u64>) -> Option<K> {
    let mut best: Option<(K, u64)> = None;
    for (&key, &count) in counts {
        if best.is_none_or(|(_, top)| count > top) {
            best = Some((key, count));
        }
    }
    best.map(|(key, _)| key)
}

/// Most frequent crime-type label among `incidents`; ties go to the
/// lexicographically smallest label.
pub(crate) fn modal_crime_type<'a>(
    index: &'a RecordIndex,
    incidents: impl Iterator<Item = &'a IndexedIncident>,
) -> Option<&'a str> {
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for incident in incidents {
        *counts.entry(index.crime_type_name(incident.crime_type)).or_default() += 1;
    }
    mode(&counts)
}
