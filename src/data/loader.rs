use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::Deserialize;

use super::classify::{GroupKey, classify};
use super::error::DataError;
use super::model::{Sample, Series, SubjectId, SubjectInfo};

// ---------------------------------------------------------------------------
// Column names
// ---------------------------------------------------------------------------

const FLOW: &[&str] = &["Flow [L/s]"];
const VOLUME: &[&str] = &["V_tidal [L]"];
const CHEST: &[&str] = &["Chest [mm]"];
const ABDOMEN: &[&str] = &["Abd [mm]"];
const PRESSURE: &[&str] = &["Pressure [cmH2O]"];
const GROUP: &[&str] = &["group", "Group"];

/// Which time column a view reads, in fallback order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesSchema {
    pub time: &'static [&'static str],
}

impl SeriesSchema {
    /// Flow/volume recordings.
    pub const VENTILATION: SeriesSchema = SeriesSchema {
        time: &["Time [s]", "Time (Aeration Data)_[s]"],
    };

    /// Chest/abdomen recordings, which are timed against the aeration data.
    pub const AERATION: SeriesSchema = SeriesSchema {
        time: &["Time (Aeration Data)_[s]", "Time [s]"],
    };
}

// ---------------------------------------------------------------------------
// Dataset folder
// ---------------------------------------------------------------------------

/// Anything that can produce a subject's series. The aggregator loads through
/// this so it does not care where samples come from.
pub trait SeriesSource {
    fn load_series(
        &self,
        id: SubjectId,
        schema: SeriesSchema,
        max_time: f64,
    ) -> Result<Series, DataError>;
}

/// A dataset folder on disk.
///
/// ```text
///  <root>/subject-info.csv
///  <root>/grouped_data.csv                       (optional)
///  <root>/viewer.json                            (optional)
///  <root>/Processed_Dataset/ProcessedData_SubjectNN.csv
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    root: PathBuf,
}

impl Dataset {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Dataset { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the folder looks like a dataset (has a subject table).
    pub fn looks_valid(&self) -> bool {
        self.subject_info_path().is_file()
    }

    pub fn subject_info_path(&self) -> PathBuf {
        self.root.join("subject-info.csv")
    }

    pub fn grouped_table_path(&self) -> PathBuf {
        self.root.join("grouped_data.csv")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("viewer.json")
    }

    pub fn series_path(&self, id: SubjectId) -> PathBuf {
        self.root
            .join("Processed_Dataset")
            .join(format!("{}.csv", id.file_stem()))
    }

    pub fn load_subjects(&self) -> Result<Vec<SubjectInfo>, DataError> {
        let path = self.subject_info_path();
        let file = open(&path)?;
        let subjects = read_subject_info(file, &path)?;
        log::info!("Loaded {} subjects from {}", subjects.len(), path.display());
        Ok(subjects)
    }

    /// Load the precomputed group means, if the dataset ships them.
    pub fn load_grouped_table(
        &self,
        schema: SeriesSchema,
        max_time: f64,
    ) -> Option<Result<BTreeMap<GroupKey, Series>, DataError>> {
        let path = self.grouped_table_path();
        if !path.is_file() {
            return None;
        }
        Some(open(&path).and_then(|file| read_grouped_table(file, &path, schema, max_time)))
    }
}

impl SeriesSource for Dataset {
    fn load_series(
        &self,
        id: SubjectId,
        schema: SeriesSchema,
        max_time: f64,
    ) -> Result<Series, DataError> {
        let path = self.series_path(id);
        let file = open(&path)?;
        let series = read_series(file, &path, schema, max_time)?;
        log::info!("Loaded subject {id}: {} samples", series.len());
        Ok(series)
    }
}

fn open(path: &Path) -> Result<File, DataError> {
    File::open(path).map_err(|source| DataError::Unavailable {
        path: path.to_path_buf(),
        source,
    })
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader)
}

// ---------------------------------------------------------------------------
// Samples table
// ---------------------------------------------------------------------------

/// Resolved column positions for one samples table.
struct SampleColumns {
    time: usize,
    flow: Option<usize>,
    volume: Option<usize>,
    chest: Option<usize>,
    abdomen: Option<usize>,
    pressure: Option<usize>,
}

impl SampleColumns {
    fn resolve(headers: &StringRecord, path: &Path, schema: SeriesSchema) -> Result<Self, DataError> {
        let time = find_column(headers, schema.time).ok_or_else(|| DataError::MissingColumn {
            path: path.to_path_buf(),
            column: schema.time[0].to_string(),
        })?;
        Ok(SampleColumns {
            time,
            flow: find_column(headers, FLOW),
            volume: find_column(headers, VOLUME),
            chest: find_column(headers, CHEST),
            abdomen: find_column(headers, ABDOMEN),
            pressure: find_column(headers, PRESSURE),
        })
    }

    /// Parse one row. Unparseable cells become NaN, absent columns read as 0.
    fn sample(&self, record: &StringRecord) -> Sample {
        let cell = |idx: Option<usize>| match idx {
            Some(i) => parse_cell(record.get(i).unwrap_or("")),
            None => 0.0,
        };
        Sample {
            time: parse_cell(record.get(self.time).unwrap_or("")),
            flow: cell(self.flow),
            volume: cell(self.volume).max(0.0),
            chest: cell(self.chest),
            abdomen: cell(self.abdomen),
            pressure: cell(self.pressure),
        }
    }
}

/// First header matching any of `names`, in the order given.
fn find_column(headers: &StringRecord, names: &[&str]) -> Option<usize> {
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == *name))
}

fn parse_cell(s: &str) -> f64 {
    s.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Read a per-subject samples table, keeping rows in `[0, max_time]`.
///
/// Rows with a NaN anywhere are dropped here so downstream arithmetic never
/// sees one. The volume cell is checked before clamping, since `f64::max`
/// turns NaN into 0.
pub fn read_series<R: Read>(
    reader: R,
    path: &Path,
    schema: SeriesSchema,
    max_time: f64,
) -> Result<Series, DataError> {
    let malformed = |source: csv::Error| DataError::Malformed {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv_reader(reader);
    let headers = reader.headers().map_err(malformed)?.clone();
    let columns = SampleColumns::resolve(&headers, path, schema)?;

    let mut samples = Vec::new();
    let mut dropped = 0usize;
    for result in reader.records() {
        let record = result.map_err(malformed)?;
        let volume_nan = columns
            .volume
            .is_some_and(|i| parse_cell(record.get(i).unwrap_or("")).is_nan());
        let sample = columns.sample(&record);
        if volume_nan || sample.has_nan() {
            dropped += 1;
            continue;
        }
        if sample.time < 0.0 || sample.time > max_time {
            continue;
        }
        samples.push(sample);
    }
    if dropped > 0 {
        log::debug!("{}: dropped {dropped} rows with missing values", path.display());
    }
    Ok(Series::new(samples))
}

/// Read a precomputed group-mean table (`group` column plus sample columns).
pub fn read_grouped_table<R: Read>(
    reader: R,
    path: &Path,
    schema: SeriesSchema,
    max_time: f64,
) -> Result<BTreeMap<GroupKey, Series>, DataError> {
    let malformed = |source: csv::Error| DataError::Malformed {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv_reader(reader);
    let headers = reader.headers().map_err(malformed)?.clone();
    let columns = SampleColumns::resolve(&headers, path, schema)?;
    let group_idx = find_column(&headers, GROUP).ok_or_else(|| DataError::MissingColumn {
        path: path.to_path_buf(),
        column: GROUP[0].to_string(),
    })?;

    let mut by_group: BTreeMap<GroupKey, Vec<Sample>> = BTreeMap::new();
    for result in reader.records() {
        let record = result.map_err(malformed)?;
        let Some(group) = record.get(group_idx).and_then(GroupKey::from_table_name) else {
            continue;
        };
        let sample = columns.sample(&record);
        if sample.has_nan() || sample.time < 0.0 || sample.time > max_time {
            continue;
        }
        by_group.entry(group).or_default().push(sample);
    }

    Ok(by_group
        .into_iter()
        .filter(|(_, samples)| !samples.is_empty())
        .map(|(group, samples)| (group, Series::new(samples)))
        .collect())
}

// ---------------------------------------------------------------------------
// Subject metadata table
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SubjectRecord {
    #[serde(
        rename = "Subject Number",
        alias = "SubjectID",
        alias = "Subject",
        alias = "ID",
        default,
        deserialize_with = "csv::invalid_option"
    )]
    number: Option<u32>,
    #[serde(
        rename = "Trial Classification",
        alias = "Classification",
        alias = "Trial",
        default
    )]
    classification: Option<String>,
    #[serde(rename = "Sex (M/F)", default)]
    sex: Option<String>,
    #[serde(rename = "Age [years]", default, deserialize_with = "csv::invalid_option")]
    age: Option<f64>,
    #[serde(rename = "Height [cm]", default, deserialize_with = "csv::invalid_option")]
    height: Option<f64>,
    #[serde(rename = "Weight [kg]", default, deserialize_with = "csv::invalid_option")]
    weight: Option<f64>,
    #[serde(rename = "Asthma (Y/N)", default)]
    asthma: Option<String>,
    #[serde(rename = "History of Smoking (Y/N)", default)]
    smoking_history: Option<String>,
    #[serde(rename = "History of Vaping (Y/N)", default)]
    vaping_history: Option<String>,
}

fn yes(flag: &Option<String>) -> bool {
    flag.as_deref().is_some_and(|f| f.eq_ignore_ascii_case("y"))
}

/// Read the subject metadata table. Rows without a positive subject number
/// are skipped.
pub fn read_subject_info<R: Read>(reader: R, path: &Path) -> Result<Vec<SubjectInfo>, DataError> {
    let mut reader = csv_reader(reader);
    let mut subjects = Vec::new();

    for (row_no, result) in reader.deserialize::<SubjectRecord>().enumerate() {
        let record = result.map_err(|source| DataError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(number) = record.number.filter(|n| *n > 0) else {
            log::warn!("{}: row {row_no} has no valid subject number, skipping", path.display());
            continue;
        };
        let classification = record.classification.unwrap_or_default();
        subjects.push(SubjectInfo {
            id: SubjectId(number),
            group: classify(&classification),
            classification,
            sex: record.sex,
            age: record.age,
            height: record.height,
            weight: record.weight,
            asthma: yes(&record.asthma),
            smoking_history: yes(&record.smoking_history),
            vaping_history: yes(&record.vaping_history),
        });
    }

    Ok(subjects)
}

/// Subject ids per group, in table order.
pub fn subjects_by_group(subjects: &[SubjectInfo]) -> BTreeMap<GroupKey, Vec<SubjectId>> {
    let mut map: BTreeMap<GroupKey, Vec<SubjectId>> = BTreeMap::new();
    for subject in subjects {
        map.entry(subject.group).or_default().push(subject.id);
    }
    map
}
