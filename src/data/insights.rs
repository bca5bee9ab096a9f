use std::collections::BTreeMap;

use super::aggregate::bin_samples;
use super::demographics::PLAUSIBLE_AGE;
use super::loader::{SeriesSchema, SeriesSource};
use super::model::{Metric, Series, SubjectId, SubjectInfo};

/// z-score of a two-sided 95 % interval.
const Z_95: f64 = 1.96;

// ---------------------------------------------------------------------------
// Cohorts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Read the subject-table entry (`M`, `F`, `Male`, `female`, ...).
    pub fn of(subject: &SubjectInfo) -> Option<Sex> {
        let first = subject.sex.as_deref()?.trim().chars().next()?;
        match first.to_ascii_uppercase() {
            'M' => Some(Sex::Male),
            'F' => Some(Sex::Female),
            _ => None,
        }
    }
}

/// A yes/no split of the subjects into two cohorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Asthma,
    Smoking,
    Vaping,
    Sex,
}

impl Comparison {
    pub fn label(self) -> &'static str {
        match self {
            Comparison::Asthma => "Asthma",
            Comparison::Smoking => "Smoking",
            Comparison::Vaping => "Vaping",
            Comparison::Sex => "Sex",
        }
    }

    /// Names of the two cohorts, in the order [`split`](Self::split) returns them.
    pub fn cohort_labels(self) -> [&'static str; 2] {
        match self {
            Comparison::Asthma => ["Asthmatic", "Non-Asthmatic"],
            Comparison::Smoking => ["Smoking history", "No smoking history"],
            Comparison::Vaping => ["Vaping history", "No vaping history"],
            Comparison::Sex => ["Male", "Female"],
        }
    }

    /// `Some(0)` or `Some(1)` for the cohort the subject belongs to. Subjects
    /// with no recorded sex fall in neither cohort of [`Comparison::Sex`].
    fn cohort_of(self, subject: &SubjectInfo) -> Option<usize> {
        let first = match self {
            Comparison::Asthma => subject.asthma,
            Comparison::Smoking => subject.smoking_history,
            Comparison::Vaping => subject.vaping_history,
            Comparison::Sex => Sex::of(subject)? == Sex::Male,
        };
        Some(if first { 0 } else { 1 })
    }

    /// Subject ids of both cohorts, in subject-table order.
    pub fn split(self, subjects: &[SubjectInfo]) -> [Vec<SubjectId>; 2] {
        let mut cohorts = [Vec::new(), Vec::new()];
        for s in subjects {
            if let Some(i) = self.cohort_of(s) {
                cohorts[i].push(s.id);
            }
        }
        cohorts
    }
}

/// Inclusive age range in years.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeRange {
    pub min: f64,
    pub max: f64,
}

impl AgeRange {
    pub const PRESETS: [AgeRange; 4] = [
        AgeRange { min: 15.0, max: 25.0 },
        AgeRange { min: 26.0, max: 35.0 },
        AgeRange { min: 36.0, max: 45.0 },
        AgeRange { min: 46.0, max: 100.0 },
    ];

    pub fn label(self) -> String {
        if self.max >= 100.0 {
            format!("{:.0}+", self.min)
        } else {
            format!("{:.0}-{:.0}", self.min, self.max)
        }
    }

    pub fn contains(self, age: f64) -> bool {
        age >= self.min && age <= self.max
    }

    pub fn members(self, subjects: &[SubjectInfo]) -> Vec<SubjectId> {
        subjects
            .iter()
            .filter(|s| s.age.is_some_and(|a| self.contains(a)))
            .map(|s| s.id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Mean with 95 % confidence interval
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPoint {
    /// Left edge of the bin.
    pub time: f64,
    /// Subjects with a sample in the bin.
    pub n: usize,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

impl BandPoint {
    /// Mean and normal-approximation interval of one value per subject,
    /// using the population standard deviation.
    fn of(time: f64, values: &[f64]) -> BandPoint {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let margin = Z_95 * variance.sqrt() / n.sqrt();
        BandPoint {
            time,
            n: values.len(),
            mean,
            lower: mean - margin,
            upper: mean + margin,
        }
    }
}

/// Cross-subject mean of `metric` with its 95 % interval, per time bin of
/// `bin_width` seconds over `[0, window]`.
///
/// Each subject contributes one value per bin (its own bin mean), so a
/// densely sampled recording does not outweigh a sparse one. Bins no subject
/// reaches are left out.
pub fn confidence_band<'a>(
    series: impl IntoIterator<Item = &'a Series>,
    metric: Metric,
    bin_width: f64,
    window: f64,
) -> Vec<BandPoint> {
    let mut per_bin: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
    for s in series {
        for bin in bin_samples([s], bin_width, window) {
            let value = metric.value(&bin.mean);
            if value.is_finite() {
                let index = (bin.time / bin_width).round() as i64;
                per_bin.entry(index).or_default().push(value);
            }
        }
    }
    per_bin
        .into_iter()
        .map(|(index, values)| BandPoint::of(index as f64 * bin_width, &values))
        .collect()
}

// ---------------------------------------------------------------------------
// Age regression
// ---------------------------------------------------------------------------

/// Least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
}

impl Regression {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Ordinary least squares over `[x, y]` points. `None` for fewer than two
/// points or when every x is the same.
pub fn linear_regression(points: &[[f64; 2]]) -> Option<Regression> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p[1]).sum::<f64>() / n;

    let (mut num, mut den) = (0.0, 0.0);
    for [x, y] in points {
        num += (x - mean_x) * (y - mean_y);
        den += (x - mean_x).powi(2);
    }
    if den == 0.0 {
        return None;
    }
    let slope = num / den;
    Some(Regression {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

/// One subject in the age scatter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgePoint {
    pub id: SubjectId,
    pub age: f64,
    pub mean_flow: f64,
    pub sex: Option<Sex>,
    pub asthma: bool,
}

/// Scatter points for subjects with a plausible age and a loaded recording.
pub fn age_points(subjects: &[SubjectInfo], mean_flow: &BTreeMap<SubjectId, f64>) -> Vec<AgePoint> {
    subjects
        .iter()
        .filter_map(|s| {
            let age = s.age.filter(|a| PLAUSIBLE_AGE.contains(a))?;
            Some(AgePoint {
                id: s.id,
                age,
                mean_flow: *mean_flow.get(&s.id)?,
                sex: Sex::of(s),
                asthma: s.asthma,
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Recordings behind the insight charts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CohortData {
    /// Each subject's recording, cut to the band window.
    pub series: BTreeMap<SubjectId, Series>,
    /// Mean flow over each full recording.
    pub mean_flow: BTreeMap<SubjectId, f64>,
}

impl CohortData {
    /// Band of the given subjects; ids without a recording are skipped.
    pub fn band(&self, ids: &[SubjectId], metric: Metric, bin_width: f64, window: f64) -> Vec<BandPoint> {
        confidence_band(ids.iter().filter_map(|id| self.series.get(id)), metric, bin_width, window)
    }
}

/// Load every subject's ventilation recording up to `max_time`. Subjects
/// whose file fails to load are logged and left out.
pub fn load_cohort_data<S: SeriesSource + ?Sized>(
    source: &S,
    ids: &[SubjectId],
    window: f64,
    max_time: f64,
) -> CohortData {
    let mut data = CohortData::default();
    for &id in ids {
        match source.load_series(id, SeriesSchema::VENTILATION, max_time) {
            Ok(series) => {
                if let Some(mean) = series.mean(Metric::Flow) {
                    data.mean_flow.insert(id, mean);
                }
                data.series.insert(id, series.truncated(window));
            }
            Err(e) => log::warn!("Leaving subject {id} out of the insights: {e}"),
        }
    }
    log::info!("Loaded {} of {} subjects for insights", data.series.len(), ids.len());
    data
}
