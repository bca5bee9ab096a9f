use std::fmt;

use super::classify::GroupKey;

// ---------------------------------------------------------------------------
// Sample – one row of a subject's recording
// ---------------------------------------------------------------------------

/// A single time-stamped measurement.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    /// Seconds since the start of the recording.
    pub time: f64,
    /// Airflow in L/s (positive = inhaling).
    pub flow: f64,
    /// Tidal volume in L, never negative.
    pub volume: f64,
    /// Chest circumference in mm.
    pub chest: f64,
    /// Abdomen circumference in mm.
    pub abdomen: f64,
    /// Airway pressure in cmH2O.
    pub pressure: f64,
}

impl Sample {
    /// Chest/abdomen ratio. Zero when the abdomen reading is zero so that
    /// axis extents stay finite.
    pub fn ratio(&self) -> f64 {
        if self.abdomen == 0.0 {
            0.0
        } else {
            self.chest / self.abdomen
        }
    }

    /// Whether any field is NaN.
    pub fn has_nan(&self) -> bool {
        [
            self.time,
            self.flow,
            self.volume,
            self.chest,
            self.abdomen,
            self.pressure,
        ]
        .iter()
        .any(|v| v.is_nan())
    }
}

// ---------------------------------------------------------------------------
// Metric – which channel a chart draws
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Flow,
    Volume,
    Chest,
    Abdomen,
    Pressure,
    Ratio,
}

impl Metric {
    /// Read this metric from a sample.
    pub fn value(self, sample: &Sample) -> f64 {
        match self {
            Metric::Flow => sample.flow,
            Metric::Volume => sample.volume,
            Metric::Chest => sample.chest,
            Metric::Abdomen => sample.abdomen,
            Metric::Pressure => sample.pressure,
            Metric::Ratio => sample.ratio(),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Flow => "Flow",
            Metric::Volume => "Tidal Volume",
            Metric::Chest => "Chest Movement",
            Metric::Abdomen => "Abdominal Movement",
            Metric::Pressure => "Pressure",
            Metric::Ratio => "Chest/Abdomen Ratio",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Metric::Flow => "L/s",
            Metric::Volume => "L",
            Metric::Chest | Metric::Abdomen => "mm",
            Metric::Pressure => "cmH2O",
            Metric::Ratio => "",
        }
    }

    /// Axis label, e.g. `Flow (L/s)`.
    pub fn axis_label(self) -> String {
        match self.unit() {
            "" => self.label().to_string(),
            unit => format!("{} ({unit})", self.label()),
        }
    }
}

// ---------------------------------------------------------------------------
// Series – the ordered samples of one subject or one group
// ---------------------------------------------------------------------------

/// Samples ordered by non-decreasing time.
///
/// Construction sorts its input, so every `Series` upholds the ordering that
/// the windowing code relies on for binary search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    samples: Vec<Sample>,
}

impl Series {
    /// Build a series, stably sorting by time if needed.
    pub fn new(mut samples: Vec<Sample>) -> Self {
        if !Self::is_sorted(&samples) {
            log::warn!("series samples out of time order, sorting");
            samples.sort_by(|a, b| a.time.total_cmp(&b.time));
        }
        Series { samples }
    }

    fn is_sorted(samples: &[Sample]) -> bool {
        samples.windows(2).all(|w| w[0].time <= w[1].time)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Time of the last sample.
    pub fn end_time(&self) -> Option<f64> {
        self.samples.last().map(|s| s.time)
    }

    /// Samples with `start <= time <= start + width`.
    pub fn window(&self, start: f64, width: f64) -> &[Sample] {
        let end = start + width;
        let lo = self.samples.partition_point(|s| s.time < start);
        let hi = self.samples.partition_point(|s| s.time <= end);
        &self.samples[lo..hi.max(lo)]
    }

    /// Keep only samples inside `[0, max_time]`.
    pub fn truncated(&self, max_time: f64) -> Series {
        Series {
            samples: self
                .samples
                .iter()
                .filter(|s| s.time >= 0.0 && s.time <= max_time)
                .copied()
                .collect(),
        }
    }

    /// Min/max of a metric, ignoring non-finite values.
    pub fn extent(&self, metric: Metric) -> Option<(f64, f64)> {
        extent_of(self.samples.iter().map(|s| metric.value(s)))
    }

    /// Extent widened by `frac` of its span on both sides.
    pub fn padded_extent(&self, metric: Metric, frac: f64) -> Option<(f64, f64)> {
        self.extent(metric).map(|(lo, hi)| pad(lo, hi, frac))
    }

    /// Largest absolute flow, used to scale the lung gauge.
    pub fn max_abs_flow(&self) -> f64 {
        self.samples
            .iter()
            .map(|s| s.flow.abs())
            .filter(|v| v.is_finite())
            .fold(0.0, f64::max)
    }

    /// Arithmetic mean of a metric.
    pub fn mean(&self, metric: Metric) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| metric.value(s)).sum();
        Some(sum / self.samples.len() as f64)
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<I: IntoIterator<Item = Sample>>(iter: I) -> Self {
        Series::new(iter.into_iter().collect())
    }
}

/// Min/max over finite values.
pub fn extent_of(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Widen `[lo, hi]` by `frac` of its span. A zero span gets a unit margin.
pub fn pad(lo: f64, hi: f64, frac: f64) -> (f64, f64) {
    let span = hi - lo;
    if span.abs() < f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - span * frac, hi + span * frac)
}

// ---------------------------------------------------------------------------
// Subjects
// ---------------------------------------------------------------------------

/// Positive subject number as used in the dataset file names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubjectId(pub u32);

impl SubjectId {
    /// File stem of this subject's samples table.
    pub fn file_stem(self) -> String {
        format!("ProcessedData_Subject{:02}", self.0)
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// One row of the subject metadata table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectInfo {
    pub id: SubjectId,
    pub classification: String,
    pub group: GroupKey,
    pub sex: Option<String>,
    pub age: Option<f64>,
    pub height: Option<f64>,
    pub weight: Option<f64>,
    pub asthma: bool,
    pub smoking_history: bool,
    pub vaping_history: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(time: f64, volume: f64) -> Sample {
        Sample {
            time,
            volume,
            ..Default::default()
        }
    }

    #[test]
    fn ratio_is_zero_for_zero_abdomen() {
        let s = Sample {
            chest: 900.0,
            abdomen: 0.0,
            ..Default::default()
        };
        assert_eq!(s.ratio(), 0.0);

        let s = Sample {
            chest: 900.0,
            abdomen: 450.0,
            ..Default::default()
        };
        assert_eq!(s.ratio(), 2.0);
    }

    #[test]
    fn new_sorts_out_of_order_samples() {
        let series = Series::new(vec![at(2.0, 0.0), at(0.0, 0.0), at(1.0, 0.0)]);
        let times: Vec<f64> = series.samples().iter().map(|s| s.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn window_is_inclusive_on_both_ends() {
        let series: Series = (0..5).map(|i| at(i as f64, 0.0)).collect();
        let times: Vec<f64> = series.window(1.0, 2.0).iter().map(|s| s.time).collect();
        assert_eq!(times, vec![1.0, 2.0, 3.0]);
        assert!(series.window(4.5, 10.0).is_empty());
    }

    #[test]
    fn window_at_zero_is_non_empty_when_a_sample_fits() {
        let series: Series = [at(0.4, 0.0), at(3.0, 0.0)].into_iter().collect();
        assert!(!series.window(0.0, 0.5).is_empty());
        assert!(series.window(0.0, 0.1).is_empty());
    }

    #[test]
    fn truncated_drops_samples_outside_bounds() {
        let series: Series = [at(-1.0, 0.0), at(0.0, 0.0), at(5.0, 0.0), at(6.0, 0.0)]
            .into_iter()
            .collect();
        assert_eq!(series.truncated(5.0).len(), 2);
    }

    #[test]
    fn padded_extent_handles_flat_series() {
        let series: Series = [at(0.0, 1.0), at(1.0, 1.0)].into_iter().collect();
        assert_eq!(series.padded_extent(Metric::Volume, 0.05), Some((0.0, 2.0)));

        let series: Series = [at(0.0, 0.0), at(1.0, 10.0)].into_iter().collect();
        assert_eq!(series.padded_extent(Metric::Volume, 0.1), Some((-1.0, 11.0)));
    }

    #[test]
    fn subject_file_stem_is_zero_padded() {
        assert_eq!(SubjectId(7).file_stem(), "ProcessedData_Subject07");
        assert_eq!(SubjectId(42).file_stem(), "ProcessedData_Subject42");
    }
}
