use std::collections::BTreeMap;

use super::classify::GroupKey;
use super::loader::{SeriesSchema, SeriesSource};
use super::model::{Sample, Series, SubjectId, extent_of};

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateParams {
    /// How many subjects per group contribute (the first ones listed).
    pub sample_size: usize,
    /// Width of a time bin in seconds.
    pub bin_width: f64,
    /// Samples after this time are ignored.
    pub max_time: f64,
}

// ---------------------------------------------------------------------------
// Time bins
// ---------------------------------------------------------------------------

/// One populated time bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    /// Left edge of the bin.
    pub time: f64,
    pub count: usize,
    /// Channel means; `mean.time` equals `time`.
    pub mean: Sample,
}

#[derive(Debug, Default)]
struct Accumulator {
    count: usize,
    flow: f64,
    volume: f64,
    chest: f64,
    abdomen: f64,
    pressure: f64,
}

impl Accumulator {
    fn add(&mut self, s: &Sample) {
        self.count += 1;
        self.flow += s.flow;
        self.volume += s.volume;
        self.chest += s.chest;
        self.abdomen += s.abdomen;
        self.pressure += s.pressure;
    }

    fn mean(&self, time: f64) -> Sample {
        let n = self.count as f64;
        Sample {
            time,
            flow: self.flow / n,
            volume: self.volume / n,
            chest: self.chest / n,
            abdomen: self.abdomen / n,
            pressure: self.pressure / n,
        }
    }
}

/// Average all samples of `series` into left-closed bins of `bin_width`
/// seconds over `[0, max_time]`.
///
/// Only bins that received a sample are returned, in ascending time order.
pub fn bin_samples<'a>(
    series: impl IntoIterator<Item = &'a Series>,
    bin_width: f64,
    max_time: f64,
) -> Vec<Bin> {
    let mut bins: BTreeMap<i64, Accumulator> = BTreeMap::new();
    for s in series {
        for sample in s.samples() {
            if sample.time < 0.0 || sample.time > max_time {
                continue;
            }
            let index = (sample.time / bin_width).floor() as i64;
            bins.entry(index).or_default().add(sample);
        }
    }

    bins.into_iter()
        .map(|(index, acc)| {
            let time = index as f64 * bin_width;
            Bin {
                time,
                count: acc.count,
                mean: acc.mean(time),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Group averages
// ---------------------------------------------------------------------------

/// Compute one averaged series per group.
///
/// Each group contributes its first `sample_size` subjects in list order.
/// Subjects that fail to load are skipped; a group left with no samples is
/// absent from the result.
pub fn aggregate<S: SeriesSource + ?Sized>(
    source: &S,
    subjects_by_group: &BTreeMap<GroupKey, Vec<SubjectId>>,
    schema: SeriesSchema,
    params: AggregateParams,
) -> BTreeMap<GroupKey, Series> {
    let mut averaged: BTreeMap<GroupKey, Series> = BTreeMap::new();

    for (&group, ids) in subjects_by_group {
        let loaded: Vec<Series> = ids
            .iter()
            .take(params.sample_size)
            .filter_map(|&id| match source.load_series(id, schema, params.max_time) {
                Ok(series) => Some(series),
                Err(e) => {
                    log::warn!("Skipping subject {id} in {group} average: {e}");
                    None
                }
            })
            .collect();

        let bins = bin_samples(&loaded, params.bin_width, params.max_time);
        if bins.is_empty() {
            log::info!("No data for group {group}");
            continue;
        }
        log::info!(
            "Averaged {} subjects of {group} into {} bins",
            loaded.len(),
            bins.len()
        );
        averaged.insert(group, bins.into_iter().map(|b| b.mean).collect());
    }

    averaged
}

/// Y-axis domain for the chest/abdomen ratio across groups.
///
/// Non-positive ratios (including the zero used for a zero abdomen) are left
/// out. The domain gets a 10 % margin and never goes below zero.
pub fn ratio_domain<'a>(series: impl IntoIterator<Item = &'a Series>) -> Option<(f64, f64)> {
    let (lo, hi) = extent_of(
        series
            .into_iter()
            .flat_map(|s| s.samples().iter().map(Sample::ratio))
            .filter(|r| *r > 0.0),
    )?;
    let margin = (hi - lo) * 0.1;
    Some(((lo - margin).max(0.0), hi + margin))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::data::error::DataError;

    struct MapSource(HashMap<SubjectId, Series>);

    impl SeriesSource for MapSource {
        fn load_series(
            &self,
            id: SubjectId,
            _schema: SeriesSchema,
            max_time: f64,
        ) -> Result<Series, DataError> {
            self.0
                .get(&id)
                .map(|s| s.truncated(max_time))
                .ok_or_else(|| DataError::MissingColumn {
                    path: id.file_stem().into(),
                    column: "Time [s]".into(),
                })
        }
    }

    fn sample(time: f64, chest: f64, abdomen: f64) -> Sample {
        Sample {
            time,
            chest,
            abdomen,
            ..Default::default()
        }
    }

    fn series(points: &[(f64, f64, f64)]) -> Series {
        points.iter().map(|&(t, c, a)| sample(t, c, a)).collect()
    }

    fn params(sample_size: usize) -> AggregateParams {
        AggregateParams {
            sample_size,
            bin_width: 0.5,
            max_time: 100.0,
        }
    }

    #[test]
    fn bins_conserve_sample_count() {
        let a = series(&[(0.0, 1.0, 1.0), (0.25, 2.0, 1.0), (1.0, 3.0, 1.0)]);
        let b = series(&[(0.1, 4.0, 1.0), (2.75, 5.0, 1.0)]);
        let bins = bin_samples([&a, &b], 0.5, 100.0);

        let total: usize = bins.iter().map(|b| b.count).sum();
        assert_eq!(total, 5);

        let times: Vec<f64> = bins.iter().map(|b| b.time).collect();
        assert_eq!(times, vec![0.0, 1.0, 2.5]);
    }

    #[test]
    fn bins_cover_distinct_floor_values() {
        let s: Series = (0..37).map(|i| sample(i as f64 * 0.37, 1.0, 1.0)).collect();
        let width = 0.5;
        let bins = bin_samples([&s], width, 100.0);

        let mut expected: Vec<i64> = s
            .samples()
            .iter()
            .map(|x| (x.time / width).floor() as i64)
            .collect();
        expected.dedup();
        let got: Vec<i64> = bins.iter().map(|b| (b.time / width).round() as i64).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn bin_mean_is_sum_over_count() {
        let a = series(&[(0.0, 10.0, 2.0), (0.4, 20.0, 4.0)]);
        let bins = bin_samples([&a], 0.5, 100.0);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].mean.chest, 15.0);
        assert_eq!(bins[0].mean.abdomen, 3.0);
    }

    #[test]
    fn samples_past_max_time_are_ignored() {
        let a = series(&[(0.0, 1.0, 1.0), (5.0, 1.0, 1.0)]);
        let bins = bin_samples([&a], 0.5, 2.0);
        assert_eq!(bins.len(), 1);
    }

    #[test]
    fn aggregate_uses_first_subjects_in_order() {
        let mut data = HashMap::new();
        data.insert(SubjectId(1), series(&[(0.0, 10.0, 1.0)]));
        data.insert(SubjectId(2), series(&[(0.0, 20.0, 1.0)]));
        data.insert(SubjectId(3), series(&[(0.0, 90.0, 1.0)]));
        let source = MapSource(data);

        let mut groups = BTreeMap::new();
        groups.insert(GroupKey::Smoker, vec![SubjectId(1), SubjectId(2), SubjectId(3)]);

        let out = aggregate(&source, &groups, SeriesSchema::AERATION, params(2));
        assert_eq!(out[&GroupKey::Smoker].samples()[0].chest, 15.0);
    }

    #[test]
    fn empty_and_unloadable_groups_are_absent() {
        let mut data = HashMap::new();
        data.insert(SubjectId(1), series(&[(0.0, 10.0, 1.0)]));
        let source = MapSource(data);

        let mut groups = BTreeMap::new();
        groups.insert(GroupKey::Normal, vec![SubjectId(1), SubjectId(9)]);
        groups.insert(GroupKey::Vaper, vec![SubjectId(8)]);
        groups.insert(GroupKey::Asthma, vec![]);

        let out = aggregate(&source, &groups, SeriesSchema::AERATION, params(5));
        assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![GroupKey::Normal]);
    }

    #[test]
    fn averaged_ratio_is_zero_for_zero_abdomen() {
        let a = series(&[(0.0, 10.0, 0.0), (0.6, 10.0, 5.0)]);
        let bins = bin_samples([&a], 0.5, 100.0);
        for bin in &bins {
            let r = bin.mean.ratio();
            assert!(r.is_finite());
            if bin.mean.abdomen == 0.0 {
                assert_eq!(r, 0.0);
            }
        }
    }

    #[test]
    fn ratio_domain_skips_non_positive_ratios() {
        let a = series(&[(0.0, 10.0, 0.0), (1.0, 10.0, 10.0), (2.0, 20.0, 10.0)]);
        let b = series(&[(0.0, -5.0, 10.0)]);
        let (lo, hi) = ratio_domain([&a, &b]).unwrap();
        assert!((lo - 0.9).abs() < 1e-9);
        assert!((hi - 2.1).abs() < 1e-9);

        let flat = series(&[(0.0, 0.0, 0.0)]);
        assert_eq!(ratio_domain([&flat]), None);
    }
}
