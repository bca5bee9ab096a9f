use std::collections::BTreeMap;

use super::model::SubjectInfo;

// ---------------------------------------------------------------------------
// Category counts
// ---------------------------------------------------------------------------

/// Which subject attribute the demographics chart splits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingField {
    Sex,
    Asthma,
    Smoking,
    Vaping,
    Classification,
}

impl GroupingField {
    pub const ALL: [GroupingField; 5] = [
        GroupingField::Sex,
        GroupingField::Asthma,
        GroupingField::Smoking,
        GroupingField::Vaping,
        GroupingField::Classification,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GroupingField::Sex => "Sex",
            GroupingField::Asthma => "Asthma",
            GroupingField::Smoking => "Smoking history",
            GroupingField::Vaping => "Vaping history",
            GroupingField::Classification => "Trial group",
        }
    }

    /// Category of one subject under this field.
    pub fn category(self, subject: &SubjectInfo) -> String {
        let flag = |set: bool, yes: &str, no: &str| (if set { yes } else { no }).to_string();
        match self {
            GroupingField::Sex => match subject.sex.as_deref() {
                Some("M") => "Male".to_string(),
                Some("F") => "Female".to_string(),
                Some(other) => other.to_string(),
                None => "Unknown".to_string(),
            },
            GroupingField::Asthma => flag(subject.asthma, "Asthmatic", "Non-Asthmatic"),
            GroupingField::Smoking => flag(
                subject.smoking_history,
                "Smoking History",
                "No Smoking History",
            ),
            GroupingField::Vaping => flag(
                subject.vaping_history,
                "Vaping History",
                "No Vaping History",
            ),
            GroupingField::Classification => subject.group.label().to_string(),
        }
    }
}

/// Number of subjects per category, sorted by category name.
pub fn category_counts(subjects: &[SubjectInfo], field: GroupingField) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for subject in subjects {
        *counts.entry(field.category(subject)).or_insert(0) += 1;
    }
    counts
}

// ---------------------------------------------------------------------------
// Age histogram
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBin {
    pub start: f64,
    pub end: f64,
    pub count: usize,
}

/// Ages outside this range are data-entry errors and stay out of the histogram.
pub const PLAUSIBLE_AGE: std::ops::RangeInclusive<f64> = 0.0..=130.0;

/// Histogram of subject ages with fixed-width bins aligned to multiples of
/// `bin_width`. Empty bins between the youngest and oldest subject are kept.
pub fn age_histogram(subjects: &[SubjectInfo], bin_width: f64) -> Vec<AgeBin> {
    let ages: Vec<f64> = subjects
        .iter()
        .filter_map(|s| s.age)
        .filter(|a| PLAUSIBLE_AGE.contains(a))
        .collect();
    if ages.is_empty() || bin_width <= 0.0 {
        return Vec::new();
    }

    let first = ages.iter().map(|a| (a / bin_width).floor() as i64).min().unwrap_or(0);
    let last = ages.iter().map(|a| (a / bin_width).floor() as i64).max().unwrap_or(0);

    let mut bins: Vec<AgeBin> = (first..=last)
        .map(|i| AgeBin {
            start: i as f64 * bin_width,
            end: (i + 1) as f64 * bin_width,
            count: 0,
        })
        .collect();
    for age in ages {
        let i = (age / bin_width).floor() as i64 - first;
        bins[i as usize].count += 1;
    }
    bins
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::classify::GroupKey;
    use crate::data::model::SubjectId;

    fn subject(id: u32, sex: &str, age: Option<f64>, asthma: bool) -> SubjectInfo {
        SubjectInfo {
            id: SubjectId(id),
            classification: String::new(),
            group: GroupKey::Unknown,
            sex: Some(sex.to_string()),
            age,
            height: None,
            weight: None,
            asthma,
            smoking_history: false,
            vaping_history: false,
        }
    }

    #[test]
    fn counts_by_sex_and_asthma() {
        let subjects = vec![
            subject(1, "M", Some(20.0), false),
            subject(2, "F", Some(22.0), true),
            subject(3, "F", Some(35.0), false),
        ];
        let by_sex = category_counts(&subjects, GroupingField::Sex);
        assert_eq!(by_sex["Female"], 2);
        assert_eq!(by_sex["Male"], 1);

        let by_asthma = category_counts(&subjects, GroupingField::Asthma);
        assert_eq!(by_asthma["Asthmatic"], 1);
        assert_eq!(by_asthma["Non-Asthmatic"], 2);

        let total: usize = category_counts(&subjects, GroupingField::Classification)
            .values()
            .sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn age_histogram_keeps_empty_middle_bins() {
        let subjects = vec![
            subject(1, "M", Some(21.0), false),
            subject(2, "F", Some(29.9), false),
            subject(3, "F", Some(45.0), false),
            subject(4, "F", None, false),
        ];
        let bins = age_histogram(&subjects, 10.0);
        let counts: Vec<usize> = bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 0, 1]);
        assert_eq!(bins[0].start, 20.0);
        assert_eq!(bins[2].end, 50.0);
    }

    #[test]
    fn age_histogram_of_no_ages_is_empty() {
        let subjects = vec![subject(1, "M", None, false)];
        assert!(age_histogram(&subjects, 10.0).is_empty());
    }

    #[test]
    fn age_histogram_skips_implausible_ages() {
        let subjects = vec![
            subject(1, "M", Some(1e15), false),
            subject(2, "F", Some(-4.0), false),
            subject(3, "F", Some(f64::INFINITY), false),
            subject(4, "M", Some(33.0), false),
        ];
        let bins = age_histogram(&subjects, 10.0);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].start, 30.0);
        assert_eq!(bins[0].count, 1);

        // a tiny bin width over the whole plausible range stays bounded
        let fine = age_histogram(&[subject(5, "F", Some(0.0), false), subject(6, "F", Some(130.0), false)], 1.0);
        assert_eq!(fine.len(), 131);
    }
}
