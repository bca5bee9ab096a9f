use std::fmt;

// ---------------------------------------------------------------------------
// GroupKey – cohort derived from the free-text trial classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GroupKey {
    Normal,
    Asthma,
    Smoker,
    Vaper,
    Unknown,
}

impl GroupKey {
    /// Groups that get a comparison line. `Unknown` is never plotted.
    pub const COMPARED: [GroupKey; 4] = [
        GroupKey::Normal,
        GroupKey::Asthma,
        GroupKey::Smoker,
        GroupKey::Vaper,
    ];

    pub fn label(self) -> &'static str {
        match self {
            GroupKey::Normal => "Healthy",
            GroupKey::Asthma => "Asthma",
            GroupKey::Smoker => "Smoker",
            GroupKey::Vaper => "Vaper",
            GroupKey::Unknown => "Unknown",
        }
    }

    /// Parse the `group` column of a precomputed group table.
    pub fn from_table_name(name: &str) -> Option<GroupKey> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" | "healthy" => Some(GroupKey::Normal),
            "asthma" => Some(GroupKey::Asthma),
            "smoker" => Some(GroupKey::Smoker),
            "vaper" => Some(GroupKey::Vaper),
            "unknown" => Some(GroupKey::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Map a trial classification such as `"Asthmatic Female"` to its group.
///
/// Substrings are checked in a fixed order, so a string mentioning several
/// conditions resolves to the first one in that order.
pub fn classify(classification: &str) -> GroupKey {
    const RULES: [(&str, GroupKey); 4] = [
        ("Normal", GroupKey::Normal),
        ("Asthmatic", GroupKey::Asthma),
        ("Smoker", GroupKey::Smoker),
        ("Vaper", GroupKey::Vaper),
    ];
    RULES
        .iter()
        .find(|(needle, _)| classification.contains(needle))
        .map(|&(_, group)| group)
        .unwrap_or(GroupKey::Unknown)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_observed_strings() {
        let cases = [
            ("Normal Male", GroupKey::Normal),
            ("Normal Female", GroupKey::Normal),
            ("Asthmatic Male", GroupKey::Asthma),
            ("Asthmatic Female", GroupKey::Asthma),
            ("Smoker Male", GroupKey::Smoker),
            ("Smoker Female", GroupKey::Smoker),
            ("Vaper Male", GroupKey::Vaper),
            ("Vaper Female", GroupKey::Vaper),
            ("", GroupKey::Unknown),
            ("normal male", GroupKey::Unknown),
            ("Pilot", GroupKey::Unknown),
        ];
        for (input, expected) in cases {
            assert_eq!(classify(input), expected, "classification {input:?}");
        }
    }

    #[test]
    fn first_matching_rule_wins() {
        assert_eq!(classify("Asthmatic Smoker"), GroupKey::Asthma);
        assert_eq!(classify("Smoker Vaper"), GroupKey::Smoker);
    }

    #[test]
    fn classify_is_idempotent() {
        for s in ["Normal Male", "Vaper Female", "???"] {
            assert_eq!(classify(s), classify(s));
        }
    }

    #[test]
    fn parses_group_table_names() {
        assert_eq!(GroupKey::from_table_name("healthy"), Some(GroupKey::Normal));
        assert_eq!(GroupKey::from_table_name(" Asthma "), Some(GroupKey::Asthma));
        assert_eq!(GroupKey::from_table_name("other"), None);
    }
}
