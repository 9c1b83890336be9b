//! Bidirectional mapping between region display names and ONS area codes.

use std::collections::BTreeMap;

/// Bidirectional association between a human-readable region name and its
/// stable ONS area code.
///
/// The source data occasionally carries the same name under two codes (or
/// vice versa) after boundary revisions; construction deduplicates so that
/// each code maps to exactly one name and each name to exactly one code.
/// First occurrence in sorted code order wins.
#[derive(Debug, Clone, Default)]
pub struct RegionMapping {
    name_by_code: BTreeMap<String, String>,
    code_by_name: BTreeMap<String, String>,
}

impl RegionMapping {
    /// Build a mapping from `(area_code, region_name)` pairs.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut sorted: Vec<(String, String)> = pairs.into_iter().collect();
        sorted.sort();

        let mut mapping = Self::default();
        for (code, name) in sorted {
            let name = name.trim().to_string();
            if name.is_empty() || code.is_empty() {
                continue;
            }
            if mapping.name_by_code.contains_key(&code) || mapping.code_by_name.contains_key(&name)
            {
                continue;
            }
            mapping.name_by_code.insert(code.clone(), name.clone());
            mapping.code_by_name.insert(name, code);
        }
        mapping
    }

    /// Display name for an area code, if known.
    pub fn name_for(&self, area_code: &str) -> Option<&str> {
        self.name_by_code.get(area_code).map(String::as_str)
    }

    /// Area code for a display name, if known.
    pub fn code_for(&self, region_name: &str) -> Option<&str> {
        self.code_by_name.get(region_name).map(String::as_str)
    }

    /// Number of regions in the mapping.
    pub fn len(&self) -> usize {
        self.name_by_code.len()
    }

    /// Whether the mapping is empty.
    pub fn is_empty(&self) -> bool {
        self.name_by_code.is_empty()
    }

    /// Iterate over `(area_code, region_name)` pairs in code order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.name_by_code
            .iter()
            .map(|(code, name)| (code.as_str(), name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let mapping = RegionMapping::from_pairs(vec![
            ("E92000001".to_string(), "England".to_string()),
            ("W92000004".to_string(), "Wales".to_string()),
        ]);

        assert_eq!(mapping.name_for("E92000001"), Some("England"));
        assert_eq!(mapping.code_for("Wales"), Some("W92000004"));
        assert_eq!(mapping.len(), 2);
    }

    #[test]
    fn test_duplicate_code_keeps_first() {
        let mapping = RegionMapping::from_pairs(vec![
            ("E06000001".to_string(), "Hartlepool".to_string()),
            ("E06000001".to_string(), "Hartlepool UA".to_string()),
        ]);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.name_for("E06000001"), Some("Hartlepool"));
    }

    #[test]
    fn test_duplicate_name_keeps_first() {
        let mapping = RegionMapping::from_pairs(vec![
            ("E06000002".to_string(), "Middlesbrough".to_string()),
            ("E06000099".to_string(), "Middlesbrough".to_string()),
        ]);

        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.code_for("Middlesbrough"), Some("E06000002"));
    }

    #[test]
    fn test_trims_whitespace() {
        let mapping = RegionMapping::from_pairs(vec![(
            "S92000003".to_string(),
            " Scotland ".to_string(),
        )]);
        assert_eq!(mapping.name_for("S92000003"), Some("Scotland"));
    }
}
