//! Drug display name to canonical compound id mapping
//!
//! Loaded once at startup from configuration and shared read-only.

use crate::error::{DdiError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use strsim::jaro_winkler;
use tracing::info;

/// Minimum Jaro-Winkler similarity for a "did you mean" suggestion
const SUGGESTION_THRESHOLD: f64 = 0.85;

#[derive(Debug, Deserialize)]
struct MapRow {
    drug_name: String,
    drug_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct DrugIdMap {
    entries: BTreeMap<String, String>,
}

impl DrugIdMap {
    pub fn new<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Load from `.json` (object of name -> id) or `.csv` (`drug_name,drug_id`)
    pub fn load(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        let map = match extension.as_str() {
            "json" => {
                let content = std::fs::read_to_string(path)?;
                let entries: BTreeMap<String, String> = serde_json::from_str(&content)?;
                Self { entries }
            }
            "csv" => {
                let mut reader = csv::Reader::from_path(path)?;
                let mut entries = BTreeMap::new();
                for row in reader.deserialize() {
                    let row: MapRow = row?;
                    entries.insert(row.drug_name.trim().to_string(), row.drug_id.trim().to_string());
                }
                Self { entries }
            }
            other => {
                return Err(DdiError::Config(format!(
                    "Unsupported drug map format '{}' for {} (expected .json or .csv)",
                    other,
                    path.display()
                )))
            }
        };

        if map.is_empty() {
            return Err(DdiError::Config(format!(
                "Drug map {} contains no entries",
                path.display()
            )));
        }

        info!("Loaded {} drug name mappings from {}", map.len(), path.display());
        Ok(map)
    }

    /// Map a display name to its id fragment.
    pub fn map_drug_to_id(&self, name: &str) -> Result<&str> {
        self.entries
            .get(name)
            .map(|id| id.as_str())
            .ok_or_else(|| DdiError::UnknownDrug {
                name: name.to_string(),
                suggestion: self.closest_name(name).map(|s| s.to_string()),
            })
    }

    pub fn closest_name(&self, name: &str) -> Option<&str> {
        let needle = name.to_lowercase();
        self.entries
            .keys()
            .map(|k| (k, jaro_winkler(&needle, &k.to_lowercase())))
            .filter(|(_, score)| *score >= SUGGESTION_THRESHOLD)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, _)| k.as_str())
    }

    /// Display names in sorted order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> DrugIdMap {
        DrugIdMap::new([("Aspirin", "DB00945"), ("Ibuprofen", "DB01050"), ("Warfarin", "DB00682")])
    }

    #[test]
    fn test_map_known_drug() {
        let map = sample();
        assert_eq!(map.map_drug_to_id("Aspirin").unwrap(), "DB00945");
    }

    #[test]
    fn test_unknown_drug_suggests_closest() {
        let map = sample();
        match map.map_drug_to_id("Asprin") {
            Err(DdiError::UnknownDrug { name, suggestion }) => {
                assert_eq!(name, "Asprin");
                assert_eq!(suggestion.as_deref(), Some("Aspirin"));
            }
            other => panic!("expected UnknownDrug, got {:?}", other),
        }

        match map.map_drug_to_id("Metformin") {
            Err(DdiError::UnknownDrug { suggestion, .. }) => assert!(suggestion.is_none()),
            other => panic!("expected UnknownDrug, got {:?}", other),
        }
    }

    #[test]
    fn test_names_are_sorted() {
        let map = sample();
        let names: Vec<&str> = map.names().collect();
        assert_eq!(names, vec!["Aspirin", "Ibuprofen", "Warfarin"]);
    }

    #[test]
    fn test_load_json_and_csv() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("map.json");
        std::fs::write(&json_path, r#"{"Aspirin": "DB00945", "Digoxin": "DB00390"}"#).unwrap();
        let map = DrugIdMap::load(&json_path).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.map_drug_to_id("Digoxin").unwrap(), "DB00390");

        let csv_path = dir.path().join("map.csv");
        let mut file = std::fs::File::create(&csv_path).unwrap();
        writeln!(file, "drug_name,drug_id").unwrap();
        writeln!(file, "Aspirin, DB00945").unwrap();
        writeln!(file, "Ibuprofen,DB01050").unwrap();
        drop(file);
        let map = DrugIdMap::load(&csv_path).unwrap();
        assert_eq!(map.map_drug_to_id("Aspirin").unwrap(), "DB00945");
        assert_eq!(map.map_drug_to_id("Ibuprofen").unwrap(), "DB01050");
    }

    #[test]
    fn test_load_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.yaml");
        std::fs::write(&path, "Aspirin: DB00945").unwrap();
        assert!(matches!(DrugIdMap::load(&path), Err(DdiError::Config(_))));
    }
}
