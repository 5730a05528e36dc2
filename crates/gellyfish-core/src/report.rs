//! Reports returned by the maintenance actions, with JSON persistence.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-model record counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCounts {
    pub challenges: usize,
    pub foods: usize,
    pub jellyfish: usize,
    pub homes: usize,
    pub food_chains: usize,
}

/// Source id to target id, per model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdMaps {
    pub challenge: BTreeMap<String, String>,
    pub food: BTreeMap<String, String>,
    pub jellyfish: BTreeMap<String, String>,
    pub home: BTreeMap<String, String>,
    pub food_chain: BTreeMap<String, String>,
}

/// Outcome of copying records between environments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopyReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub source: String,
    pub target: String,
    pub success: bool,
    pub counts: ModelCounts,
    pub id_maps: IdMaps,
}

/// Foods given to one jellyfish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodAssignment {
    pub jellyfish_id: String,
    pub jellyfish_name: String,
    pub food_names: Vec<String>,
}

/// Outcome of the random food assignment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignReport {
    pub run_id: Uuid,
    pub total_jellies: usize,
    pub total_foods: usize,
    pub assignments: Vec<FoodAssignment>,
    /// Jellyfish left untouched because no foods were available.
    pub skipped: Vec<String>,
}

/// A created challenge, as listed in [`SeedReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeededChallenge {
    pub id: String,
    pub number: u32,
    pub title: String,
}

/// Outcome of seeding challenges from `.gelly` files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub run_id: Uuid,
    pub success: bool,
    pub parsed: usize,
    pub created: usize,
    pub challenges: Vec<SeededChallenge>,
}

/// Write any report as pretty JSON, creating parent directories.
pub fn save_json<T: Serialize>(report: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}

/// Read a report written by [`save_json`].
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read report from {}", path.display()))?;
    serde_json::from_str(&content).context("failed to parse report JSON")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_report_uses_camel_case_keys() {
        let mut id_maps = IdMaps::default();
        id_maps.food_chain.insert("1".into(), "10".into());
        let report = CopyReport {
            run_id: Uuid::nil(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            source: "development".into(),
            target: "production".into(),
            success: true,
            counts: ModelCounts {
                food_chains: 1,
                ..Default::default()
            },
            id_maps,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["counts"]["foodChains"], 1);
        assert_eq!(json["idMaps"]["foodChain"]["1"], "10");
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join("seed.json");
        let report = SeedReport {
            run_id: Uuid::new_v4(),
            success: true,
            parsed: 1,
            created: 1,
            challenges: vec![SeededChallenge {
                id: "1".into(),
                number: 1,
                title: "Census".into(),
            }],
        };
        save_json(&report, &path).unwrap();
        let loaded: SeedReport = load_json(&path).unwrap();
        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.challenges, report.challenges);
    }
}
