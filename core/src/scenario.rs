//! Named, versioned scenario definitions.
//!
//! Scenarios live in `<data_dir>/scenarios/scenarios.json`.
//! They are read once and never mutated; commands look them up by id.

use crate::{
    error::{SimError, SimResult},
    rng::Seed,
    types::{Platform, ScenarioId, TrendProfile},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SCENARIO_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub schema_version:         u32,
    pub scenario_id:            ScenarioId,
    pub name:                   String,
    pub trend:                  TrendProfile,
    pub days:                   u32,
    pub base_impressions:       u64,
    pub platforms:              Vec<Platform>,
    pub seed:                   Seed,
    pub start_date:             NaiveDate,
    #[serde(default = "one")]
    pub campaigns_per_platform: u32,
}

fn one() -> u32 { 1 }

impl Scenario {
    pub fn end_date(&self, days: u32) -> NaiveDate {
        self.start_date + chrono::Duration::days(i64::from(days.max(1)) - 1)
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ScenariosFile {
    scenarios: Vec<Scenario>,
}

/// All known scenarios, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ScenarioCatalog {
    scenarios: BTreeMap<ScenarioId, Scenario>,
}

impl ScenarioCatalog {
    /// Load from the data/ directory.
    /// In tests, use ScenarioCatalog::builtin().
    pub fn load(data_dir: &Path) -> SimResult<Self> {
        let path = data_dir.join("scenarios").join("scenarios.json");
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SimError::Configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> SimResult<Self> {
        let file: ScenariosFile = serde_json::from_str(content)
            .map_err(|e| SimError::Configuration(format!("Malformed scenarios file: {e}")))?;
        Self::from_scenarios(file.scenarios)
    }

    pub fn from_scenarios(scenarios: Vec<Scenario>) -> SimResult<Self> {
        let mut map = BTreeMap::new();
        for s in scenarios {
            if s.schema_version != SCENARIO_SCHEMA_VERSION {
                return Err(SimError::Configuration(format!(
                    "Scenario '{}' has schemaVersion {}, expected {SCENARIO_SCHEMA_VERSION}",
                    s.scenario_id, s.schema_version
                )));
            }
            if s.platforms.is_empty() || s.days == 0 {
                return Err(SimError::Configuration(format!(
                    "Scenario '{}' must name at least one platform and one day",
                    s.scenario_id
                )));
            }
            if map.insert(s.scenario_id.clone(), s).is_some() {
                return Err(SimError::Configuration("Duplicate scenario id".into()));
            }
        }
        Ok(Self { scenarios: map })
    }

    /// Small catalog compiled into the crate; mirrors data/scenarios.
    pub fn builtin() -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap_or(NaiveDate::MIN);
        let mk = |id: &str, name: &str, trend, days, platforms: Vec<Platform>, seed: &str| Scenario {
            schema_version:         SCENARIO_SCHEMA_VERSION,
            scenario_id:            id.into(),
            name:                   name.into(),
            trend,
            days,
            base_impressions:       10_000,
            platforms,
            seed:                   Seed::Text(seed.into()),
            start_date:             start,
            campaigns_per_platform: 1,
        };
        let scenarios = vec![
            mk("steady-state", "Steady state", TrendProfile::Stable, 30,
               vec![Platform::GoogleAds, Platform::Facebook], "steady-state-v1"),
            mk("growth-spurt", "Growth spurt", TrendProfile::Growth, 60,
               vec![Platform::GoogleAds, Platform::TikTok], "growth-spurt-v1"),
            mk("slow-decline", "Slow decline", TrendProfile::Decline, 45,
               vec![Platform::Facebook, Platform::LinkedIn], "slow-decline-v1"),
        ];
        Self {
            scenarios: scenarios.into_iter().map(|s| (s.scenario_id.clone(), s)).collect(),
        }
    }

    pub fn get(&self, scenario_id: &str) -> SimResult<&Scenario> {
        self.scenarios
            .get(scenario_id)
            .ok_or_else(|| SimError::not_found("scenario", scenario_id))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.scenarios.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize { self.scenarios.len() }

    pub fn is_empty(&self) -> bool { self.scenarios.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn unknown_id_is_not_found() {
        let catalog = ScenarioCatalog::builtin();
        let err = catalog.get("no-such-scenario").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn parses_camel_case_json() {
        let json = r#"{ "scenarios": [ {
            "schemaVersion": 1, "scenarioId": "s1", "name": "S1",
            "trend": "GROWTH", "days": 7, "baseImpressions": 500,
            "platforms": ["GoogleAds"], "seed": 42, "startDate": "2024-03-01"
        } ] }"#;
        let catalog = ScenarioCatalog::from_json(json).unwrap();
        let s = catalog.get("s1").unwrap();
        assert_eq!(s.trend, TrendProfile::Growth);
        assert_eq!(s.seed, Seed::Number(42));
        assert_eq!(s.campaigns_per_platform, 1);
        assert_eq!(s.end_date(7), NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
    }

    #[test]
    fn rejects_unknown_schema_version() {
        let json = r#"{ "scenarios": [ {
            "schemaVersion": 9, "scenarioId": "s1", "name": "S1",
            "trend": "STABLE", "days": 7, "baseImpressions": 500,
            "platforms": ["GoogleAds"], "seed": "x", "startDate": "2024-03-01"
        } ] }"#;
        let err = ScenarioCatalog::from_json(json).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }
}
