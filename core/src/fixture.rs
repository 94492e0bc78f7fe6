//! Expected-shape fixtures used to detect drift during verification.
//!
//! A fixture lives at `<data_dir>/fixtures/<scenario_id>.json`.
//! A missing fixture is a configuration error, never a silent pass.

use crate::{
    dataset::Dataset,
    error::{SimError, SimResult},
    types::ScenarioId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureShape {
    pub total_metric_rows: u64,
    pub days:              u32,
    pub platforms:         u32,
    pub campaigns:         u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub scenario_id: ScenarioId,
    pub shape:       FixtureShape,
    /// Pinned dataset checksum. When absent, verification compares
    /// against the checksum of the regenerated projection instead.
    #[serde(default)]
    pub checksum:    Option<String>,
}

impl Fixture {
    /// Describe an already-projected dataset.
    pub fn from_dataset(scenario_id: &str, dataset: &Dataset, pin_checksum: bool) -> Self {
        let mut dates: Vec<_> = dataset.metrics.iter().map(|r| r.date).collect();
        dates.dedup();
        let mut platforms: Vec<_> = dataset.campaigns.iter().map(|c| c.platform).collect();
        platforms.sort();
        platforms.dedup();
        Self {
            scenario_id: scenario_id.to_string(),
            shape: FixtureShape {
                total_metric_rows: dataset.metrics.len() as u64,
                days:              dates.len() as u32,
                platforms:         platforms.len() as u32,
                campaigns:         dataset.campaigns.len() as u32,
            },
            checksum: pin_checksum.then(|| dataset.checksum()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    dir:    Option<PathBuf>,
    loaded: BTreeMap<ScenarioId, Fixture>,
}

impl FixtureProvider {
    pub fn load(data_dir: &Path) -> Self {
        Self { dir: Some(data_dir.join("fixtures")), loaded: BTreeMap::new() }
    }

    pub fn from_fixtures(fixtures: Vec<Fixture>) -> Self {
        Self {
            dir:    None,
            loaded: fixtures.into_iter().map(|f| (f.scenario_id.clone(), f)).collect(),
        }
    }

    pub fn load_fixture(&self, scenario_id: &str) -> SimResult<Fixture> {
        if let Some(f) = self.loaded.get(scenario_id) {
            return Ok(f.clone());
        }
        let Some(dir) = &self.dir else {
            return Err(SimError::Configuration(format!(
                "No fixture registered for scenario '{scenario_id}'"
            )));
        };
        let path = dir.join(format!("{scenario_id}.json"));
        let content = std::fs::read_to_string(&path).map_err(|e| {
            SimError::Configuration(format!("Missing fixture {}: {e}", path.display()))
        })?;
        let fixture: Fixture = serde_json::from_str(&content).map_err(|e| {
            SimError::Configuration(format!("Malformed fixture {}: {e}", path.display()))
        })?;
        if fixture.scenario_id != scenario_id {
            return Err(SimError::Configuration(format!(
                "Fixture {} describes scenario '{}'",
                path.display(),
                fixture.scenario_id
            )));
        }
        Ok(fixture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn absent_fixture_is_a_configuration_error() {
        let provider = FixtureProvider::from_fixtures(vec![]);
        let err = provider.load_fixture("steady-state").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let on_disk = FixtureProvider::load(Path::new("/nonexistent-adsim-data"));
        assert_eq!(on_disk.load_fixture("steady-state").unwrap_err().kind(), ErrorKind::Configuration);
    }

    #[test]
    fn checksum_is_optional_in_json() {
        let f: Fixture = serde_json::from_str(
            r#"{"scenarioId":"s","shape":{"totalMetricRows":14,"days":7,"platforms":2,"campaigns":2}}"#,
        )
        .unwrap();
        assert_eq!(f.checksum, None);
        assert_eq!(f.shape.total_metric_rows, 14);
    }
}
