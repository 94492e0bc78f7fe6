//! JSON report persistence.
//!
//! Layout: `<reports_dir>/<kind>/<run_id>.json` plus `<kind>/latest.json`,
//! which always mirrors the most recent write of that kind.

use crate::error::{SimError, SimResult};
use serde::{de::DeserializeOwned, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const LATEST_FILE: &str = "latest.json";

#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `write_json(kind, run_id, ..)` will land.
    pub fn path_for(&self, kind: &str, run_id: &str) -> SimResult<PathBuf> {
        check_segment("kind", kind)?;
        check_segment("run_id", run_id)?;
        Ok(self.dir.join(kind).join(format!("{run_id}.json")))
    }

    /// Write `value` pretty-printed, then refresh `latest.json`.
    /// Returns the per-run path.
    pub fn write_json<T: Serialize>(&self, kind: &str, run_id: &str, value: &T) -> SimResult<PathBuf> {
        let path = self.path_for(kind, run_id)?;
        let body = serde_json::to_string_pretty(value)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, &body)?;
        fs::write(self.dir.join(kind).join(LATEST_FILE), &body)?;
        log::debug!(target: "adsim", "report written: {}", path.display());
        Ok(path)
    }

    pub fn read_latest<T: DeserializeOwned>(&self, kind: &str) -> SimResult<Option<T>> {
        check_segment("kind", kind)?;
        let path = self.dir.join(kind).join(LATEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&raw)?))
    }
}

/// Report kinds and run ids become path segments; keep them flat.
fn check_segment(field: &str, value: &str) -> SimResult<()> {
    let ok = !value.is_empty()
        && value != "."
        && value != ".."
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        Err(SimError::validation(field, format!("'{value}' is not a valid file name segment")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::tempdir;

    #[test]
    fn writes_run_file_and_latest() {
        let tmp = tempdir().unwrap();
        let dir = tmp.path().join("reports");
        let writer = ReportWriter::new(&dir);
        let path = writer.write_json("verification", "run-1", &json!({ "n": 1 })).unwrap();
        writer.write_json("verification", "run-2", &json!({ "n": 2 })).unwrap();

        assert_eq!(path, dir.join("verification").join("run-1.json"));
        assert!(path.exists());
        let latest: Value = writer.read_latest("verification").unwrap().unwrap();
        assert_eq!(latest["n"], 2);
    }

    #[test]
    fn rejects_path_traversal() {
        let tmp = tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path());
        assert!(writer.path_for("../etc", "run-1").is_err());
        assert!(writer.path_for("manifests", "a/b").is_err());
    }

    #[test]
    fn missing_latest_is_none() {
        let tmp = tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path());
        let latest: Option<Value> = writer.read_latest("manifests").unwrap();
        assert!(latest.is_none());
    }
}
