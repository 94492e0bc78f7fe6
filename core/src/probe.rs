//! Health and contract checks against a running dashboard server, plus a
//! guard for a server process the toolkit starts itself.
//!
//! RULE: Polling is bounded. `wait_for_health` gives up after
//! `retries` attempts at `interval_ms` spacing with a Timeout error.

use crate::{
    config::HealthCheckConfig,
    error::{SimError, SimResult},
};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResponse {
    pub status: u16,
    pub body:   String,
}

/// One blocking GET. Non-2xx responses are values, not errors; only
/// transport failures are errors.
pub trait ServiceProbe {
    fn get(&self, url: &str, bearer_token: Option<&str>) -> SimResult<ProbeResponse>;
}

pub struct HttpProbe {
    agent: ureq::Agent,
}

impl HttpProbe {
    pub fn new(cfg: &HealthCheckConfig) -> Self {
        let timeout = Duration::from_millis(cfg.request_timeout_ms);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Self { agent }
    }
}

impl ServiceProbe for HttpProbe {
    fn get(&self, url: &str, bearer_token: Option<&str>) -> SimResult<ProbeResponse> {
        let mut req = self.agent.get(url).set("accept", "application/json");
        if let Some(token) = bearer_token {
            req = req.set("authorization", &format!("Bearer {token}"));
        }
        match req.call() {
            Ok(resp) => {
                let status = resp.status();
                Ok(ProbeResponse { status, body: resp.into_string()? })
            }
            Err(ureq::Error::Status(code, resp)) => Ok(ProbeResponse {
                status: code,
                body:   resp.into_string().unwrap_or_default(),
            }),
            Err(ureq::Error::Transport(err)) => Err(SimError::dependency("probe.get", "-", err)),
        }
    }
}

/// Poll the health endpoint until it answers 200. Returns the attempt
/// number that succeeded.
pub fn wait_for_health(probe: &dyn ServiceProbe, cfg: &HealthCheckConfig) -> SimResult<u32> {
    let attempts = cfg.retries.max(1);
    let mut last = String::from("no attempt made");
    for attempt in 1..=attempts {
        match probe.get(&cfg.health_url, None) {
            Ok(resp) if resp.status == 200 => {
                log::info!(target: "adsim", "health ok after {attempt} attempt(s)");
                return Ok(attempt);
            }
            Ok(resp) => last = format!("HTTP {}", resp.status),
            Err(e) => last = e.to_string(),
        }
        log::debug!(target: "adsim", "health attempt {attempt}/{attempts}: {last}");
        if attempt < attempts {
            std::thread::sleep(Duration::from_millis(cfg.interval_ms));
        }
    }
    Err(SimError::Timeout {
        operation: format!("health {}", cfg.health_url),
        attempts,
        message: last,
    })
}

/// Authenticated GET of the overview endpoint; the body must satisfy
/// `validate_overview`. Returns the number of platform entries.
pub fn check_overview_contract(
    probe: &dyn ServiceProbe,
    cfg: &HealthCheckConfig,
    tenant_id: &str,
) -> SimResult<usize> {
    let token = cfg
        .api_token
        .as_deref()
        .ok_or_else(|| SimError::Configuration("ADSIM_API_TOKEN is required for the overview check".into()))?;
    let resp = probe.get(&cfg.overview_url, Some(token))?;
    if resp.status != 200 {
        return Err(SimError::dependency(
            "overview.get",
            tenant_id,
            format!("HTTP {} from {}", resp.status, cfg.overview_url),
        ));
    }
    let body: Value = serde_json::from_str(&resp.body)
        .map_err(|e| SimError::dependency("overview.parse", tenant_id, e))?;
    validate_overview(&body).map_err(|msg| SimError::dependency("overview.contract", tenant_id, msg))
}

/// `data.platformPerformance` must be present and an array.
pub fn validate_overview(body: &Value) -> Result<usize, String> {
    let data = body.get("data").ok_or("missing 'data'")?;
    match data.get("platformPerformance") {
        Some(Value::Array(items)) => Ok(items.len()),
        Some(other) => Err(format!("'data.platformPerformance' is {}, expected an array", json_type(other))),
        None => Err("missing 'data.platformPerformance'".into()),
    }
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}

// ── Managed server process ────────────────────────────────────

pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// A child process whose stdout/stderr go to a log file. Stopped on
/// drop: SIGTERM, then a forced kill once the grace period runs out.
pub struct ManagedProcess {
    child:         Option<Child>,
    log_path:      PathBuf,
    max_log_bytes: u64,
    grace:         Duration,
}

impl ManagedProcess {
    pub fn spawn(program: &str, args: &[String], log_path: &Path, max_log_bytes: u64) -> SimResult<Self> {
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let log = File::create(log_path)?;
        let err_log = log.try_clone()?;
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(err_log))
            .spawn()
            .map_err(|e| SimError::dependency(format!("spawn {program}"), "-", e))?;
        log::info!(target: "adsim", "started {program} (pid {})", child.id());
        Ok(Self {
            child: Some(child),
            log_path: log_path.to_path_buf(),
            max_log_bytes,
            grace: DEFAULT_GRACE,
        })
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// The last `max_log_bytes` of captured output.
    pub fn log_tail(&self) -> SimResult<String> {
        let mut file = File::open(&self.log_path)?;
        let len = file.metadata()?.len();
        if len > self.max_log_bytes {
            file.seek(SeekFrom::Start(len - self.max_log_bytes))?;
        }
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Idempotent. Returns the exit status if a live child was stopped.
    pub fn stop(&mut self) -> SimResult<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }

        let pid = child.id();
        if send_term(pid) {
            let deadline = Instant::now() + self.grace;
            while Instant::now() < deadline {
                if let Some(status) = child.try_wait()? {
                    log::info!(target: "adsim", "pid {pid} exited after SIGTERM");
                    return Ok(Some(status));
                }
                std::thread::sleep(Duration::from_millis(50));
            }
        }

        log::warn!(target: "adsim", "pid {pid} still running after {:?}, killing", self.grace);
        child.kill()?;
        Ok(Some(child.wait()?))
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!(target: "adsim", "failed to stop managed process: {e}");
        }
    }
}

#[cfg(unix)]
fn send_term(pid: u32) -> bool {
    Command::new("kill")
        .arg("-TERM")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn send_term(_pid: u32) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn overview_contract_requires_array() {
        assert_eq!(validate_overview(&json!({ "data": { "platformPerformance": [1, 2] } })), Ok(2));
        assert!(validate_overview(&json!({ "data": { "platformPerformance": {} } })).is_err());
        assert!(validate_overview(&json!({ "data": {} })).is_err());
        assert!(validate_overview(&json!({ "platformPerformance": [] })).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn stop_terminates_a_sleeping_child() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("service.log");
        let mut proc = ManagedProcess::spawn("sleep", &["30".into()], &log, 1024)
            .unwrap()
            .with_grace(Duration::from_secs(2));
        assert!(proc.is_running());
        let status = proc.stop().unwrap();
        assert!(status.is_some());
        assert!(!proc.is_running());
        assert!(proc.stop().unwrap().is_none(), "second stop is a no-op");
    }

    #[cfg(unix)]
    #[test]
    fn log_tail_is_capped() {
        let tmp = tempfile::tempdir().unwrap();
        let log = tmp.path().join("service.log");
        let mut proc = ManagedProcess::spawn("sh", &["-c".into(), "echo 0123456789abcdef".into()], &log, 6).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while proc.is_running() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(proc.log_tail().unwrap(), "bcdef\n");
        drop(proc);
    }
}
