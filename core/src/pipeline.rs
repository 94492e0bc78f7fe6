//! Manifest pipeline: ordered steps folded into one run manifest.
//!
//! RULE: Steps run strictly in order, one at a time.
//!   - A failed Precondition step blocks the run (BLOCKED, exit 78);
//!     nothing after it runs.
//!   - Any other failed step fails the run (FAIL, exit 1) and stops it.
//!   - A Verify step that reports warnings but no failures makes the run
//!     WARN (exit 0). Otherwise the run is SUCCESS (exit 0).
//!
//! The manifest is always persisted, whatever the status.

use crate::{
    command::CommandHandler,
    commands::{BootstrapOutcome, PreflightReport, SeedOutcome},
    config::HealthCheckConfig,
    context::ExecutionContext,
    error::{SimError, SimResult, EXIT_BLOCKED, EXIT_FAILURE},
    probe::{check_overview_contract, wait_for_health, ServiceProbe},
    report::ReportWriter,
    types::{RunId, TenantId},
    verification::{SummaryStatus, VerificationReport},
};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const MANIFEST_SCHEMA_VERSION: u32 = 1;
pub const MANIFEST_KIND: &str = "manifests";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepKind {
    Precondition,
    Write,
    Verify,
    Check,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Ok,
    Warn,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestStatus {
    Success,
    Warn,
    Blocked,
    Fail,
}

impl ManifestStatus {
    pub fn exit_code(self) -> i32 {
        match self {
            Self::Success | Self::Warn => 0,
            Self::Blocked => EXIT_BLOCKED,
            Self::Fail => EXIT_FAILURE,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Warn    => "WARN",
            Self::Blocked => "BLOCKED",
            Self::Fail    => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckCounts {
    pub passed:   u32,
    pub failed:   u32,
    pub warnings: u32,
}

/// Parse "N passed, M failed, K warnings". Order-insensitive; any part
/// may be missing but at least one must be present.
pub fn parse_check_summary(text: &str) -> Option<CheckCounts> {
    let mut counts = CheckCounts::default();
    let mut seen = false;
    let words: Vec<&str> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect();
    for pair in words.windows(2) {
        let Ok(n) = pair[0].parse::<u32>() else { continue };
        let label = pair[1].trim_end_matches(|c: char| !c.is_ascii_alphabetic()).to_ascii_lowercase();
        let slot = match label.as_str() {
            "passed" | "pass"               => &mut counts.passed,
            "failed" | "fail"               => &mut counts.failed,
            "warnings" | "warning" | "warn" => &mut counts.warnings,
            _ => continue,
        };
        *slot = n;
        seen = true;
    }
    seen.then_some(counts)
}

/// What a step reports back to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub name:              String,
    pub kind:              StepKind,
    pub status:            StepStatus,
    pub summary:           String,
    /// Structured verification counts. When absent, counts are parsed
    /// from `summary`.
    pub counts:            Option<CheckCounts>,
    pub filesystem_writes: Vec<PathBuf>,
    pub rows_written:      u64,
    pub campaigns_written: u64,
}

impl StepOutcome {
    pub fn new(name: impl Into<String>, kind: StepKind, status: StepStatus, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            status,
            summary: summary.into(),
            counts: None,
            filesystem_writes: Vec::new(),
            rows_written: 0,
            campaigns_written: 0,
        }
    }

    fn effective_counts(&self) -> Option<CheckCounts> {
        self.counts.or_else(|| match self.kind {
            StepKind::Verify => parse_check_summary(&self.summary),
            _ => None,
        })
    }
}

pub trait PipelineStep {
    fn name(&self) -> &str;
    fn kind(&self) -> StepKind;
    fn run(&self, ctx: &ExecutionContext) -> SimResult<StepOutcome>;
}

// ── Manifest ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestStep {
    pub name:    String,
    pub kind:    StepKind,
    pub status:  StepStatus,
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counts:  Option<CheckCounts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActualCounts {
    pub total_rows: u64,
    pub campaigns:  u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WritesApplied {
    pub dry_run:       bool,
    pub actual_counts: ActualCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestResults {
    pub writes_applied:    WritesApplied,
    /// Masked paths; never absolute paths inside the workspace.
    pub filesystem_writes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub schema_version: u32,
    pub run_id:         RunId,
    pub correlation_id: String,
    pub tenant_id:      TenantId,
    pub created_at:     String,
    pub duration_ms:    u64,
    pub dry_run:        bool,
    pub status:         ManifestStatus,
    pub exit_code:      i32,
    pub steps:          Vec<ManifestStep>,
    pub results:        ManifestResults,
}

/// What a SUCCESS or WARN run hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSuccess {
    pub manifest:     Manifest,
    pub path:         PathBuf,
    pub rows_created: u64,
}

/// Fold step outcomes into a status. A step that failed with an error
/// is represented as a `Failed` outcome.
pub fn fold_status(outcomes: &[StepOutcome]) -> ManifestStatus {
    let mut status = ManifestStatus::Success;
    for o in outcomes {
        let counts = o.effective_counts();
        let failed = o.status == StepStatus::Failed || counts.is_some_and(|c| c.failed > 0);
        if failed {
            return match o.kind {
                StepKind::Precondition => ManifestStatus::Blocked,
                _ => ManifestStatus::Fail,
            };
        }
        let warned = o.status == StepStatus::Warn || counts.is_some_and(|c| c.warnings > 0);
        if warned && o.kind == StepKind::Verify {
            status = ManifestStatus::Warn;
        }
    }
    status
}

/// SUCCESS/WARN become `PipelineSuccess`; BLOCKED/FAIL become
/// `SimError::Pipeline` carrying the exit code.
pub fn into_result(manifest: Manifest, path: PathBuf) -> SimResult<PipelineSuccess> {
    match manifest.status {
        ManifestStatus::Success | ManifestStatus::Warn => Ok(PipelineSuccess {
            rows_created: manifest.results.writes_applied.actual_counts.total_rows,
            manifest,
            path,
        }),
        ManifestStatus::Blocked | ManifestStatus::Fail => {
            let failing = manifest
                .steps
                .iter()
                .find(|s| s.status == StepStatus::Failed || s.counts.is_some_and(|c| c.failed > 0));
            let reason = match failing {
                Some(step) => format!("step {} failed: {} (manifest {})", step.name, step.summary, path.display()),
                None => format!("see manifest {}", path.display()),
            };
            Err(SimError::Pipeline {
                status: manifest.status.as_str().to_string(),
                exit_code: manifest.exit_code,
                reason,
            })
        }
    }
}

// ── Path masking ──────────────────────────────────────────────

/// Relative to `root` when inside it, `~/…` under the home directory,
/// `<external>/<file>` otherwise.
pub fn mask_path(path: &Path, root: &Path) -> String {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    mask_path_with_home(path, root, home.as_deref())
}

pub fn mask_path_with_home(path: &Path, root: &Path, home: Option<&Path>) -> String {
    if let Ok(rel) = path.strip_prefix(root) {
        let joined = join_components(rel);
        return if joined.is_empty() { ".".into() } else { joined };
    }
    if let Some(rel) = home.and_then(|h| path.strip_prefix(h).ok()) {
        return format!("~/{}", join_components(rel));
    }
    let file = path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("<external>/{file}")
}

fn join_components(rel: &Path) -> String {
    rel.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

// ── Pipeline ──────────────────────────────────────────────────

pub struct ManifestPipeline<'a> {
    steps:          Vec<Box<dyn PipelineStep + 'a>>,
    writer:         &'a ReportWriter,
    workspace_root: PathBuf,
}

impl<'a> ManifestPipeline<'a> {
    pub fn new(writer: &'a ReportWriter, workspace_root: impl Into<PathBuf>) -> Self {
        Self { steps: Vec::new(), writer, workspace_root: workspace_root.into() }
    }

    pub fn step(mut self, step: impl PipelineStep + 'a) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn run(&self, ctx: &ExecutionContext) -> SimResult<PipelineSuccess> {
        let log = ctx.logger();
        let mut outcomes: Vec<StepOutcome> = Vec::with_capacity(self.steps.len());

        for step in &self.steps {
            log.info(&format!("step {} ({:?}) starting", step.name(), step.kind()));
            let outcome = match step.run(ctx) {
                Ok(o) => o,
                Err(e) => {
                    log.warn(&format!("step {} error [{:?}]: {e}", step.name(), e.kind()));
                    StepOutcome::new(step.name(), step.kind(), StepStatus::Failed, e.to_string())
                }
            };
            ctx.print(&format!("[{:?}] {}: {}", outcome.status, outcome.name, outcome.summary));
            outcomes.push(outcome);
            if matches!(fold_status(&outcomes), ManifestStatus::Blocked | ManifestStatus::Fail) {
                break;
            }
        }

        let status = fold_status(&outcomes);
        let path = self.writer.path_for(MANIFEST_KIND, &ctx.run_id)?;
        let manifest = self.build_manifest(ctx, status, &outcomes, &path);
        let path = self.writer.write_json(MANIFEST_KIND, &ctx.run_id, &manifest)?;

        let line = format!("pipeline {}: exit {}", status.as_str(), manifest.exit_code);
        if status.exit_code() == 0 {
            log.info(&line);
        } else {
            log.warn(&line);
        }
        ctx.print(&format!("{line} (manifest {})", mask_path(&path, &self.workspace_root)));
        into_result(manifest, path)
    }

    fn build_manifest(
        &self,
        ctx: &ExecutionContext,
        status: ManifestStatus,
        outcomes: &[StepOutcome],
        manifest_path: &Path,
    ) -> Manifest {
        let mut filesystem_writes: Vec<String> = outcomes
            .iter()
            .flat_map(|o| o.filesystem_writes.iter())
            .map(|p| mask_path(p, &self.workspace_root))
            .collect();
        filesystem_writes.push(mask_path(manifest_path, &self.workspace_root));

        Manifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            run_id:         ctx.run_id.clone(),
            correlation_id: ctx.correlation_id.clone(),
            tenant_id:      ctx.tenant_id.clone(),
            created_at:     chrono::Utc::now().to_rfc3339(),
            duration_ms:    ctx.elapsed_ms(),
            dry_run:        ctx.dry_run,
            status,
            exit_code:      status.exit_code(),
            steps: outcomes
                .iter()
                .map(|o| ManifestStep {
                    name:    o.name.clone(),
                    kind:    o.kind,
                    status:  o.status,
                    summary: o.summary.clone(),
                    counts:  o.effective_counts(),
                })
                .collect(),
            results: ManifestResults {
                writes_applied: WritesApplied {
                    dry_run: ctx.dry_run,
                    actual_counts: ActualCounts {
                        total_rows: outcomes.iter().map(|o| o.rows_written).sum(),
                        campaigns:  outcomes.iter().map(|o| o.campaigns_written).sum(),
                    },
                },
                filesystem_writes,
            },
        }
    }
}

// ── Step adapters ─────────────────────────────────────────────

/// How a command output reads as a pipeline step.
pub trait StepReport {
    fn step_status(&self) -> StepStatus;
    fn step_summary(&self) -> String;
    fn check_counts(&self) -> Option<CheckCounts> {
        None
    }
    /// (metric rows, campaigns) actually written.
    fn writes(&self) -> (u64, u64) {
        (0, 0)
    }
}

impl StepReport for PreflightReport {
    fn step_status(&self) -> StepStatus {
        if self.ok { StepStatus::Ok } else { StepStatus::Failed }
    }

    fn step_summary(&self) -> String {
        self.summary()
    }
}

impl StepReport for BootstrapOutcome {
    fn step_status(&self) -> StepStatus {
        StepStatus::Ok
    }

    fn step_summary(&self) -> String {
        match (self.already_existed, self.dry_run) {
            (true, _)      => format!("tenant {} already exists", self.tenant_id),
            (false, true)  => format!("would create tenant {}", self.tenant_id),
            (false, false) => format!("created tenant {}", self.tenant_id),
        }
    }
}

impl StepReport for SeedOutcome {
    fn step_status(&self) -> StepStatus {
        StepStatus::Ok
    }

    fn step_summary(&self) -> String {
        self.summary()
    }

    fn writes(&self) -> (u64, u64) {
        (self.rows_created, self.campaigns_created)
    }
}

impl StepReport for VerificationReport {
    fn step_status(&self) -> StepStatus {
        match self.summary.status {
            SummaryStatus::Pass => StepStatus::Ok,
            SummaryStatus::Warn => StepStatus::Warn,
            SummaryStatus::Fail => StepStatus::Failed,
        }
    }

    fn step_summary(&self) -> String {
        self.summary.text()
    }

    fn check_counts(&self) -> Option<CheckCounts> {
        Some(CheckCounts {
            passed:   self.summary.passed,
            failed:   self.summary.failed,
            warnings: self.summary.warnings,
        })
    }
}

/// Runs a command handler as a pipeline step, optionally persisting its
/// output as a report of `report_kind`.
pub struct CommandStep<'a, H: CommandHandler> {
    handler: H,
    command: H::Command,
    kind:    StepKind,
    report:  Option<(&'a ReportWriter, &'static str)>,
}

impl<'a, H: CommandHandler> CommandStep<'a, H> {
    pub fn new(handler: H, command: H::Command, kind: StepKind) -> Self {
        Self { handler, command, kind, report: None }
    }

    pub fn persist_as(mut self, writer: &'a ReportWriter, report_kind: &'static str) -> Self {
        self.report = Some((writer, report_kind));
        self
    }
}

impl<H> PipelineStep for CommandStep<'_, H>
where
    H: CommandHandler,
    H::Output: StepReport + Serialize,
{
    fn name(&self) -> &str {
        self.handler.name()
    }

    fn kind(&self) -> StepKind {
        self.kind
    }

    fn run(&self, ctx: &ExecutionContext) -> SimResult<StepOutcome> {
        let output = self.handler.run(&self.command, ctx)?;
        let mut outcome = StepOutcome::new(self.name(), self.kind, output.step_status(), output.step_summary());
        outcome.counts = output.check_counts();
        (outcome.rows_written, outcome.campaigns_written) = output.writes();
        if let Some((writer, report_kind)) = self.report {
            outcome.filesystem_writes.push(writer.write_json(report_kind, &ctx.run_id, &output)?);
        }
        Ok(outcome)
    }
}

/// Placeholder for a step that cannot run in this mode, e.g. verifying
/// a dry-run seed. Always OK; the reason is the summary.
pub struct SkippedStep {
    name:   String,
    kind:   StepKind,
    reason: String,
}

impl SkippedStep {
    pub fn new(name: impl Into<String>, kind: StepKind, reason: impl Into<String>) -> Self {
        Self { name: name.into(), kind, reason: reason.into() }
    }
}

impl PipelineStep for SkippedStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> StepKind {
        self.kind
    }

    fn run(&self, _ctx: &ExecutionContext) -> SimResult<StepOutcome> {
        Ok(StepOutcome::new(&self.name, self.kind, StepStatus::Ok, format!("skipped: {}", self.reason)))
    }
}

/// Waits for the server's health endpoint, then checks the overview
/// response shape.
pub struct OverviewCheckStep<'a> {
    probe:  &'a dyn ServiceProbe,
    health: &'a HealthCheckConfig,
}

impl<'a> OverviewCheckStep<'a> {
    pub fn new(probe: &'a dyn ServiceProbe, health: &'a HealthCheckConfig) -> Self {
        Self { probe, health }
    }
}

impl PipelineStep for OverviewCheckStep<'_> {
    fn name(&self) -> &str {
        "overview-check"
    }

    fn kind(&self) -> StepKind {
        StepKind::Check
    }

    fn run(&self, ctx: &ExecutionContext) -> SimResult<StepOutcome> {
        let attempts = wait_for_health(self.probe, self.health)?;
        let platforms = check_overview_contract(self.probe, self.health, &ctx.tenant_id)?;
        Ok(StepOutcome::new(
            self.name(),
            StepKind::Check,
            StepStatus::Ok,
            format!("healthy after {attempts} attempt(s), {platforms} platform entries"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_summary_text() {
        assert_eq!(
            parse_check_summary("8 passed, 0 failed, 2 warnings"),
            Some(CheckCounts { passed: 8, failed: 0, warnings: 2 })
        );
        assert_eq!(
            parse_check_summary("1 warning, 3 passed"),
            Some(CheckCounts { passed: 3, failed: 0, warnings: 1 })
        );
        assert_eq!(parse_check_summary("all good"), None);
    }

    #[test]
    fn text_counts_are_used_when_structured_counts_are_missing() {
        let verify = StepOutcome::new("verify", StepKind::Verify, StepStatus::Ok, "8 passed, 0 failed, 2 warnings");
        assert_eq!(fold_status(&[verify]), ManifestStatus::Warn);
    }

    #[test]
    fn warnings_outside_verify_steps_do_not_warn_the_run() {
        let check = StepOutcome::new("overview-check", StepKind::Check, StepStatus::Warn, "slow");
        assert_eq!(fold_status(&[check]), ManifestStatus::Success);
    }

    #[test]
    fn masks_paths() {
        let root = Path::new("/work/repo");
        let home = Some(Path::new("/home/dev"));
        assert_eq!(mask_path_with_home(Path::new("/work/repo/reports/a.json"), root, home), "reports/a.json");
        assert_eq!(mask_path_with_home(Path::new("/home/dev/tmp/a.json"), root, home), "~/tmp/a.json");
        assert_eq!(mask_path_with_home(Path::new("/var/tmp/a.json"), root, home), "<external>/a.json");
        assert_eq!(mask_path_with_home(root, root, home), ".");
    }
}
