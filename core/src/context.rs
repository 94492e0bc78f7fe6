//! Per-invocation execution context.
//!
//! Built once by the caller, threaded by reference through every
//! command, never mutated. `with()` derives a modified copy.

use crate::types::{RunId, TenantId};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex};

/// User-facing text output. Status never travels only through here.
pub trait Printer: Send + Sync {
    fn line(&self, text: &str);
}

pub struct StdoutPrinter;

impl Printer for StdoutPrinter {
    fn line(&self, text: &str) {
        println!("{text}");
    }
}

pub struct SilentPrinter;

impl Printer for SilentPrinter {
    fn line(&self, _text: &str) {}
}

/// Collects lines in memory. Used in tests.
#[derive(Default)]
pub struct BufferPrinter {
    lines: Mutex<Vec<String>>,
}

impl BufferPrinter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl Printer for BufferPrinter {
    fn line(&self, text: &str) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.push(text.to_string());
        }
    }
}

/// Log facade wrapper that tags every record with the run it belongs to.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id:         RunId,
    correlation_id: String,
    verbose:        bool,
}

impl RunLogger {
    pub fn info(&self, msg: &str) {
        log::info!(target: "adsim", "[run={} corr={}] {msg}", self.run_id, self.correlation_id);
    }

    pub fn warn(&self, msg: &str) {
        log::warn!(target: "adsim", "[run={} corr={}] {msg}", self.run_id, self.correlation_id);
    }

    /// Debug records are promoted to info when the run is verbose.
    pub fn debug(&self, msg: &str) {
        if self.verbose {
            self.info(msg);
        } else {
            log::debug!(target: "adsim", "[run={} corr={}] {msg}", self.run_id, self.correlation_id);
        }
    }
}

#[derive(Clone)]
pub struct ExecutionContext {
    pub tenant_id:      TenantId,
    pub correlation_id: String,
    pub run_id:         RunId,
    pub started_at:     DateTime<Utc>,
    pub dry_run:        bool,
    pub verbose:        bool,
    logger:             RunLogger,
    printer:            Arc<dyn Printer>,
}

/// Fields `with()` may override. Unset fields keep the parent's value.
#[derive(Debug, Clone, Default)]
pub struct ContextOverrides {
    pub tenant_id:      Option<TenantId>,
    pub correlation_id: Option<String>,
    pub run_id:         Option<RunId>,
    pub dry_run:        Option<bool>,
    pub verbose:        Option<bool>,
}

impl ExecutionContext {
    /// Fresh context with generated run and correlation ids.
    pub fn new(tenant_id: impl Into<TenantId>, dry_run: bool, printer: Arc<dyn Printer>) -> Self {
        let run_id = format!("run-{}", uuid::Uuid::new_v4().simple());
        let correlation_id = uuid::Uuid::new_v4().to_string();
        Self::build(tenant_id.into(), correlation_id, run_id, Utc::now(), dry_run, false, printer)
    }

    fn build(
        tenant_id: TenantId,
        correlation_id: String,
        run_id: RunId,
        started_at: DateTime<Utc>,
        dry_run: bool,
        verbose: bool,
        printer: Arc<dyn Printer>,
    ) -> Self {
        let logger = RunLogger {
            run_id:         run_id.clone(),
            correlation_id: correlation_id.clone(),
            verbose,
        };
        Self { tenant_id, correlation_id, run_id, started_at, dry_run, verbose, logger, printer }
    }

    /// Copy with overrides applied. `started_at` and the printer carry over.
    pub fn with(&self, o: ContextOverrides) -> Self {
        Self::build(
            o.tenant_id.unwrap_or_else(|| self.tenant_id.clone()),
            o.correlation_id.unwrap_or_else(|| self.correlation_id.clone()),
            o.run_id.unwrap_or_else(|| self.run_id.clone()),
            self.started_at,
            o.dry_run.unwrap_or(self.dry_run),
            o.verbose.unwrap_or(self.verbose),
            Arc::clone(&self.printer),
        )
    }

    pub fn elapsed_ms(&self) -> u64 {
        (Utc::now() - self.started_at).num_milliseconds().max(0) as u64
    }

    pub fn logger(&self) -> &RunLogger {
        &self.logger
    }

    pub fn print(&self, text: &str) {
        self.printer.line(text);
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("tenant_id", &self.tenant_id)
            .field("correlation_id", &self.correlation_id)
            .field("run_id", &self.run_id)
            .field("started_at", &self.started_at)
            .field("dry_run", &self.dry_run)
            .field("verbose", &self.verbose)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_overrides_only_named_fields() {
        let base = ExecutionContext::new("tenant-a", true, Arc::new(SilentPrinter));
        let derived = base.with(ContextOverrides {
            dry_run: Some(false),
            ..Default::default()
        });
        assert!(base.dry_run);
        assert!(!derived.dry_run);
        assert_eq!(derived.tenant_id, "tenant-a");
        assert_eq!(derived.run_id, base.run_id);
        assert_eq!(derived.started_at, base.started_at);
    }

    #[test]
    fn printer_is_shared_with_derived_contexts() {
        let buffer = Arc::new(BufferPrinter::default());
        let base = ExecutionContext::new("tenant-a", true, buffer.clone());
        base.with(ContextOverrides { verbose: Some(true), ..Default::default() })
            .print("hello");
        assert_eq!(buffer.lines(), vec!["hello".to_string()]);
    }
}
