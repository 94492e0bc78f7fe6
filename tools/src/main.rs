//! adsim: seed, verify and reset synthetic campaign data for a tenant.
//!
//! Usage:
//!   adsim preflight         --tenant acme --scenario steady-state
//!   adsim bootstrap-tenant  --tenant acme --confirm-write
//!   adsim seed-scenario     --tenant acme --scenario steady-state --confirm-write
//!   adsim verify-scenario   --tenant acme --scenario steady-state
//!   adsim get-metrics       --tenant acme --platform GoogleAds --start 2024-01-01
//!   adsim reset-tenant      --tenant acme --confirm-write
//!   adsim reset-tenant-hard --tenant acme --confirm-write --acknowledge acme
//!   adsim run-scenario      --tenant acme --scenario steady-state --confirm-write [--with-overview]
//!   adsim smoke             [--server "npm run start"] [--tenant acme]
//!
//! Common flags: --dry-run, --verbose, --json.
//! Exit codes: 0 success or warnings, 78 blocked by a precondition, 1 failure.

use adsim_core::{
    command::CommandHandler,
    commands::{
        BootstrapTenantCommand, BootstrapTenantHandler, GetMetricsCommand, GetMetricsHandler,
        PreflightCommand, PreflightHandler, ResetTenantCommand, ResetTenantHandler, SeedMode,
        SeedScenarioCommand, SeedScenarioHandler, VerifyScenarioCommand, VerifyScenarioHandler,
    },
    config::ToolkitConfig,
    context::{ContextOverrides, ExecutionContext, StdoutPrinter},
    error::{SimError, EXIT_BLOCKED, EXIT_FAILURE},
    fixture::FixtureProvider,
    pipeline::{mask_path, CommandStep, ManifestPipeline, OverviewCheckStep, SkippedStep, StepKind},
    probe::{check_overview_contract, wait_for_health, HttpProbe, ManagedProcess},
    report::ReportWriter,
    rng::Seed,
    scenario::ScenarioCatalog,
    store::SimStore,
    verification::SummaryStatus,
};
use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::env;
use std::path::Path;
use std::sync::Arc;

const ALIASES: &[&str] = &[
    "preflight",
    "bootstrap-tenant",
    "seed-scenario",
    "verify-scenario",
    "get-metrics",
    "reset-tenant",
    "reset-tenant-hard",
    "run-scenario",
    "smoke",
];

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => match e.downcast_ref::<SimError>() {
            Some(sim) => {
                eprintln!("error [{:?}]: {sim}", sim.kind());
                sim.exit_code()
            }
            None => {
                eprintln!("error: {e:#}");
                EXIT_FAILURE
            }
        },
    };
    std::process::exit(code);
}

/// Everything a command needs, opened once per invocation.
struct Runtime {
    config:    ToolkitConfig,
    store:     SimStore,
    scenarios: ScenarioCatalog,
    fixtures:  FixtureProvider,
    reports:   ReportWriter,
}

impl Runtime {
    fn open() -> Result<Self> {
        let config = ToolkitConfig::from_env()?;
        let store = SimStore::open(&config.database_path())?;
        store.migrate()?;

        let scenarios_file = config.data_dir.join("scenarios").join("scenarios.json");
        let scenarios = if scenarios_file.exists() {
            ScenarioCatalog::load(&config.data_dir)?
        } else {
            log::info!("{} not found, using built-in scenarios", scenarios_file.display());
            ScenarioCatalog::builtin()
        };
        let fixtures = FixtureProvider::load(&config.data_dir);
        let reports = ReportWriter::new(config.reports_dir.clone());
        Ok(Self { config, store, scenarios, fixtures, reports })
    }
}

fn run(args: &[String]) -> Result<i32> {
    let Some(alias) = args.get(1).map(String::as_str) else {
        print_usage();
        return Ok(EXIT_FAILURE);
    };
    if matches!(alias, "help" | "--help" | "-h") {
        print_usage();
        return Ok(0);
    }
    if !ALIASES.contains(&alias) {
        print_usage();
        return Err(SimError::validation("command", format!("unknown command '{alias}'")).into());
    }

    let rt = Runtime::open()?;
    let tenant = flag_value(args, "--tenant").unwrap_or_default();
    let dry_run = has_flag(args, "--dry-run");
    let ctx = ExecutionContext::new(tenant.clone(), dry_run, Arc::new(StdoutPrinter)).with(ContextOverrides {
        verbose: Some(has_flag(args, "--verbose")),
        ..Default::default()
    });
    let json = has_flag(args, "--json");
    log::info!("adsim {alias} run={} tenant={tenant} dry_run={dry_run}", ctx.run_id);

    let client = &rt.store;
    match alias {
        "preflight" => {
            let cmd = PreflightCommand {
                tenant_id:      flag_value(args, "--tenant"),
                scenario_id:    flag_value(args, "--scenario"),
                require_tenant: flag_value(args, "--tenant").is_some(),
            };
            let report = PreflightHandler::new(client, &rt.scenarios, &rt.fixtures, &rt.config).run(&cmd, &ctx)?;
            emit(json, &report)?;
            Ok(if report.ok { 0 } else { EXIT_BLOCKED })
        }
        "bootstrap-tenant" => {
            let outcome = BootstrapTenantHandler::new(client).run(&bootstrap_command(args, &tenant), &ctx)?;
            emit(json, &outcome)?;
            Ok(0)
        }
        "seed-scenario" => {
            let handler = SeedScenarioHandler::new(client, &rt.scenarios, &rt.config);
            let outcome = handler.run(&seed_command(args, &tenant)?, &ctx)?;
            emit(json, &outcome)?;
            Ok(0)
        }
        "verify-scenario" => {
            let cmd = VerifyScenarioCommand {
                tenant_id:   tenant.clone(),
                scenario_id: flag_value(args, "--scenario").unwrap_or_default(),
                seed:        flag_value(args, "--seed").map(|s| Seed::parse(&s)),
            };
            let handler = VerifyScenarioHandler::new(client, &rt.scenarios, &rt.fixtures, &rt.config.source_prefix);
            let report = handler.run(&cmd, &ctx)?;
            let path = rt.reports.write_json("verification", &ctx.run_id, &report)?;
            ctx.print(&report_line(&path, &rt.config.workspace_root));
            emit(json, &report)?;
            Ok(if report.summary.status == SummaryStatus::Fail { EXIT_FAILURE } else { 0 })
        }
        "get-metrics" => {
            let cmd = GetMetricsCommand {
                tenant_id:   tenant.clone(),
                scenario_id: flag_value(args, "--scenario"),
                platform:    flag_value(args, "--platform"),
                start:       date_flag(args, "--start")?,
                end:         date_flag(args, "--end")?,
            };
            let summary = GetMetricsHandler::new(client).run(&cmd, &ctx)?;
            emit(json, &summary)?;
            Ok(0)
        }
        "reset-tenant" | "reset-tenant-hard" => {
            let cmd = ResetTenantCommand {
                tenant_id:     tenant.clone(),
                dry_run,
                confirm_write: has_flag(args, "--confirm-write"),
                acknowledge:   flag_value(args, "--acknowledge"),
            };
            let prefix = rt.config.source_prefix.as_str();
            let handler = if alias == "reset-tenant-hard" {
                ResetTenantHandler::hard(client, prefix)
            } else {
                ResetTenantHandler::soft(client, prefix)
            };
            let outcome = handler.run(&cmd, &ctx)?;
            emit(json, &outcome)?;
            Ok(0)
        }
        "run-scenario" => run_scenario(&rt, args, &tenant, &ctx),
        "smoke" => smoke(&rt, args, &tenant),
        _ => Ok(EXIT_FAILURE),
    }
}

/// PREFLIGHT → BOOTSTRAP → SEED → VERIFY → OVERVIEW-CHECK, folded into
/// one manifest.
fn run_scenario(rt: &Runtime, args: &[String], tenant: &str, ctx: &ExecutionContext) -> Result<i32> {
    let client = &rt.store;
    let scenario_id = flag_value(args, "--scenario").unwrap_or_default();
    let probe = HttpProbe::new(&rt.config.health);

    let mut pipeline = ManifestPipeline::new(&rt.reports, rt.config.workspace_root.clone())
        .step(CommandStep::new(
            PreflightHandler::new(client, &rt.scenarios, &rt.fixtures, &rt.config),
            PreflightCommand {
                tenant_id:      Some(tenant.to_string()),
                scenario_id:    Some(scenario_id.clone()),
                require_tenant: false,
            },
            StepKind::Precondition,
        ))
        .step(CommandStep::new(BootstrapTenantHandler::new(client), bootstrap_command(args, tenant), StepKind::Write))
        .step(CommandStep::new(
            SeedScenarioHandler::new(client, &rt.scenarios, &rt.config),
            seed_command(args, tenant)?,
            StepKind::Write,
        ));

    pipeline = if ctx.dry_run {
        pipeline.step(SkippedStep::new("verify-scenario", StepKind::Verify, "dry run wrote nothing to verify"))
    } else {
        pipeline.step(
            CommandStep::new(
                VerifyScenarioHandler::new(client, &rt.scenarios, &rt.fixtures, &rt.config.source_prefix),
                VerifyScenarioCommand {
                    tenant_id:   tenant.to_string(),
                    scenario_id: scenario_id.clone(),
                    seed:        None,
                },
                StepKind::Verify,
            )
            .persist_as(&rt.reports, "verification"),
        )
    };
    if has_flag(args, "--with-overview") {
        pipeline = pipeline.step(OverviewCheckStep::new(&probe, &rt.config.health));
    }

    match pipeline.run(ctx) {
        Ok(success) => {
            emit(has_flag(args, "--json"), &success.manifest)?;
            ctx.print(&format!("{} rows created", success.rows_created));
            Ok(success.manifest.exit_code)
        }
        Err(e) => {
            eprintln!("{e}");
            Ok(e.exit_code())
        }
    }
}

/// Optionally start the dashboard server, then check health and the
/// overview contract. The server is stopped when this returns.
fn smoke(rt: &Runtime, args: &[String], tenant: &str) -> Result<i32> {
    let health = &rt.config.health;
    let server = match flag_value(args, "--server") {
        Some(command_line) => {
            let mut parts = command_line.split_whitespace().map(str::to_string);
            let program = parts
                .next()
                .ok_or_else(|| SimError::validation("server", "empty server command"))?;
            let rest: Vec<String> = parts.collect();
            let log_path = rt.config.reports_dir.join("smoke").join("server.log");
            Some(ManagedProcess::spawn(&program, &rest, &log_path, rt.config.max_log_bytes)?)
        }
        None => None,
    };

    let probe = HttpProbe::new(health);
    if let Err(e) = wait_for_health(&probe, health) {
        if let Some(server) = &server {
            if let Ok(tail) = server.log_tail() {
                eprintln!("--- server log tail ---\n{tail}");
            }
        }
        return Err(e.into());
    }
    let platforms = check_overview_contract(&probe, health, tenant)?;
    println!("smoke ok: overview returned {platforms} platform entries");
    Ok(0)
}

fn seed_command(args: &[String], tenant: &str) -> Result<SeedScenarioCommand> {
    let mode = match flag_value(args, "--mode").as_deref() {
        None | Some("append") => SeedMode::Append,
        Some("replace") => SeedMode::Replace,
        Some(other) => {
            return Err(SimError::validation("mode", format!("expected append or replace, got '{other}'")).into())
        }
    };
    let days = match flag_value(args, "--days") {
        Some(raw) => Some(
            raw.parse::<i64>()
                .map_err(|_| SimError::validation("days", format!("'{raw}' is not an integer")))?,
        ),
        None => None,
    };
    Ok(SeedScenarioCommand {
        tenant_id:     tenant.to_string(),
        scenario_id:   flag_value(args, "--scenario").unwrap_or_default(),
        mode,
        seed:          flag_value(args, "--seed").map(|s| Seed::parse(&s)),
        days,
        platforms:     platform_flags(args),
        dry_run:       has_flag(args, "--dry-run"),
        confirm_write: has_flag(args, "--confirm-write"),
    })
}

fn bootstrap_command(args: &[String], tenant: &str) -> BootstrapTenantCommand {
    BootstrapTenantCommand {
        tenant_id:     tenant.to_string(),
        name:          flag_value(args, "--name"),
        dry_run:       has_flag(args, "--dry-run"),
        confirm_write: has_flag(args, "--confirm-write"),
    }
}

fn emit<T: Serialize>(json: bool, value: &T) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

/// The report path, relative to the workspace root.
fn report_line(path: &Path, workspace_root: &Path) -> String {
    format!("report: {}", mask_path(path, workspace_root))
}

fn print_usage() {
    println!("adsim <command> [flags]");
    println!("  commands: {}", ALIASES.join(", "));
    println!("  flags:    --tenant T --scenario S --seed X --days N --platform P[,P]");
    println!("            --mode append|replace --start YYYY-MM-DD --end YYYY-MM-DD");
    println!("            --dry-run --confirm-write --acknowledge T --name N");
    println!("            --with-overview --server CMD --verbose --json");
}

// ── Argument helpers ──────────────────────────────────────────

fn flag_value(args: &[String], flag: &str) -> Option<String> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].clone())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// Every `--platform` occurrence, each possibly comma-separated.
fn platform_flags(args: &[String]) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == "--platform")
        .flat_map(|w| w[1].split(','))
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn date_flag(args: &[String], flag: &str) -> Result<Option<NaiveDate>> {
    match flag_value(args, flag) {
        Some(raw) => {
            let date = raw
                .parse::<NaiveDate>()
                .map_err(|e| SimError::validation(flag.trim_start_matches("--"), format!("'{raw}': {e}")))?;
            Ok(Some(date))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|a| a.to_string()).collect()
    }

    #[test]
    fn report_line_masks_the_workspace_root() {
        let root = Path::new("/srv/adsim");
        let line = report_line(&root.join("reports/verification/run-1.json"), root);
        assert_eq!(line, "report: reports/verification/run-1.json");
        assert!(!line.contains("/srv/adsim"));
    }

    #[test]
    fn platform_flags_repeat_and_split() {
        let a = args(&["seed", "--platform", "google,facebook", "--platform", " tiktok "]);
        assert_eq!(platform_flags(&a), vec!["google", "facebook", "tiktok"]);
    }

    #[test]
    fn seed_command_rejects_unknown_mode() {
        assert!(seed_command(&args(&["--mode", "merge"]), "acme").is_err());
        let cmd = seed_command(&args(&["--mode", "replace", "--days", "7"]), "acme").unwrap();
        assert_eq!(cmd.mode, SeedMode::Replace);
        assert_eq!(cmd.days, Some(7));
    }
}
