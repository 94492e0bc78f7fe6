//! Seed a tenant, then verify it, with and without drift.

use adsim_core::{
    command::CommandHandler,
    commands::{SeedScenarioCommand, SeedScenarioHandler, VerifyScenarioCommand, VerifyScenarioHandler},
    config::ToolkitConfig,
    context::{ExecutionContext, SilentPrinter},
    dataset::{campaign_key, project_scenario, MetricRow, ProjectionRequest},
    error::{ErrorKind, SimResult},
    fixture::{Fixture, FixtureProvider},
    rng::Seed,
    scenario::ScenarioCatalog,
    simulation::DailyMetrics,
    store::SimStore,
    types::Platform,
    verification::{CheckStatus, SummaryStatus, VerificationService},
};
use std::sync::Arc;
use tempfile::TempDir;

const TENANT: &str = "acme";
const SCENARIO: &str = "steady-state";
const PREFIX: &str = "mock_";

// ── Test helpers ────────────────────────────────────────────────────────────

struct Harness {
    store:     SimStore,
    catalog:   ScenarioCatalog,
    fixtures:  FixtureProvider,
    config:    ToolkitConfig,
    _dir:      TempDir,
}

impl Harness {
    /// Store with the tenant created and a fixture pinned to the
    /// scenario's default projection.
    fn new() -> Self {
        let store = SimStore::in_memory().expect("in-memory store");
        store.migrate().expect("migration");
        store.create_tenant(TENANT, "Acme").expect("tenant");

        let catalog = ScenarioCatalog::builtin();
        let scenario = catalog.get(SCENARIO).expect("scenario");
        let projection = project_scenario(&ProjectionRequest {
            tenant_id:     TENANT,
            scenario,
            seed:          &scenario.seed,
            days:          scenario.days,
            platforms:     &scenario.platforms,
            source_prefix: PREFIX,
        });
        let fixtures = FixtureProvider::from_fixtures(vec![Fixture::from_dataset(SCENARIO, &projection, true)]);
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ToolkitConfig::default_test(dir.path());
        Self { store, catalog, fixtures, config, _dir: dir }
    }

    fn ctx(&self) -> ExecutionContext {
        ExecutionContext::new(TENANT, false, Arc::new(SilentPrinter))
    }

    fn try_seed(&self, cmd: SeedScenarioCommand) -> SimResult<()> {
        SeedScenarioHandler::new(&self.store, &self.catalog, &self.config)
            .run(
                &SeedScenarioCommand {
                    tenant_id: TENANT.into(),
                    scenario_id: SCENARIO.into(),
                    confirm_write: true,
                    ..cmd
                },
                &self.ctx(),
            )
            .map(|_| ())
    }

    fn seed(&self, cmd: SeedScenarioCommand) {
        self.try_seed(cmd).expect("seed");
    }

    fn service(&self) -> VerificationService<'_> {
        VerificationService::new(&self.store, &self.catalog, &self.fixtures, PREFIX)
    }
}

fn stray_row(external_id: &str, date: &str, is_mock: bool, scenario_id: &str) -> MetricRow {
    MetricRow {
        external_id: external_id.into(),
        tenant_id:   TENANT.into(),
        campaign_id: campaign_key(PREFIX, SCENARIO, Platform::GoogleAds, 1),
        scenario_id: scenario_id.into(),
        platform:    Platform::GoogleAds,
        date:        date.parse().expect("date"),
        metrics:     DailyMetrics { impressions: 10, clicks: 1, conversions: 0, ..Default::default() },
        is_mock,
        source:      if is_mock { PREFIX.into() } else { "crm".into() },
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn seeded_scenario_passes_every_check() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());

    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    let failing: Vec<_> = report.results.iter().filter(|r| r.status != CheckStatus::Pass).collect();
    assert!(failing.is_empty(), "unexpected non-passing checks: {failing:#?}");
    assert_eq!(report.summary.status, SummaryStatus::Pass);
    assert_eq!(report.summary.total_checks, report.summary.passed);
    assert_eq!(report.summary.total_checks, 9);
    assert!(report.provenance.is_mock_data);
    assert_eq!(report.provenance.source_prefix, PREFIX);
    assert_eq!(report.meta.tenant_id, TENANT);
    assert_eq!(report.check("checksum").map(|c| c.message.as_str()), Some("expected checksum taken from fixture"));
}

#[test]
fn tampered_rows_fail_the_checksum() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());
    h.store
        .insert_metric_batch(&[stray_row("injected", "2024-01-15", true, SCENARIO)])
        .expect("tamper");

    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    assert_eq!(report.summary.status, SummaryStatus::Fail);
    assert_eq!(report.check("checksum").map(|c| c.status), Some(CheckStatus::Fail));
    assert_eq!(report.check("row_count").map(|c| c.status), Some(CheckStatus::Fail));
    assert_eq!(report.check("funnel_consistency").map(|c| c.status), Some(CheckStatus::Pass));
}

#[test]
fn rows_outside_the_projection_window_warn() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());
    h.store
        .insert_metric_batch(&[stray_row("late", "2025-06-01", true, SCENARIO)])
        .expect("insert");

    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    assert_eq!(report.check("out_of_range_rows").map(|c| c.status), Some(CheckStatus::Warn));
}

#[test]
fn real_data_in_the_tenant_warns() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());
    h.store
        .insert_metric_batch(&[stray_row("crm-1", "2024-01-02", false, "manual")])
        .expect("real row");

    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    assert_eq!(report.check("tenant_isolation").map(|c| c.status), Some(CheckStatus::Warn));
    assert_eq!(report.summary.status, SummaryStatus::Warn);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.warnings, 1);
}

#[test]
fn unseeded_tenant_fails() {
    let h = Harness::new();
    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    assert_eq!(report.summary.status, SummaryStatus::Fail);
    assert_eq!(report.check("row_count").map(|c| c.status), Some(CheckStatus::Fail));
}

#[test]
fn overridden_seed_run_is_compared_against_its_projection() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand {
        days: Some(7),
        seed: Some(Seed::Number(42)),
        ..Default::default()
    });

    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    assert_eq!(report.meta.seed, Seed::Number(42), "seed defaults to the last seed run");
    assert_eq!(report.check("fixture_applicability").map(|c| c.status), Some(CheckStatus::Warn));
    assert_eq!(report.check("row_count").map(|c| c.status), Some(CheckStatus::Pass));
    assert_eq!(report.check("checksum").map(|c| c.status), Some(CheckStatus::Pass));
    assert_eq!(report.summary.status, SummaryStatus::Warn);
}

#[test]
fn refused_append_reseed_keeps_verification_passing() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());
    let err = h
        .try_seed(SeedScenarioCommand { seed: Some(Seed::from("other-seed")), ..Default::default() })
        .expect_err("append with another seed");
    assert_eq!(err.kind(), ErrorKind::Validation);

    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    assert_eq!(report.summary.status, SummaryStatus::Pass, "{:#?}", report.results);
    assert_eq!(report.meta.seed, h.catalog.get(SCENARIO).expect("scenario").seed);
}

#[test]
fn explicit_wrong_seed_fails_the_checksum() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());
    let report = h
        .service()
        .verify_scenario(SCENARIO, TENANT, Some(&Seed::from("someone-elses-seed")), &h.ctx())
        .expect("verify");
    assert_eq!(report.check("checksum").map(|c| c.status), Some(CheckStatus::Fail));
    assert_eq!(report.check("row_count").map(|c| c.status), Some(CheckStatus::Pass));
}

#[test]
fn missing_fixture_is_a_configuration_error() {
    let h = Harness::new();
    let empty = FixtureProvider::from_fixtures(vec![]);
    let err = VerificationService::new(&h.store, &h.catalog, &empty, PREFIX)
        .verify_scenario(SCENARIO, TENANT, None, &h.ctx())
        .expect_err("no fixture");
    assert_eq!(err.kind(), ErrorKind::Configuration);
}

#[test]
fn verify_handler_validates_before_reading() {
    let h = Harness::new();
    let handler = VerifyScenarioHandler::new(&h.store, &h.catalog, &h.fixtures, PREFIX);
    let err = handler
        .run(
            &VerifyScenarioCommand { tenant_id: TENANT.into(), scenario_id: "nope".into(), seed: None },
            &h.ctx(),
        )
        .expect_err("unknown scenario");
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = handler
        .run(&VerifyScenarioCommand { tenant_id: "".into(), scenario_id: SCENARIO.into(), seed: None }, &h.ctx())
        .expect_err("blank tenant");
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn report_serializes_with_camel_case_keys() {
    let h = Harness::new();
    h.seed(SeedScenarioCommand::default());
    let report = h.service().verify_scenario(SCENARIO, TENANT, None, &h.ctx()).expect("verify");
    let json = serde_json::to_value(&report).expect("serialize");
    assert_eq!(json["summary"]["status"], "PASS");
    assert_eq!(json["summary"]["totalChecks"], 9);
    assert_eq!(json["provenance"]["isMockData"], true);
    assert_eq!(json["meta"]["scenarioId"], SCENARIO);
}
