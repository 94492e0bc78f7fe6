//! The fixtures shipped under data/ against a freshly seeded tenant.

use adsim_core::{
    command::CommandHandler,
    commands::{SeedScenarioCommand, SeedScenarioHandler},
    config::ToolkitConfig,
    context::{ExecutionContext, SilentPrinter},
    dataset::{project_scenario, ProjectionRequest},
    fixture::FixtureProvider,
    scenario::ScenarioCatalog,
    store::SimStore,
    verification::{SummaryStatus, VerificationService},
};
use std::path::PathBuf;
use std::sync::Arc;

const TENANT: &str = "acme";

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../data")
}

fn ctx() -> ExecutionContext {
    let _ = env_logger::builder().is_test(true).try_init();
    ExecutionContext::new(TENANT, false, Arc::new(SilentPrinter))
}

#[test]
fn shipped_catalog_matches_the_builtin_one() {
    let shipped = ScenarioCatalog::load(&data_dir()).expect("data/scenarios");
    let builtin = ScenarioCatalog::builtin();
    assert_eq!(shipped.ids().collect::<Vec<_>>(), builtin.ids().collect::<Vec<_>>());
    for id in builtin.ids() {
        assert_eq!(shipped.get(id).expect("shipped"), builtin.get(id).expect("builtin"), "{id}");
    }
}

#[test]
fn every_shipped_fixture_pins_the_default_projection() {
    let catalog = ScenarioCatalog::builtin();
    let fixtures = FixtureProvider::load(&data_dir());
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ToolkitConfig::default_test(dir.path());

    for id in catalog.ids() {
        let scenario = catalog.get(id).expect("scenario");
        let fixture = fixtures.load_fixture(id).expect("fixture on disk");
        let projection = project_scenario(&ProjectionRequest {
            tenant_id:     TENANT,
            scenario,
            seed:          &scenario.seed,
            days:          scenario.days,
            platforms:     &scenario.platforms,
            source_prefix: &config.source_prefix,
        });
        assert_eq!(fixture.checksum.as_deref(), Some(projection.checksum().as_str()), "{id}: pinned checksum");
        assert_eq!(fixture.shape.total_metric_rows, projection.metrics.len() as u64, "{id}: row count");
    }
}

#[test]
fn default_seeds_verify_against_the_shipped_fixtures() {
    let catalog = ScenarioCatalog::builtin();
    let fixtures = FixtureProvider::load(&data_dir());
    let dir = tempfile::tempdir().expect("tempdir");
    let config = ToolkitConfig::default_test(dir.path());
    let store = SimStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store.create_tenant(TENANT, "Acme").expect("tenant");

    let seeder = SeedScenarioHandler::new(&store, &catalog, &config);
    let service = VerificationService::new(&store, &catalog, &fixtures, &config.source_prefix);
    for id in catalog.ids() {
        seeder
            .run(
                &SeedScenarioCommand {
                    tenant_id: TENANT.into(),
                    scenario_id: id.into(),
                    confirm_write: true,
                    ..Default::default()
                },
                &ctx(),
            )
            .expect("seed");

        let report = service.verify_scenario(id, TENANT, None, &ctx()).expect("verify");
        assert_eq!(report.summary.status, SummaryStatus::Pass, "{id}: {:#?}", report.results);
        assert_eq!(
            report.check("checksum").map(|c| c.message.as_str()),
            Some("expected checksum taken from fixture"),
            "{id}"
        );
    }
}
