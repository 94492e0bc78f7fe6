use super::{text_conversion_error, to_sql_int, MetricFilter, SimStore};
use crate::{
    dataset::MetricRow,
    error::SimResult,
    simulation::DailyMetrics,
    types::Platform,
};
use chrono::NaiveDate;
use rusqlite::{params, Row};

const FILTER_CLAUSE: &str = "tenant_id = ?1
    AND (?2 IS NULL OR scenario_id = ?2)
    AND (?3 IS NULL OR platform = ?3)
    AND (?4 IS NULL OR date >= ?4)
    AND (?5 IS NULL OR date <= ?5)
    AND (?6 IS NULL OR is_mock = ?6)
    AND (?7 IS NULL OR source = ?7)";

type FilterParams = (
    Option<String>,
    Option<&'static str>,
    Option<String>,
    Option<String>,
    Option<i32>,
    Option<String>,
);

fn filter_params(f: &MetricFilter) -> FilterParams {
    (
        f.scenario_id.clone(),
        f.platform.map(|p| p.as_str()),
        f.start.map(|d| d.to_string()),
        f.end.map(|d| d.to_string()),
        f.mock_only.map(i32::from),
        f.source.clone(),
    )
}

fn metric_from_row(row: &Row<'_>) -> rusqlite::Result<MetricRow> {
    let platform: String = row.get(4)?;
    let date: String = row.get(5)?;
    let count = |idx: usize| row.get::<_, i64>(idx).map(|v| v.max(0) as u64);
    Ok(MetricRow {
        tenant_id:   row.get(0)?,
        external_id: row.get(1)?,
        campaign_id: row.get(2)?,
        scenario_id: row.get(3)?,
        platform:    platform.parse::<Platform>().map_err(|e| text_conversion_error(4, e))?,
        date:        date
            .parse::<NaiveDate>()
            .map_err(|e| text_conversion_error(5, e.to_string()))?,
        metrics: DailyMetrics {
            impressions: count(6)?,
            clicks:      count(7)?,
            conversions: count(8)?,
            cost:        row.get(9)?,
            revenue:     row.get(10)?,
            ctr:         row.get(11)?,
            cpc:         row.get(12)?,
            cvr:         row.get(13)?,
            roas:        row.get(14)?,
            aov:         row.get(15)?,
        },
        is_mock: row.get::<_, i32>(16)? != 0,
        source:  row.get(17)?,
    })
}

impl SimStore {
    // ── Daily metrics ──────────────────────────────────────────

    pub fn insert_metric_batch(&self, rows: &[MetricRow]) -> SimResult<u64> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO daily_metric (
                    tenant_id, external_id, campaign_id, scenario_id, platform, date,
                    impressions, clicks, conversions, cost, revenue,
                    ctr, cpc, cvr, roas, aov, is_mock, source
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
            )?;
            for r in rows {
                let m = &r.metrics;
                inserted += stmt.execute(params![
                    r.tenant_id,
                    r.external_id,
                    r.campaign_id,
                    r.scenario_id,
                    r.platform.as_str(),
                    r.date.to_string(),
                    to_sql_int(m.impressions),
                    to_sql_int(m.clicks),
                    to_sql_int(m.conversions),
                    m.cost,
                    m.revenue,
                    m.ctr,
                    m.cpc,
                    m.cvr,
                    m.roas,
                    m.aov,
                    r.is_mock as i32,
                    r.source,
                ])? as u64;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn find_metrics(&self, tenant_id: &str, filter: &MetricFilter) -> SimResult<Vec<MetricRow>> {
        let sql = format!(
            "SELECT tenant_id, external_id, campaign_id, COALESCE(scenario_id, ''), platform, date,
                    impressions, clicks, conversions, cost, revenue,
                    ctr, cpc, cvr, roas, aov, is_mock, source
             FROM daily_metric WHERE {FILTER_CLAUSE}
             ORDER BY date ASC, platform ASC, campaign_id ASC"
        );
        let (scenario, platform, start, end, mock, source) = filter_params(filter);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(
            params![tenant_id, scenario, platform, start, end, mock, source],
            metric_from_row,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_metrics(&self, tenant_id: &str, filter: &MetricFilter) -> SimResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM daily_metric WHERE {FILTER_CLAUSE}");
        let (scenario, platform, start, end, mock, source) = filter_params(filter);
        let n: i64 = self.conn.query_row(
            &sql,
            params![tenant_id, scenario, platform, start, end, mock, source],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MetricRow;

    fn row(tenant: &str, ext: &str, date: &str) -> MetricRow {
        MetricRow {
            external_id: ext.into(),
            tenant_id:   tenant.into(),
            campaign_id: "mock_s:GoogleAds:1".into(),
            scenario_id: "s".into(),
            platform:    Platform::GoogleAds,
            date:        date.parse().unwrap(),
            metrics:     DailyMetrics { impressions: 100, clicks: 5, conversions: 1, ..Default::default() },
            is_mock:     true,
            source:      "mock_".into(),
        }
    }

    fn store_with_tenant(tenant: &str) -> SimStore {
        let store = SimStore::in_memory().unwrap();
        store.migrate().unwrap();
        store.create_tenant(tenant, "Test").unwrap();
        store
    }

    #[test]
    fn duplicate_external_ids_are_skipped() {
        let store = store_with_tenant("t");
        let rows = vec![row("t", "a", "2024-01-01"), row("t", "b", "2024-01-02")];
        assert_eq!(store.insert_metric_batch(&rows).unwrap(), 2);
        assert_eq!(store.insert_metric_batch(&rows).unwrap(), 0);
        assert_eq!(store.count_metrics("t", &MetricFilter::default()).unwrap(), 2);
    }

    #[test]
    fn filter_by_date_window() {
        let store = store_with_tenant("t");
        let rows = vec![
            row("t", "a", "2024-01-01"),
            row("t", "b", "2024-01-05"),
            row("t", "c", "2024-01-09"),
        ];
        store.insert_metric_batch(&rows).unwrap();
        let filter = MetricFilter {
            start: "2024-01-02".parse().ok(),
            end:   "2024-01-09".parse().ok(),
            ..Default::default()
        };
        let found = store.find_metrics("t", &filter).unwrap();
        assert_eq!(found.iter().map(|r| r.external_id.as_str()).collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(found[0].metrics.impressions, 100);
    }

    #[test]
    fn filter_by_source_and_scoped_delete() {
        let store = store_with_tenant("t");
        let other_scenario = MetricRow { scenario_id: "other".into(), ..row("t", "b", "2024-01-01") };
        let legacy = MetricRow { source: "legacy_".into(), ..row("t", "c", "2024-01-01") };
        store.insert_metric_batch(&[row("t", "a", "2024-01-01"), other_scenario, legacy]).unwrap();

        let ours = MetricFilter { mock_only: Some(true), source: Some("mock_".into()), ..Default::default() };
        assert_eq!(store.count_metrics("t", &ours).unwrap(), 2);

        let deleted = store.delete_mock_data("t", "mock_", Some("s")).unwrap();
        assert_eq!(deleted.metrics, 1);
        assert_eq!(store.count_metrics("t", &ours).unwrap(), 1, "other scenario kept");
        assert_eq!(store.delete_mock_data("t", "mock_", None).unwrap().metrics, 1);
        assert_eq!(store.count_metrics("t", &MetricFilter::default()).unwrap(), 1, "other source kept");
    }

    #[test]
    fn unknown_tenant_is_rejected_by_foreign_key() {
        let store = store_with_tenant("t");
        assert!(store.insert_metric_batch(&[row("ghost", "a", "2024-01-01")]).is_err());
    }
}
