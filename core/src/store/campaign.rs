use super::{text_conversion_error, SimStore};
use crate::{dataset::CampaignRow, error::SimResult, types::Platform};
use rusqlite::params;

impl SimStore {
    // ── Campaign ───────────────────────────────────────────────

    pub fn insert_campaigns(&self, rows: &[CampaignRow]) -> SimResult<u64> {
        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO campaign
                    (tenant_id, campaign_id, scenario_id, platform, name, is_mock, source)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for c in rows {
                inserted += stmt.execute(params![
                    c.tenant_id,
                    c.campaign_id,
                    c.scenario_id,
                    c.platform.as_str(),
                    c.name,
                    c.is_mock as i32,
                    c.source,
                ])? as u64;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    pub fn find_campaigns(&self, tenant_id: &str) -> SimResult<Vec<CampaignRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT tenant_id, campaign_id, COALESCE(scenario_id, ''), platform, name, is_mock, source
             FROM campaign WHERE tenant_id = ?1
             ORDER BY campaign_id ASC",
        )?;
        let rows = stmt.query_map(params![tenant_id], |row| {
            let platform: String = row.get(3)?;
            Ok(CampaignRow {
                tenant_id:   row.get(0)?,
                campaign_id: row.get(1)?,
                scenario_id: row.get(2)?,
                platform:    platform
                    .parse::<Platform>()
                    .map_err(|e| text_conversion_error(3, e))?,
                name:        row.get(4)?,
                is_mock:     row.get::<_, i32>(5)? != 0,
                source:      row.get(6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn count_campaigns(&self, tenant_id: &str, mock_source: Option<&str>) -> SimResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM campaign
             WHERE tenant_id = ?1 AND (?2 IS NULL OR (is_mock = 1 AND source = ?2))",
            params![tenant_id, mock_source],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }
}
