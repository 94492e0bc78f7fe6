use super::{text_conversion_error, to_sql_int, DeleteCounts, SeedRunRecord, SimStore};
use crate::error::SimResult;
use rusqlite::{params, OptionalExtension};

impl SimStore {
    // ── Tenant ─────────────────────────────────────────────────

    pub fn tenant_exists(&self, tenant_id: &str) -> SimResult<bool> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM tenant WHERE tenant_id = ?1",
            params![tenant_id],
            |row| row.get(0),
        )?;
        Ok(n > 0)
    }

    pub fn create_tenant(&self, tenant_id: &str, name: &str) -> SimResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO tenant (tenant_id, name, created_at) VALUES (?1, ?2, ?3)",
            params![tenant_id, name, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(inserted > 0)
    }

    // ── Reset ──────────────────────────────────────────────────

    /// `scenario_id = None` clears every scenario's mock rows.
    pub fn delete_mock_data(
        &self,
        tenant_id: &str,
        source_prefix: &str,
        scenario_id: Option<&str>,
    ) -> SimResult<DeleteCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let metrics = tx.execute(
            "DELETE FROM daily_metric WHERE tenant_id = ?1 AND is_mock = 1 AND source = ?2
             AND (?3 IS NULL OR scenario_id = ?3)",
            params![tenant_id, source_prefix, scenario_id],
        )?;
        let campaigns = tx.execute(
            "DELETE FROM campaign WHERE tenant_id = ?1 AND is_mock = 1 AND source = ?2
             AND (?3 IS NULL OR scenario_id = ?3)",
            params![tenant_id, source_prefix, scenario_id],
        )?;
        let seed_runs = tx.execute(
            "DELETE FROM seed_run WHERE tenant_id = ?1 AND (?2 IS NULL OR scenario_id = ?2)",
            params![tenant_id, scenario_id],
        )?;
        tx.commit()?;
        Ok(DeleteCounts {
            metrics:   metrics as u64,
            campaigns: campaigns as u64,
            seed_runs: seed_runs as u64,
        })
    }

    pub fn delete_tenant_data(&self, tenant_id: &str) -> SimResult<DeleteCounts> {
        let tx = self.conn.unchecked_transaction()?;
        let metrics = tx.execute("DELETE FROM daily_metric WHERE tenant_id = ?1", params![tenant_id])?;
        let campaigns = tx.execute("DELETE FROM campaign WHERE tenant_id = ?1", params![tenant_id])?;
        let seed_runs = tx.execute("DELETE FROM seed_run WHERE tenant_id = ?1", params![tenant_id])?;
        tx.commit()?;
        Ok(DeleteCounts {
            metrics:   metrics as u64,
            campaigns: campaigns as u64,
            seed_runs: seed_runs as u64,
        })
    }

    // ── Seed runs ──────────────────────────────────────────────

    pub fn count_seed_runs(&self, tenant_id: &str, scenario_id: Option<&str>) -> SimResult<u64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM seed_run WHERE tenant_id = ?1 AND (?2 IS NULL OR scenario_id = ?2)",
            params![tenant_id, scenario_id],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as u64)
    }

    pub fn record_seed_run(&self, r: &SeedRunRecord) -> SimResult<()> {
        self.conn.execute(
            "INSERT INTO seed_run (run_id, tenant_id, scenario_id, seed, days, platforms, rows_created, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                r.run_id,
                r.tenant_id,
                r.scenario_id,
                serde_json::to_string(&r.seed)?,
                r.days,
                serde_json::to_string(&r.platforms)?,
                to_sql_int(r.rows_created),
                r.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn last_seed_run(&self, tenant_id: &str, scenario_id: &str) -> SimResult<Option<SeedRunRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT run_id, tenant_id, scenario_id, seed, days, platforms, rows_created, created_at
                 FROM seed_run WHERE tenant_id = ?1 AND scenario_id = ?2
                 ORDER BY id DESC LIMIT 1",
                params![tenant_id, scenario_id],
                |row| {
                    let seed_json: String = row.get(3)?;
                    let platforms_json: String = row.get(5)?;
                    Ok(SeedRunRecord {
                        run_id:       row.get(0)?,
                        tenant_id:    row.get(1)?,
                        scenario_id:  row.get(2)?,
                        seed:         serde_json::from_str(&seed_json)
                            .map_err(|e| text_conversion_error(3, e.to_string()))?,
                        days:         row.get(4)?,
                        platforms:    serde_json::from_str(&platforms_json)
                            .map_err(|e| text_conversion_error(5, e.to_string()))?,
                        rows_created: row.get::<_, i64>(6)?.max(0) as u64,
                        created_at:   row.get(7)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }
}
