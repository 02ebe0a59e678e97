//! Customer health score table

use super::Database;
use crate::error::Result;
use crate::model::{HealthScore, RiskLevel};
use rusqlite::{params, OptionalExtension, Row};

const HEALTH_SELECT: &str = r#"
    SELECT chs.customer_id, c.name, chs.engagement_score, chs.spend_score,
           chs.growth_score, chs.health_score, chs.risk_level, chs.last_calculated
    FROM customer_health_scores chs
    LEFT JOIN customers c ON chs.customer_id = c.id
"#;

impl Database {
    /// Insert or overwrite the health score of one customer
    pub fn upsert_health_score(&self, score: &HealthScore) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO customer_health_scores (
                customer_id, engagement_score, spend_score, growth_score,
                health_score, risk_level, last_calculated
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(customer_id) DO UPDATE SET
                engagement_score = excluded.engagement_score,
                spend_score = excluded.spend_score,
                growth_score = excluded.growth_score,
                health_score = excluded.health_score,
                risk_level = excluded.risk_level,
                last_calculated = excluded.last_calculated
            "#,
            params![
                score.customer_id,
                score.engagement_score,
                score.spend_score,
                score.growth_score,
                score.health_score,
                score.risk_level.as_str(),
                score.last_calculated,
            ],
        )?;

        Ok(())
    }

    pub fn get_health_score(&self, customer_id: i64) -> Result<Option<HealthScore>> {
        let score = self
            .conn
            .query_row(
                &format!("{} WHERE chs.customer_id = ?1", HEALTH_SELECT),
                params![customer_id],
                health_from_row,
            )
            .optional()?;

        Ok(score)
    }

    /// All stored health scores, healthiest first
    pub fn list_health_scores(&self) -> Result<Vec<HealthScore>> {
        let mut stmt = self.conn.prepare(&format!(
            "{} ORDER BY chs.health_score DESC, chs.customer_id",
            HEALTH_SELECT
        ))?;

        let rows = stmt.query_map([], health_from_row)?;

        let mut scores = Vec::new();
        for row in rows {
            scores.push(row?);
        }

        Ok(scores)
    }
}

fn health_from_row(row: &Row<'_>) -> rusqlite::Result<HealthScore> {
    let risk: String = row.get(6)?;
    Ok(HealthScore {
        customer_id: row.get(0)?,
        customer_name: row.get(1)?,
        engagement_score: row.get(2)?,
        spend_score: row.get(3)?,
        growth_score: row.get(4)?,
        health_score: row.get(5)?,
        risk_level: RiskLevel::from_db(&risk),
        last_calculated: row.get(7)?,
    })
}
