use chrono::Utc;
use rusqlite::params;

use super::*;

impl LeadDb {
    // =========================================================================
    // Leads
    // =========================================================================

    /// Insert or update a lead.
    pub fn upsert_lead(&self, lead: &DbLead) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO leads (
                id, name, kind, email, source, notes, stage, priority, score,
                deal_probability, deal_value, priority_overridden, assigned_to,
                assigned_at, invited_at, stage_entered_at, summary, created_at,
                updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                       ?14, ?15, ?16, ?17, ?18, ?19)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                kind = excluded.kind,
                email = excluded.email,
                source = excluded.source,
                notes = excluded.notes,
                stage = excluded.stage,
                priority = excluded.priority,
                score = excluded.score,
                deal_probability = excluded.deal_probability,
                deal_value = excluded.deal_value,
                priority_overridden = excluded.priority_overridden,
                assigned_to = excluded.assigned_to,
                assigned_at = excluded.assigned_at,
                invited_at = excluded.invited_at,
                stage_entered_at = excluded.stage_entered_at,
                summary = excluded.summary,
                updated_at = excluded.updated_at",
            params![
                lead.id,
                lead.name,
                lead.kind,
                lead.email,
                lead.source,
                lead.notes,
                lead.stage,
                lead.priority,
                lead.score,
                lead.deal_probability,
                lead.deal_value,
                lead.priority_overridden as i32,
                lead.assigned_to,
                lead.assigned_at,
                lead.invited_at,
                lead.stage_entered_at,
                lead.summary,
                lead.created_at,
                lead.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a lead by ID.
    pub fn get_lead(&self, id: &str) -> Result<Option<DbLead>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, email, source, notes, stage, priority, score,
                    deal_probability, deal_value, priority_overridden, assigned_to,
                    assigned_at, invited_at, stage_entered_at, summary, created_at,
                    updated_at
             FROM leads
             WHERE id = ?1",
        )?;

        let mut rows = stmt.query_map(params![id], Self::map_lead_row)?;

        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// Get all leads, most recently touched first.
    pub fn get_all_leads(&self) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, email, source, notes, stage, priority, score,
                    deal_probability, deal_value, priority_overridden, assigned_to,
                    assigned_at, invited_at, stage_entered_at, summary, created_at,
                    updated_at
             FROM leads
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map([], Self::map_lead_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Get leads in a given stage, most recently touched first.
    pub fn get_leads_by_stage(&self, stage: &str) -> Result<Vec<DbLead>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, email, source, notes, stage, priority, score,
                    deal_probability, deal_value, priority_overridden, assigned_to,
                    assigned_at, invited_at, stage_entered_at, summary, created_at,
                    updated_at
             FROM leads
             WHERE stage = ?1
             ORDER BY updated_at DESC",
        )?;
        let rows = stmt.query_map(params![stage], Self::map_lead_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// (stage, deal_value) pairs for the pipeline forecast roll-up.
    /// Leads with no deal value contribute nothing and are skipped here.
    pub fn get_forecast_rows(&self) -> Result<Vec<(String, f64)>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT stage, deal_value FROM leads WHERE deal_value IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Hard-delete a lead. FK cascades remove its audit rows, conversations,
    /// and messages. Returns `true` if a row was deleted.
    pub fn delete_lead(&self, id: &str) -> Result<bool, DbError> {
        let rows = self
            .conn
            .execute("DELETE FROM leads WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Touch `updated_at` on a lead as a last-activity signal. Returns `true`
    /// if a row was updated.
    pub fn touch_lead(&self, id: &str) -> Result<bool, DbError> {
        let now = Utc::now().to_rfc3339();
        let rows = self.conn.execute(
            "UPDATE leads SET updated_at = ?1 WHERE id = ?2",
            params![now, id],
        )?;
        Ok(rows > 0)
    }

    fn map_lead_row(row: &rusqlite::Row) -> rusqlite::Result<DbLead> {
        Ok(DbLead {
            id: row.get(0)?,
            name: row.get(1)?,
            kind: row.get(2)?,
            email: row.get(3)?,
            source: row.get(4)?,
            notes: row.get(5)?,
            stage: row.get(6)?,
            priority: row.get(7)?,
            score: row.get(8)?,
            deal_probability: row.get(9)?,
            deal_value: row.get(10)?,
            priority_overridden: row.get::<_, i32>(11)? != 0,
            assigned_to: row.get(12)?,
            assigned_at: row.get(13)?,
            invited_at: row.get(14)?,
            stage_entered_at: row.get(15)?,
            summary: row.get(16)?,
            created_at: row.get(17)?,
            updated_at: row.get(18)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_utils::test_db;
    use super::*;

    pub fn sample_lead(id: &str, name: &str) -> DbLead {
        let now = Utc::now().to_rfc3339();
        DbLead {
            id: id.to_string(),
            name: name.to_string(),
            kind: "vendor".to_string(),
            email: Some(format!("{}@example.com", id)),
            source: "application".to_string(),
            notes: None,
            stage: "new".to_string(),
            priority: "COLD".to_string(),
            score: None,
            deal_probability: 0.1,
            deal_value: None,
            priority_overridden: false,
            assigned_to: None,
            assigned_at: None,
            invited_at: None,
            stage_entered_at: now.clone(),
            summary: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn test_upsert_and_get_lead() {
        let db = test_db();

        let lead = sample_lead("lead-001", "Velvet & Vine Florals");
        db.upsert_lead(&lead).expect("upsert");

        let found = db.get_lead("lead-001").expect("get").expect("exists");
        assert_eq!(found.name, "Velvet & Vine Florals");
        assert_eq!(found.stage, "new");
        assert_eq!(found.priority, "COLD");
        assert!((found.deal_probability - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_lead_not_found() {
        let db = test_db();
        let result = db.get_lead("nonexistent").expect("get");
        assert!(result.is_none());
    }

    #[test]
    fn test_upsert_updates_existing() {
        let db = test_db();

        let mut lead = sample_lead("lead-002", "Original name");
        db.upsert_lead(&lead).expect("first upsert");

        lead.name = "Updated name".to_string();
        lead.stage = "qualification".to_string();
        lead.deal_probability = 0.25;
        db.upsert_lead(&lead).expect("second upsert");

        let found = db.get_lead("lead-002").expect("get").expect("exists");
        assert_eq!(found.name, "Updated name");
        assert_eq!(found.stage, "qualification");
        assert!((found.deal_probability - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_get_leads_by_stage() {
        let db = test_db();

        let mut a = sample_lead("lead-a", "A");
        a.stage = "invited".to_string();
        db.upsert_lead(&a).expect("upsert a");

        let b = sample_lead("lead-b", "B");
        db.upsert_lead(&b).expect("upsert b");

        let invited = db.get_leads_by_stage("invited").expect("query");
        assert_eq!(invited.len(), 1);
        assert_eq!(invited[0].id, "lead-a");
    }

    #[test]
    fn test_forecast_rows_skip_unvalued_leads() {
        let db = test_db();

        let mut valued = sample_lead("lead-v", "Valued");
        valued.deal_value = Some(12_000.0);
        valued.stage = "negotiation".to_string();
        db.upsert_lead(&valued).expect("upsert");

        db.upsert_lead(&sample_lead("lead-u", "Unvalued"))
            .expect("upsert");

        let rows = db.get_forecast_rows().expect("rows");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, "negotiation");
        assert!((rows[0].1 - 12_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_delete_lead() {
        let db = test_db();
        db.upsert_lead(&sample_lead("lead-d", "Doomed")).expect("upsert");

        assert!(db.delete_lead("lead-d").expect("delete"));
        assert!(db.get_lead("lead-d").expect("get").is_none());
        assert!(!db.delete_lead("lead-d").expect("second delete"));
    }

    #[test]
    fn test_touch_lead_bumps_updated_at() {
        let db = test_db();
        let mut lead = sample_lead("lead-t", "Touched");
        lead.updated_at = "2020-01-01T00:00:00Z".to_string();
        db.upsert_lead(&lead).expect("upsert");

        assert!(db.touch_lead("lead-t").expect("touch"));
        let found = db.get_lead("lead-t").expect("get").expect("exists");
        assert_ne!(found.updated_at, "2020-01-01T00:00:00Z");
    }
}
