use rusqlite::params;

use super::*;

impl LeadDb {
    // =========================================================================
    // Audit log (append-only)
    // =========================================================================

    /// Append one audit entry. There is deliberately no update or delete
    /// counterpart — rows are immutable once written.
    pub fn insert_audit_entry(&self, entry: &DbAuditEntry) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO audit_log (
                id, lead_id, action_type, old_value, new_value, changed_by,
                changed_by_name, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                entry.id,
                entry.lead_id,
                entry.action_type,
                entry.old_value,
                entry.new_value,
                entry.changed_by,
                entry.changed_by_name,
                entry.created_at,
            ],
        )?;
        Ok(())
    }

    /// Audit trail for a lead, newest first.
    pub fn get_audit_for_lead(
        &self,
        lead_id: &str,
        limit: i64,
    ) -> Result<Vec<DbAuditEntry>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lead_id, action_type, old_value, new_value, changed_by,
                    changed_by_name, created_at
             FROM audit_log
             WHERE lead_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![lead_id, limit], |row| {
            Ok(DbAuditEntry {
                id: row.get(0)?,
                lead_id: row.get(1)?,
                action_type: row.get(2)?,
                old_value: row.get(3)?,
                new_value: row.get(4)?,
                changed_by: row.get(5)?,
                changed_by_name: row.get(6)?,
                created_at: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Count audit entries of a given action type for a lead.
    pub fn count_audit_entries(
        &self,
        lead_id: &str,
        action_type: &str,
    ) -> Result<i64, DbError> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM audit_log WHERE lead_id = ?1 AND action_type = ?2",
            params![lead_id, action_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::super::test_utils::test_db;
    use super::*;

    fn lead_fixture(db: &LeadDb, id: &str) {
        let now = Utc::now().to_rfc3339();
        db.conn_ref()
            .execute(
                "INSERT INTO leads (
                    id, name, kind, source, stage, priority, deal_probability,
                    priority_overridden, stage_entered_at, created_at, updated_at
                 ) VALUES (?1, 'Fixture', 'vendor', 'form', 'new', 'COLD', 0.1,
                           0, ?2, ?2, ?2)",
                params![id, now],
            )
            .expect("insert lead fixture");
    }

    fn entry(id: &str, lead_id: &str, action: &str, created_at: &str) -> DbAuditEntry {
        DbAuditEntry {
            id: id.to_string(),
            lead_id: lead_id.to_string(),
            action_type: action.to_string(),
            old_value: Some("new".to_string()),
            new_value: Some("qualification".to_string()),
            changed_by: "op-1".to_string(),
            changed_by_name: Some("Dana".to_string()),
            created_at: created_at.to_string(),
        }
    }

    #[test]
    fn test_insert_and_fetch_ordered() {
        let db = test_db();
        lead_fixture(&db, "lead-1");

        db.insert_audit_entry(&entry("a1", "lead-1", "stage_change", "2026-01-01T10:00:00Z"))
            .expect("insert a1");
        db.insert_audit_entry(&entry("a2", "lead-1", "priority_override", "2026-01-02T10:00:00Z"))
            .expect("insert a2");

        let trail = db.get_audit_for_lead("lead-1", 50).expect("fetch");
        assert_eq!(trail.len(), 2);
        // Newest first
        assert_eq!(trail[0].id, "a2");
        assert_eq!(trail[1].id, "a1");
        assert_eq!(trail[1].old_value, Some("new".to_string()));
        assert_eq!(trail[1].new_value, Some("qualification".to_string()));
    }

    #[test]
    fn test_count_by_action_type() {
        let db = test_db();
        lead_fixture(&db, "lead-2");

        db.insert_audit_entry(&entry("b1", "lead-2", "stage_change", "2026-01-01T10:00:00Z"))
            .expect("insert");
        db.insert_audit_entry(&entry("b2", "lead-2", "stage_change", "2026-01-01T11:00:00Z"))
            .expect("insert");
        db.insert_audit_entry(&entry("b3", "lead-2", "INVITE_SENT", "2026-01-01T12:00:00Z"))
            .expect("insert");

        assert_eq!(
            db.count_audit_entries("lead-2", "stage_change").expect("count"),
            2
        );
        assert_eq!(
            db.count_audit_entries("lead-2", "INVITE_SENT").expect("count"),
            1
        );
    }

    #[test]
    fn test_cascade_delete_with_lead() {
        let db = test_db();
        lead_fixture(&db, "lead-3");
        db.insert_audit_entry(&entry("c1", "lead-3", "stage_change", "2026-01-01T10:00:00Z"))
            .expect("insert");

        db.delete_lead("lead-3").expect("delete lead");

        let trail = db.get_audit_for_lead("lead-3", 50).expect("fetch");
        assert!(trail.is_empty(), "audit rows should cascade with the lead");
    }
}
