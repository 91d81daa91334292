use rusqlite::params;

use super::*;

impl LeadDb {
    // =========================================================================
    // Conversations & messages (chat capture write path)
    // =========================================================================

    pub fn insert_conversation(&self, conv: &DbConversation) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO conversations (id, lead_id, channel, started_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![conv.id, conv.lead_id, conv.channel, conv.started_at],
        )?;
        Ok(())
    }

    pub fn get_conversation(&self, id: &str) -> Result<Option<DbConversation>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lead_id, channel, started_at FROM conversations WHERE id = ?1",
        )?;
        let mut rows = stmt.query_map(params![id], |row| {
            Ok(DbConversation {
                id: row.get(0)?,
                lead_id: row.get(1)?,
                channel: row.get(2)?,
                started_at: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    /// All conversations for a lead, oldest first.
    pub fn get_conversations_for_lead(
        &self,
        lead_id: &str,
    ) -> Result<Vec<DbConversation>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, lead_id, channel, started_at
             FROM conversations
             WHERE lead_id = ?1
             ORDER BY started_at",
        )?;
        let rows = stmt.query_map(params![lead_id], |row| {
            Ok(DbConversation {
                id: row.get(0)?,
                lead_id: row.get(1)?,
                channel: row.get(2)?,
                started_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn insert_message(&self, msg: &DbMessage) -> Result<(), DbError> {
        self.conn.execute(
            "INSERT INTO messages (id, conversation_id, role, body, sent_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![msg.id, msg.conversation_id, msg.role, msg.body, msg.sent_at],
        )?;
        Ok(())
    }

    /// Transcript for a conversation, oldest first.
    pub fn get_messages(&self, conversation_id: &str) -> Result<Vec<DbMessage>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, conversation_id, role, body, sent_at
             FROM messages
             WHERE conversation_id = ?1
             ORDER BY sent_at, id",
        )?;
        let rows = stmt.query_map(params![conversation_id], |row| {
            Ok(DbMessage {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                role: row.get(2)?,
                body: row.get(3)?,
                sent_at: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
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
                 ) VALUES (?1, 'Fixture', 'couple', 'chat', 'new', 'COLD', 0.1,
                           0, ?2, ?2, ?2)",
                params![id, now],
            )
            .expect("insert lead fixture");
    }

    #[test]
    fn test_conversation_and_transcript() {
        let db = test_db();
        lead_fixture(&db, "lead-1");

        db.insert_conversation(&DbConversation {
            id: "conv-1".to_string(),
            lead_id: "lead-1".to_string(),
            channel: "chat".to_string(),
            started_at: "2026-03-01T09:00:00Z".to_string(),
        })
        .expect("insert conversation");

        db.insert_message(&DbMessage {
            id: "m1".to_string(),
            conversation_id: "conv-1".to_string(),
            role: "visitor".to_string(),
            body: "We're looking for a venue in Tuscany".to_string(),
            sent_at: "2026-03-01T09:00:05Z".to_string(),
        })
        .expect("insert m1");
        db.insert_message(&DbMessage {
            id: "m2".to_string(),
            conversation_id: "conv-1".to_string(),
            role: "assistant".to_string(),
            body: "Congratulations! When is the big day?".to_string(),
            sent_at: "2026-03-01T09:00:09Z".to_string(),
        })
        .expect("insert m2");

        let transcript = db.get_messages("conv-1").expect("transcript");
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, "visitor");
        assert_eq!(transcript[1].role, "assistant");

        let convs = db.get_conversations_for_lead("lead-1").expect("convs");
        assert_eq!(convs.len(), 1);
        assert_eq!(convs[0].channel, "chat");
    }

    #[test]
    fn test_admin_delete_cascades_to_transcripts() {
        let db = test_db();
        lead_fixture(&db, "lead-2");

        db.insert_conversation(&DbConversation {
            id: "conv-2".to_string(),
            lead_id: "lead-2".to_string(),
            channel: "chat".to_string(),
            started_at: "2026-03-02T09:00:00Z".to_string(),
        })
        .expect("insert conversation");
        db.insert_message(&DbMessage {
            id: "m3".to_string(),
            conversation_id: "conv-2".to_string(),
            role: "visitor".to_string(),
            body: "hello".to_string(),
            sent_at: "2026-03-02T09:00:01Z".to_string(),
        })
        .expect("insert message");

        db.delete_lead("lead-2").expect("delete lead");

        assert!(db.get_conversation("conv-2").expect("get").is_none());
        assert!(db.get_messages("conv-2").expect("messages").is_empty());
    }

    #[test]
    fn test_conversation_requires_existing_lead() {
        let db = test_db();
        let result = db.insert_conversation(&DbConversation {
            id: "conv-orphan".to_string(),
            lead_id: "no-such-lead".to_string(),
            channel: "chat".to_string(),
            started_at: "2026-03-01T09:00:00Z".to_string(),
        });
        assert!(result.is_err(), "FK should reject orphan conversations");
    }
}
