use libsql::{params, Connection};

use crate::error::Result;
use crate::models::{decode_timestamp, encode_timestamp, KnowledgeBaseEntry};

pub struct KnowledgeRepository;

impl KnowledgeRepository {
    pub async fn insert(conn: &Connection, entry: &KnowledgeBaseEntry) -> Result<()> {
        conn.execute(
            r#"
            INSERT INTO knowledge_base (id, question, answer, created_at, source_request_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                entry.id.clone(),
                entry.question.clone(),
                entry.answer.clone(),
                entry.created_at.map(encode_timestamp),
                entry.source_request_id.clone(),
            ],
        )
        .await?;

        Ok(())
    }

    /// Newest first; undated entries last; ties by id.
    pub async fn list(conn: &Connection) -> Result<Vec<KnowledgeBaseEntry>> {
        let mut rows = conn
            .query(
                r#"
                SELECT id, question, answer, created_at, source_request_id
                FROM knowledge_base
                ORDER BY created_at IS NULL, created_at DESC, id ASC
                "#,
                (),
            )
            .await?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_entry(&row)?);
        }
        Ok(results)
    }

    fn row_to_entry(row: &libsql::Row) -> Result<KnowledgeBaseEntry> {
        Ok(KnowledgeBaseEntry {
            id: row.get(0)?,
            question: row.get(1)?,
            answer: row.get(2)?,
            created_at: row
                .get::<Option<String>>(3)?
                .as_deref()
                .and_then(decode_timestamp),
            source_request_id: row.get(4)?,
        })
    }
}
