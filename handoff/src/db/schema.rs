use libsql::Connection;

use crate::error::Result;

/// Timestamps are TEXT produced by `encode_timestamp`, so string order is
/// time order.
pub async fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS help_requests (
            id TEXT PRIMARY KEY,
            original_query TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'resolved', 'unresolved')),
            created_at TEXT NOT NULL,
            conversation_history TEXT NOT NULL DEFAULT '[]',
            supervisor_response TEXT,
            resolved_at TEXT,
            room_id TEXT,
            participant_id TEXT,
            CHECK (
                (status = 'resolved')
                = (supervisor_response IS NOT NULL AND resolved_at IS NOT NULL)
            )
        );

        CREATE INDEX IF NOT EXISTS idx_help_requests_status_created
            ON help_requests(status, created_at);
        CREATE INDEX IF NOT EXISTS idx_help_requests_created_at
            ON help_requests(created_at);

        CREATE TABLE IF NOT EXISTS knowledge_base (
            id TEXT PRIMARY KEY,
            question TEXT NOT NULL,
            answer TEXT NOT NULL,
            created_at TEXT,
            source_request_id TEXT UNIQUE
        );

        CREATE INDEX IF NOT EXISTS idx_knowledge_base_created_at
            ON knowledge_base(created_at);
        "#,
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use libsql::Builder;

    async fn memory_conn() -> Connection {
        let db = Builder::new_local(":memory:").build().await.unwrap();
        let conn = db.connect().unwrap();
        init_schema(&conn).await.unwrap();
        conn
    }

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let conn = memory_conn().await;
        init_schema(&conn).await.unwrap();
    }

    #[tokio::test]
    async fn test_schema_rejects_answer_on_unresolved_request() {
        let conn = memory_conn().await;

        let result = conn
            .execute(
                "INSERT INTO help_requests (id, original_query, status, created_at, supervisor_response, resolved_at)
                 VALUES ('r1', 'q', 'unresolved', '2026-01-01T00:00:00.000000Z', 'answer', '2026-01-01T00:00:01.000000Z')",
                (),
            )
            .await;
        assert!(result.is_err(), "unresolved rows must not carry an answer");

        let result = conn
            .execute(
                "INSERT INTO help_requests (id, original_query, status, created_at)
                 VALUES ('r2', 'q', 'resolved', '2026-01-01T00:00:00.000000Z')",
                (),
            )
            .await;
        assert!(result.is_err(), "resolved rows must carry an answer");
    }

    #[tokio::test]
    async fn test_schema_rejects_unknown_status() {
        let conn = memory_conn().await;
        let result = conn
            .execute(
                "INSERT INTO help_requests (id, original_query, status, created_at)
                 VALUES ('r1', 'q', 'archived', '2026-01-01T00:00:00.000000Z')",
                (),
            )
            .await;
        assert!(result.is_err());
    }
}
