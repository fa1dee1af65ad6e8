use chrono::{DateTime, Utc};
use libsql::{params, Connection, TransactionBehavior};

use super::KnowledgeRepository;
use crate::db::traits::ResolveOutcome;
use crate::error::{HandoffError, Result};
use crate::models::{
    decode_timestamp, encode_timestamp, HelpRequest, KnowledgeBaseEntry, RequestStatus,
};

const COLUMNS: &str = "id, original_query, status, created_at, conversation_history, \
                       supervisor_response, resolved_at, room_id, participant_id";

pub struct HelpRequestRepository;

impl HelpRequestRepository {
    pub async fn create(conn: &Connection, request: &HelpRequest) -> Result<()> {
        let created_at = request.created_at.unwrap_or_else(Utc::now);

        conn.execute(
            r#"
            INSERT INTO help_requests (
                id, original_query, status, created_at, conversation_history,
                supervisor_response, resolved_at, room_id, participant_id
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                request.id.clone(),
                request.original_query.clone(),
                request.status.to_string(),
                encode_timestamp(created_at),
                serde_json::to_string(&request.conversation_history)?,
                request.supervisor_response.clone(),
                request.resolved_at.map(encode_timestamp),
                request.room_id.clone(),
                request.participant_id.clone(),
            ],
        )
        .await?;

        Ok(())
    }

    pub async fn get_by_id(conn: &Connection, id: &str) -> Result<Option<HelpRequest>> {
        let sql = format!("SELECT {COLUMNS} FROM help_requests WHERE id = ?1");
        let mut rows = conn.query(&sql, params![id]).await?;

        if let Some(row) = rows.next().await? {
            Ok(Some(Self::row_to_request(&row)?))
        } else {
            Ok(None)
        }
    }

    pub async fn list(conn: &Connection, statuses: &[RequestStatus]) -> Result<Vec<HelpRequest>> {
        let mut sql = format!("SELECT {COLUMNS} FROM help_requests");
        if !statuses.is_empty() {
            let placeholders: Vec<String> =
                (1..=statuses.len()).map(|i| format!("?{i}")).collect();
            sql.push_str(&format!(" WHERE status IN ({})", placeholders.join(", ")));
        }
        sql.push_str(" ORDER BY created_at DESC, id ASC");

        let values: Vec<libsql::Value> = statuses
            .iter()
            .map(|s| libsql::Value::from(s.to_string()))
            .collect();

        let mut rows = conn.query(&sql, libsql::params_from_iter(values)).await?;
        let mut results = Vec::new();
        while let Some(row) = rows.next().await? {
            results.push(Self::row_to_request(&row)?);
        }
        Ok(results)
    }

    /// Guarded `pending -> resolved` transition plus the learned-answer
    /// insert, in one transaction.
    ///
    /// `resolved_at` is `max(now, created_at)` so it can never precede
    /// creation even with clock skew between writers.
    pub async fn resolve(
        conn: &Connection,
        id: &str,
        answer: &str,
        now: DateTime<Utc>,
        cutoff: DateTime<Utc>,
    ) -> Result<ResolveOutcome> {
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .await?;

        let updated = tx
            .execute(
                r#"
                UPDATE help_requests
                SET status = 'resolved',
                    supervisor_response = ?2,
                    resolved_at = MAX(created_at, ?3)
                WHERE id = ?1 AND status = 'pending' AND created_at > ?4
                "#,
                params![id, answer, encode_timestamp(now), encode_timestamp(cutoff)],
            )
            .await?;

        if updated == 0 {
            let outcome = match Self::get_by_id(&tx, id).await? {
                None => ResolveOutcome::NotFound,
                Some(current) if current.status.is_terminal() => {
                    ResolveOutcome::AlreadyTerminal(current.status)
                }
                Some(_) => {
                    tx.execute(
                        "UPDATE help_requests SET status = 'unresolved' WHERE id = ?1 AND status = 'pending'",
                        params![id],
                    )
                    .await?;
                    ResolveOutcome::Expired
                }
            };
            tx.commit().await?;
            return Ok(outcome);
        }

        let request = Self::get_by_id(&tx, id).await?.ok_or_else(|| {
            HandoffError::Internal(format!("help request {id} vanished during resolve"))
        })?;

        let entry = KnowledgeBaseEntry {
            id: nanoid::nanoid!(),
            question: request.original_query.clone(),
            answer: answer.to_string(),
            created_at: request.resolved_at,
            source_request_id: Some(request.id.clone()),
        };
        KnowledgeRepository::insert(&tx, &entry).await?;

        tx.commit().await?;
        Ok(ResolveOutcome::Resolved { request, entry })
    }

    /// Marks every overdue pending request as unresolved. Safe to repeat.
    pub async fn expire_pending_before(
        conn: &Connection,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<String>> {
        let mut rows = conn
            .query(
                r#"
                UPDATE help_requests
                SET status = 'unresolved'
                WHERE status = 'pending' AND created_at <= ?1
                RETURNING id
                "#,
                params![encode_timestamp(cutoff)],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            ids.push(row.get::<String>(0)?);
        }
        Ok(ids)
    }

    fn row_to_request(row: &libsql::Row) -> Result<HelpRequest> {
        let status = row
            .get::<String>(2)?
            .parse::<RequestStatus>()
            .map_err(HandoffError::Internal)?;

        Ok(HelpRequest {
            id: row.get(0)?,
            original_query: row.get(1)?,
            status,
            created_at: decode_timestamp(&row.get::<String>(3)?),
            conversation_history: serde_json::from_str(&row.get::<String>(4)?)
                .unwrap_or_default(),
            supervisor_response: row.get(5)?,
            resolved_at: row
                .get::<Option<String>>(6)?
                .as_deref()
                .and_then(decode_timestamp),
            room_id: row.get(7)?,
            participant_id: row.get(8)?,
        })
    }
}
