use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{JobStatus, StoredMessage},
};

/// The last `turns` user/assistant exchanges of a conversation, oldest first.
pub async fn recent_messages(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
	turns: u32,
) -> Result<Vec<StoredMessage>> {
	let mut rows: Vec<StoredMessage> = sqlx::query_as(
		"\
SELECT message_id, role, content, created_at
FROM conversation_messages
WHERE owner_id = $1 AND conversation_id = $2
ORDER BY created_at DESC, message_id DESC
LIMIT $3",
	)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(i64::from(turns) * 2)
	.fetch_all(&db.pool)
	.await?;

	rows.reverse();

	Ok(rows)
}

pub async fn insert_message(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
	role: &str,
	content: &str,
) -> Result<Uuid> {
	let message_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO conversation_messages (message_id, owner_id, conversation_id, role, content)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(message_id)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(role)
	.bind(content)
	.execute(&db.pool)
	.await?;

	Ok(message_id)
}

pub async fn document_summary(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
	document_id: &str,
) -> Result<Option<String>> {
	let summary: Option<String> = sqlx::query_scalar(
		"\
SELECT summary
FROM document_summaries
WHERE owner_id = $1 AND conversation_id = $2 AND document_id = $3",
	)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(document_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(summary.filter(|text| !text.trim().is_empty()))
}

pub async fn upsert_document_summary(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
	document_id: &str,
	summary: &str,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO document_summaries (owner_id, conversation_id, document_id, summary)
VALUES ($1, $2, $3, $4)
ON CONFLICT (owner_id, conversation_id, document_id)
DO UPDATE SET summary = EXCLUDED.summary, updated_at = now()",
	)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(document_id)
	.bind(summary)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn conversation_summary(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
) -> Result<Option<String>> {
	let summary: Option<String> = sqlx::query_scalar(
		"\
SELECT summary
FROM conversation_summaries
WHERE owner_id = $1 AND conversation_id = $2",
	)
	.bind(owner_id)
	.bind(conversation_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(summary.filter(|text| !text.trim().is_empty()))
}

pub async fn upsert_conversation_summary(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
	summary: &str,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO conversation_summaries (owner_id, conversation_id, summary)
VALUES ($1, $2, $3)
ON CONFLICT (owner_id, conversation_id)
DO UPDATE SET summary = EXCLUDED.summary, updated_at = now()",
	)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(summary)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn background_job_active(
	db: &Db,
	owner_id: &str,
	conversation_id: &str,
) -> Result<bool> {
	let active: bool = sqlx::query_scalar(
		"\
SELECT EXISTS (
	SELECT 1
	FROM background_jobs
	WHERE owner_id = $1 AND conversation_id = $2 AND status = $3
)",
	)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(JobStatus::Running.as_str())
	.fetch_one(&db.pool)
	.await?;

	Ok(active)
}

pub async fn start_job(db: &Db, owner_id: &str, conversation_id: &str, kind: &str) -> Result<Uuid> {
	let job_id = Uuid::new_v4();

	sqlx::query(
		"\
INSERT INTO background_jobs (job_id, owner_id, conversation_id, kind, status)
VALUES ($1, $2, $3, $4, $5)",
	)
	.bind(job_id)
	.bind(owner_id)
	.bind(conversation_id)
	.bind(kind)
	.bind(JobStatus::Running.as_str())
	.execute(&db.pool)
	.await?;

	Ok(job_id)
}

pub async fn finish_job(db: &Db, job_id: Uuid, status: JobStatus) -> Result<()> {
	sqlx::query("UPDATE background_jobs SET status = $1, finished_at = now() WHERE job_id = $2")
		.bind(status.as_str())
		.bind(job_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}
