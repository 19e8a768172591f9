const CONVERSATION_MESSAGES: &str = "\
CREATE TABLE IF NOT EXISTS conversation_messages (
	message_id uuid PRIMARY KEY,
	owner_id text NOT NULL,
	conversation_id text NOT NULL,
	role text NOT NULL CHECK (role IN ('user', 'assistant')),
	content text NOT NULL,
	created_at timestamptz NOT NULL DEFAULT clock_timestamp()
);
CREATE INDEX IF NOT EXISTS conversation_messages_scope_idx
	ON conversation_messages (owner_id, conversation_id, created_at DESC)";
const DOCUMENT_SUMMARIES: &str = "\
CREATE TABLE IF NOT EXISTS document_summaries (
	owner_id text NOT NULL,
	conversation_id text NOT NULL,
	document_id text NOT NULL,
	summary text NOT NULL,
	updated_at timestamptz NOT NULL DEFAULT now(),
	PRIMARY KEY (owner_id, conversation_id, document_id)
)";
const CONVERSATION_SUMMARIES: &str = "\
CREATE TABLE IF NOT EXISTS conversation_summaries (
	owner_id text NOT NULL,
	conversation_id text NOT NULL,
	summary text NOT NULL,
	updated_at timestamptz NOT NULL DEFAULT now(),
	PRIMARY KEY (owner_id, conversation_id)
)";
const BACKGROUND_JOBS: &str = "\
CREATE TABLE IF NOT EXISTS background_jobs (
	job_id uuid PRIMARY KEY,
	owner_id text NOT NULL,
	conversation_id text NOT NULL,
	kind text NOT NULL,
	status text NOT NULL CHECK (status IN ('running', 'done', 'failed')),
	started_at timestamptz NOT NULL DEFAULT now(),
	finished_at timestamptz
);
CREATE INDEX IF NOT EXISTS background_jobs_running_idx
	ON background_jobs (owner_id, conversation_id)
	WHERE status = 'running'";

pub fn statements() -> Vec<&'static str> {
	[CONVERSATION_MESSAGES, DOCUMENT_SUMMARIES, CONVERSATION_SUMMARIES, BACKGROUND_JOBS]
		.iter()
		.flat_map(|block| block.split(';'))
		.map(str::trim)
		.filter(|statement| !statement.is_empty())
		.collect()
}
