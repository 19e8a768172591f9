//! Read-only access to the per-conversation spreadsheet database.

use std::path::{Path, PathBuf};

use sqlx::{
	Column, ConnectOptions, Row, TypeInfo, ValueRef,
	sqlite::{SqliteConnectOptions, SqliteConnection, SqliteRow},
};

use crate::{Error, Result};
use bedrock_domain::sql_guard;

const SAMPLE_ROWS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTable {
	pub columns: Vec<String>,
	pub rows: Vec<Vec<String>>,
	pub row_count: usize,
	pub truncated: bool,
}
impl QueryTable {
	pub fn to_markdown(&self) -> String {
		if self.columns.is_empty() {
			return "(no rows)".to_string();
		}

		let mut out = String::new();

		out.push_str(&markdown_row(&self.columns));
		out.push('\n');
		out.push_str(&markdown_row(&vec!["---".to_string(); self.columns.len()]));

		for row in &self.rows {
			out.push('\n');
			out.push_str(&markdown_row(row));
		}

		out
	}

	pub fn render(&self, max_rows: u32) -> String {
		let mut parts = vec![
			"**Query executed successfully.**".to_string(),
			format!("Rows returned: {}", self.row_count),
		];

		if self.truncated {
			parts.push(format!("(Showing first {max_rows} of {} rows)", self.row_count));
		}

		parts.push(String::new());
		parts.push(self.to_markdown());

		parts.join("\n")
	}
}

pub struct TabularStore {
	pub root_dir: PathBuf,
	pub max_rows: u32,
}
impl TabularStore {
	pub fn new(cfg: &bedrock_config::Tabular) -> Self {
		Self { root_dir: cfg.root_dir.clone(), max_rows: cfg.max_rows }
	}

	pub fn database_path(&self, owner_id: &str, conversation_id: &str) -> Result<PathBuf> {
		validate_segment(owner_id)?;
		validate_segment(conversation_id)?;

		Ok(self.root_dir.join(owner_id).join(format!("{conversation_id}.sqlite")))
	}

	pub fn has_data(&self, owner_id: &str, conversation_id: &str) -> bool {
		self.database_path(owner_id, conversation_id).map(|path| path.is_file()).unwrap_or(false)
	}

	/// Human-readable listing of every table with its columns, row count and a few sample rows.
	/// Returns `None` when the conversation has no spreadsheet data.
	pub async fn schema(&self, owner_id: &str, conversation_id: &str) -> Result<Option<String>> {
		let path = self.database_path(owner_id, conversation_id)?;

		if !path.is_file() {
			return Ok(None);
		}

		let mut conn = open_read_only(&path).await?;
		let tables: Vec<String> = sqlx::query_scalar(
			"\
SELECT name
FROM sqlite_master
WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
ORDER BY name",
		)
		.fetch_all(&mut conn)
		.await?;

		if tables.is_empty() {
			return Ok(None);
		}

		let mut parts = Vec::with_capacity(tables.len());

		for table in tables {
			let quoted = quote_identifier(&table);
			let info_sql = format!("PRAGMA table_info({quoted})");
			let count_sql = format!("SELECT COUNT(*) FROM {quoted}");
			let columns: Vec<(String, String)> = sqlx::query(&info_sql)
				.fetch_all(&mut conn)
				.await?
				.iter()
				.map(|row| {
					let name: String = row.try_get("name").unwrap_or_default();
					let decl: String = row.try_get("type").unwrap_or_default();

					(name, decl)
				})
				.collect();
			let row_count =
				match sqlx::query_scalar::<_, i64>(&count_sql).fetch_one(&mut conn).await {
					Ok(count) => count.to_string(),
					Err(_) => "unknown".to_string(),
				};
			let samples = sqlx::query(&format!("SELECT * FROM {quoted} LIMIT {SAMPLE_ROWS}"))
				.fetch_all(&mut conn)
				.await
				.unwrap_or_default();
			let mut block = format!("Table: {table}\n  Rows: {row_count}\n  Columns:");

			for (name, decl) in &columns {
				block.push_str(&format!("\n  - {name} ({decl})"));
			}

			if !samples.is_empty() {
				block.push_str("\n  Sample rows:");

				for row in &samples {
					let cells: Vec<String> = row
						.columns()
						.iter()
						.enumerate()
						.map(|(idx, column)| format!("{}: {}", column.name(), cell_text(row, idx)))
						.collect();

					block.push_str(&format!("\n    {{{}}}", cells.join(", ")));
				}
			}

			parts.push(block);
		}

		Ok(Some(parts.join("\n\n")))
	}

	/// Runs one guarded read-only statement and keeps at most `max_rows` rows.
	pub async fn execute(
		&self,
		owner_id: &str,
		conversation_id: &str,
		statement: &str,
	) -> Result<QueryTable> {
		sql_guard::check_read_only(statement)
			.map_err(|rejection| Error::InvalidArgument(rejection.to_string()))?;

		let path = self.database_path(owner_id, conversation_id)?;

		if !path.is_file() {
			return Err(Error::NotFound(
				"No spreadsheet data is available for this conversation.".to_string(),
			));
		}

		let mut conn = open_read_only(&path).await?;
		let rows = sqlx::query(statement).fetch_all(&mut conn).await?;
		let columns: Vec<String> = rows
			.first()
			.map(|row| row.columns().iter().map(|column| column.name().to_string()).collect())
			.unwrap_or_default();
		let row_count = rows.len();
		let keep = row_count.min(self.max_rows as usize);
		let rendered: Vec<Vec<String>> = rows[..keep]
			.iter()
			.map(|row| (0..row.columns().len()).map(|idx| cell_text(row, idx)).collect())
			.collect();

		Ok(QueryTable { columns, rows: rendered, row_count, truncated: row_count > keep })
	}
}

async fn open_read_only(path: &Path) -> Result<SqliteConnection> {
	Ok(SqliteConnectOptions::new().filename(path).read_only(true).connect().await?)
}

fn validate_segment(segment: &str) -> Result<()> {
	let valid = !segment.is_empty()
		&& segment.chars().all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');

	if valid {
		Ok(())
	} else {
		Err(Error::InvalidArgument(format!("Invalid tabular scope segment {segment:?}.")))
	}
}

fn quote_identifier(name: &str) -> String {
	format!("\"{}\"", name.replace('"', "\"\""))
}

fn cell_text(row: &SqliteRow, idx: usize) -> String {
	let Ok(raw) = row.try_get_raw(idx) else { return String::new() };

	if raw.is_null() {
		return String::new();
	}

	let type_name = raw.type_info().name().to_string();

	match type_name.as_str() {
		"INTEGER" => row.try_get::<i64, _>(idx).map(|v| v.to_string()).unwrap_or_default(),
		"REAL" => row.try_get::<f64, _>(idx).map(|v| v.to_string()).unwrap_or_default(),
		"BLOB" => row
			.try_get::<Vec<u8>, _>(idx)
			.map(|bytes| format!("<{} bytes>", bytes.len()))
			.unwrap_or_default(),
		_ => row.try_get::<String, _>(idx).unwrap_or_default(),
	}
}

fn markdown_row(cells: &[String]) -> String {
	let escaped: Vec<String> =
		cells.iter().map(|cell| cell.replace('|', "\\|").replace('\n', " ")).collect();

	format!("| {} |", escaped.join(" | "))
}
