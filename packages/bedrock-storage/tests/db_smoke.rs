use bedrock_config::Postgres;
use bedrock_storage::{db::Db, models::JobStatus, queries};

#[tokio::test]
#[ignore = "Requires external Postgres. Set BEDROCK_PG_DSN to run."]
async fn conversation_reads_round_trip() {
	let Some(base_dsn) = bedrock_testkit::env_dsn() else {
		eprintln!("Skipping conversation_reads_round_trip; set BEDROCK_PG_DSN to run this test.");

		return;
	};
	let result = bedrock_testkit::with_test_db(&base_dsn, |test_db| {
		let dsn = test_db.dsn().to_string();

		async move {
			let cfg = Postgres { dsn, pool_max_conns: 1 };
			let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

			db.ensure_schema().await.expect("Failed to ensure schema.");
			db.ensure_schema().await.expect("Schema bootstrap must be idempotent.");

			for (role, content) in [
				("user", "q1"),
				("assistant", "a1"),
				("user", "q2"),
				("assistant", "a2"),
				("user", "q3"),
				("assistant", "a3"),
			] {
				queries::insert_message(&db, "owner", "conv", role, content)
					.await
					.expect("Failed to insert message.");
			}

			let recent = queries::recent_messages(&db, "owner", "conv", 2)
				.await
				.expect("Failed to read messages.");
			let contents: Vec<&str> = recent.iter().map(|msg| msg.content.as_str()).collect();

			assert_eq!(contents, vec!["q2", "a2", "q3", "a3"]);

			assert_eq!(
				queries::document_summary(&db, "owner", "conv", "doc-1").await.expect("Read failed."),
				None
			);

			queries::upsert_document_summary(&db, "owner", "conv", "doc-1", "Short summary.")
				.await
				.expect("Failed to write summary.");

			assert_eq!(
				queries::document_summary(&db, "owner", "conv", "doc-1")
					.await
					.expect("Read failed.")
					.as_deref(),
				Some("Short summary.")
			);

			let job_id = queries::start_job(&db, "owner", "conv", "mind_map")
				.await
				.expect("Failed to start job.");

			assert!(queries::background_job_active(&db, "owner", "conv").await.expect("Read failed."));

			queries::finish_job(&db, job_id, JobStatus::Done).await.expect("Failed to finish job.");

			assert!(!queries::background_job_active(&db, "owner", "conv").await.expect("Read failed."));

			Ok(())
		}
	})
	.await;

	result.expect("Test database run failed.");
}
