use std::{collections::HashMap, sync::Arc};

use serde_json::json;
use uuid::Uuid;

use super::{CONVERSATION, OWNER, answer_only, is_self_knowledge, request, unavailable};
use bedrock_config::Config;
use bedrock_service::{
	BackendDescriptor, Mode,
	agent::{
		self, STEP_CEILING_APOLOGY,
		nodes::{NO_GLOBAL_SUMMARY, UNABLE_TO_ANSWER, WEB_SEARCH_FAILED},
		state::{Action, QueryState, StateScope},
	},
};
use bedrock_testkit::{
	Fakes,
	fakes::{self, FakeCompletion, FakeConversations, FakeTabular, FakeWebSearch},
	test_config,
};

fn single_pass() -> Config {
	let mut cfg = test_config();

	cfg.orchestrator.decomposition = false;

	cfg
}

fn action(action: &str) -> String {
	fakes::generation_reply("", action)
}

#[tokio::test]
async fn structured_query_error_reaches_the_next_generation() {
	let completion = FakeCompletion::new(|_, prompt| {
		if prompt.contains("SQL query failed: no such table: revenue") {
			return Ok(fakes::generation_reply("The revenue table does not exist.", "answer"));
		}

		Ok(json!({
			"answer": "",
			"action": "structured_query",
			"structured_query": "SELECT total FROM revenue",
		})
		.to_string())
	});
	let fakes = Fakes {
		tabular: Arc::new(FakeTabular::new(
			"CREATE TABLE sales (month TEXT, total REAL)",
			Err("no such table: revenue".to_string()),
		)),
		..Fakes::new(completion)
	};
	let service = fakes.service(single_pass());
	let response = service
		.query(request("What is the revenue total?", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert_eq!(response.answer, "The revenue table does not exist.");
	assert_eq!(fakes.tabular.statements(), vec!["SELECT total FROM revenue"]);
	assert_eq!(fakes.completion.count(), 2);
}

#[tokio::test]
async fn document_summary_hit_answers_without_another_generation() {
	let completion = FakeCompletion::replying(
		&json!({ "answer": "", "action": "document_summary", "document_id": "doc-7" }).to_string(),
	);
	let fakes = Fakes {
		conversations: Arc::new(FakeConversations {
			document_summaries: HashMap::from([(
				"doc-7".to_string(),
				"A quarterly report.".to_string(),
			)]),
			..FakeConversations::default()
		}),
		..Fakes::new(completion)
	};
	let service = fakes.service(single_pass());
	let response = service
		.query(request("Summarize the quarterly report.", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert_eq!(response.answer, "Summary: \n A quarterly report.");
	assert_eq!(fakes.completion.count(), 1);
}

#[tokio::test]
async fn missing_global_summary_returns_to_generation() {
	let completion = FakeCompletion::new(|_, prompt| {
		if prompt.contains(NO_GLOBAL_SUMMARY) {
			return Ok(fakes::generation_reply("Nothing is summarized yet.", "answer"));
		}

		Ok(action("global_summary"))
	});
	let fakes = Fakes::new(completion);
	let service = fakes.service(single_pass());
	let response = service
		.query(request("Give me an overview of everything.", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert_eq!(response.answer, "Nothing is summarized yet.");
	assert_eq!(fakes.completion.count(), 2);
}

#[tokio::test]
async fn global_summary_hit_is_the_answer() {
	let fakes = Fakes {
		conversations: Arc::new(FakeConversations {
			global_summary: Some("Three contracts and one invoice.".to_string()),
			..FakeConversations::default()
		}),
		..Fakes::new(FakeCompletion::replying(&action("global_summary")))
	};
	let service = fakes.service(single_pass());
	let response = service
		.query(request("Give me an overview of everything.", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert_eq!(response.answer, "Three contracts and one invoice.");
}

#[tokio::test]
async fn web_search_ceiling_ends_in_the_external_apology() {
	let completion = FakeCompletion::replying(
		&json!({ "answer": "", "action": "web_search", "web_search_queries": ["latest rates"] })
			.to_string(),
	);
	let fakes = Fakes::new(completion);
	let service = fakes.service(single_pass());
	let response = service
		.query(request("What are the latest rates?", Mode::External))
		.await
		.expect("Query succeeds.");

	assert_eq!(response.answer, UNABLE_TO_ANSWER);
	assert!(!response.use_self_knowledge);
	// Two searches within the ceiling, the third request routes to failure.
	assert_eq!(fakes.completion.count(), 3);
	assert_eq!(
		fakes.web_search.queries(),
		vec!["What are the latest rates?", "latest rates", "latest rates"],
	);
}

#[tokio::test]
async fn internal_failure_falls_back_to_self_knowledge() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_self_knowledge(prompt) {
			return Ok(answer_only("Water boils at 100 degrees Celsius at sea level."));
		}

		Ok(fakes::generation_reply("Not in the documents.", "failure"))
	});
	let fakes = Fakes::new(completion);
	let service = fakes.service(single_pass());
	let mut req = request("At what temperature does water boil?", Mode::Internal);

	req.use_self_knowledge = true;

	let response = service.query(req).await.expect("Query succeeds.");

	assert_eq!(response.answer, "Water boils at 100 degrees Celsius at sea level.");
	assert!(response.use_self_knowledge);
}

#[tokio::test]
async fn exhausted_generation_degrades_to_the_unable_answer() {
	let fakes = Fakes::new(FakeCompletion::new(|_, _| unavailable()));
	let service = fakes.service(single_pass());
	let response = service
		.query(request("What changed last quarter?", Mode::Internal))
		.await
		.expect("Exhaustion is not a request error.");

	assert_eq!(response.answer, UNABLE_TO_ANSWER);
	// Two generation rounds and one self-knowledge call, each spending 3 attempts on 2 endpoints.
	assert_eq!(fakes.completion.count(), 18);
}

#[tokio::test]
async fn step_ceiling_stops_a_looping_state_machine() {
	let mut cfg = single_pass();

	cfg.agent.max_steps = 5;
	cfg.agent.max_structured_query = 100;

	let completion = FakeCompletion::replying(
		&json!({ "answer": "", "action": "structured_query", "structured_query": "SELECT 1" })
			.to_string(),
	);
	let fakes = Fakes {
		tabular: Arc::new(FakeTabular::new("CREATE TABLE t (a INTEGER)", Ok("| 1 |".to_string()))),
		..Fakes::new(completion)
	};
	let service = fakes.service(cfg);
	let response = service
		.query(request("Loop forever.", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert_eq!(response.answer, STEP_CEILING_APOLOGY);
	assert_eq!(fakes.tabular.statements().len(), 2);
}

#[tokio::test]
async fn failed_web_search_leaves_a_note_for_the_next_generation() {
	let completion = FakeCompletion::new(|_, prompt| {
		if prompt.contains(&format!("## Web search status\n{WEB_SEARCH_FAILED}")) {
			return Ok(fakes::generation_reply("Search is down, rates are unknown.", "answer"));
		}

		Ok(json!({ "answer": "", "action": "web_search", "web_search_queries": ["latest rates"] })
			.to_string())
	});
	let fakes = Fakes { web_search: Arc::new(FakeWebSearch::failing()), ..Fakes::new(completion) };
	let cfg = single_pass();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let service = fakes.service(cfg);
	let scope = StateScope {
		trace_id: Uuid::new_v4(),
		owner_id: OWNER.to_string(),
		conversation_id: CONVERSATION.to_string(),
		original_question: "What are the latest rates?".to_string(),
		resolved_question: "What are the latest rates?".to_string(),
		history: Vec::new(),
		mode: Mode::External,
		allow_self_knowledge: false,
		schema_hint: None,
		prefetched: None,
	};
	let state =
		agent::run(&service, QueryState::new(scope, "What are the latest rates?", backend)).await;

	assert_eq!(state.action, Some(Action::Answer));
	assert_eq!(state.answer, "Search is down, rates are unknown.");
	assert_eq!(state.web_search_attempts, 1);
	assert_eq!(state.web_note.as_deref(), Some(WEB_SEARCH_FAILED));
	assert!(state.web_results.is_empty());
	assert_eq!(fakes.web_search.queries(), vec!["latest rates"]);
	assert_eq!(fakes.completion.count(), 2);
}
