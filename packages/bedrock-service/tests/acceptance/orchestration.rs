use std::sync::{Arc, Mutex};

use serde_json::json;

use super::{
	answer_only, asks, is_combination, is_decomposition, request, split, unavailable, whole,
};
use bedrock_providers::web_search::{WebResult, WebSearchResponse};
use bedrock_service::{
	Citation, Error, Mode, WebSource,
	agent::nodes::UNABLE_TO_ANSWER,
	orchestrator::concatenate_answers,
};
use bedrock_testkit::{
	Fakes,
	config::SECONDARY_ENDPOINT,
	fakes::{self, FakeChunkIndex, FakeCompletion, FakeConversations, FakeTabular, FakeWebSearch},
	test_config,
};

const SUB_QUERIES: [&str; 3] = ["Alpha revenue?", "Beta revenue?", "Gamma revenue?"];

fn sub_answer(question: &str) -> String {
	format!("Answer to {question}")
}

#[tokio::test]
async fn sub_answers_keep_their_order_across_workers() {
	let combination_prompt = Arc::new(Mutex::new(String::new()));
	let captured = combination_prompt.clone();
	let completion = FakeCompletion::new(move |_, prompt| {
		if is_decomposition(prompt) {
			return Ok(split("Compare revenue of Alpha, Beta and Gamma.", &SUB_QUERIES));
		}
		if is_combination(prompt) {
			*captured.lock().unwrap_or_else(|err| err.into_inner()) = prompt.to_string();

			return Ok(answer_only("Combined."));
		}

		match SUB_QUERIES.iter().find(|question| asks(prompt, question)) {
			Some(question) => Ok(fakes::generation_reply(&sub_answer(question), "answer")),
			None => unavailable(),
		}
	})
	// The first sub-query finishes last.
	.with_delay(|prompt| if asks(prompt, SUB_QUERIES[0]) { 50 } else { 0 });
	let fakes = Fakes::new(completion);
	let service = fakes.service(test_config());
	let response = service
		.query(request("Compare revenue of Alpha, Beta and Gamma.", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert!(response.decomposed);
	assert_eq!(response.sub_queries, SUB_QUERIES);
	assert_eq!(response.answer, "Combined.");
	assert!(fakes.completion.endpoints().iter().any(|endpoint| endpoint == SECONDARY_ENDPOINT));

	let prompt = combination_prompt.lock().unwrap_or_else(|err| err.into_inner()).clone();
	let positions: Vec<usize> = SUB_QUERIES
		.iter()
		.enumerate()
		.map(|(idx, question)| {
			let entry =
				format!("### Sub-question {}: {question}\n{}", idx + 1, sub_answer(question));

			prompt.find(&entry).expect("Every sub-answer reaches the combination prompt.")
		})
		.collect();

	assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn failed_sub_query_keeps_its_slot_when_combination_fails() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			return Ok(split("Alpha and Beta revenue.", &SUB_QUERIES[..2]));
		}
		if asks(prompt, SUB_QUERIES[0]) && !is_combination(prompt) {
			return Ok(fakes::generation_reply(&sub_answer(SUB_QUERIES[0]), "answer"));
		}

		unavailable()
	});
	let fakes = Fakes::new(completion);
	let service = fakes.service(test_config());
	let response = service
		.query(request("Alpha and Beta revenue.", Mode::Internal))
		.await
		.expect("Query succeeds.");
	let expected = concatenate_answers(&[
		(SUB_QUERIES[0].to_string(), sub_answer(SUB_QUERIES[0])),
		(SUB_QUERIES[1].to_string(), UNABLE_TO_ANSWER.to_string()),
	]);

	assert_eq!(response.answer, expected);
}

#[tokio::test]
async fn background_job_keeps_every_sub_query_on_the_primary_backend() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			return Ok(split("Alpha and Beta revenue.", &SUB_QUERIES[..2]));
		}
		if is_combination(prompt) {
			return Ok(answer_only("Combined."));
		}

		Ok(fakes::generation_reply("Sub-answer.", "answer"))
	});
	let fakes = Fakes {
		conversations: Arc::new(FakeConversations { job_active: true, ..Default::default() }),
		..Fakes::new(completion)
	};
	let service = fakes.service(test_config());
	let response = service
		.query(request("Alpha and Beta revenue.", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert!(response.decomposed);
	assert!(!fakes.completion.endpoints().iter().any(|endpoint| endpoint == SECONDARY_ENDPOINT));
}

#[tokio::test]
async fn tabular_lookup_stays_whole() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			assert!(prompt.contains("CREATE TABLE sales"));

			return Ok(whole("What was the total of sales in March?"));
		}
		if asks(prompt, "What was the total of sales in March?") {
			return Ok(fakes::generation_reply("March sales totalled 120.", "answer"));
		}

		unavailable()
	});
	let fakes = Fakes {
		tabular: Arc::new(FakeTabular::new(
			"CREATE TABLE sales (month TEXT, total REAL)",
			Ok("| 120 |".to_string()),
		)),
		..Fakes::new(completion)
	};
	let service = fakes.service(test_config());
	let response = service
		.query(request("and in March?", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert!(!response.decomposed);
	assert_eq!(response.question, "and in March?");
	assert_eq!(response.sub_queries, vec!["What was the total of sales in March?"]);
	assert_eq!(response.answer, "March sales totalled 120.");
}

#[tokio::test]
async fn split_with_one_sub_query_collapses_to_the_resolved_query() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			return Ok(split("What is the refund policy?", &["refund"]));
		}

		Ok(fakes::generation_reply("Thirty days.", "answer"))
	});
	let fakes = Fakes::new(completion);
	let service = fakes.service(test_config());
	let response = service
		.query(request("What is the refund policy", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert!(!response.decomposed);
	assert_eq!(response.sub_queries, vec!["What is the refund policy?"]);
}

#[tokio::test]
async fn unusable_decomposition_keeps_the_raw_question() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			return Ok("I would split this into parts.".to_string());
		}

		Ok(fakes::generation_reply("Thirty days.", "answer"))
	});
	let fakes = Fakes::new(completion);
	let service = fakes.service(test_config());
	let response = service
		.query(request("What is the refund policy", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert!(!response.decomposed);
	assert_eq!(response.sub_queries, vec!["What is the refund policy"]);
	assert_eq!(response.answer, "Thirty days.");
}

#[tokio::test]
async fn citations_follow_the_model_references() {
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			return Ok(whole("Which clauses cover termination?"));
		}

		Ok(json!({
			"answer": "Clauses 4 and 9.",
			"action": "answer",
			"chunks_used": [
				{ "document_id": "doc-2", "page_no": 5 },
				{ "document_id": "doc-2", "page_no": 5 },
				{ "document_id": "doc-9", "page_no": 1 },
				{ "document_id": "doc-1", "page_no": 3 },
			],
		})
		.to_string())
	});
	let semantic = vec![
		fakes::chunk("doc-1", 3, 0, "termination for convenience"),
		fakes::chunk("doc-2", 5, 0, "termination for cause"),
	];
	let fakes = Fakes {
		chunks: Arc::new(FakeChunkIndex::new(semantic, Vec::new())),
		..Fakes::new(completion)
	};
	let service = fakes.service(test_config());
	let response = service
		.query(request("Which clauses cover termination?", Mode::Internal))
		.await
		.expect("Query succeeds.");

	assert_eq!(
		response.citations,
		vec![
			Citation {
				document_id: "doc-2".to_string(),
				title: "doc-2 title".to_string(),
				page_no: 5,
				file_name: "doc-2.pdf".to_string(),
			},
			Citation {
				document_id: "doc-1".to_string(),
				title: "doc-1 title".to_string(),
				page_no: 3,
				file_name: "doc-1.pdf".to_string(),
			},
		],
	);
}

#[tokio::test]
async fn external_mode_reports_prefetched_sources_and_records_the_exchange() {
	let question = "Who won the cup?";
	let result = |url: &str| WebResult {
		url: url.to_string(),
		title: format!("Title of {url}"),
		content: "Match report.".to_string(),
		favicon: None,
	};
	let search = WebSearchResponse {
		query: question.to_string(),
		answer: Some("The home side.".to_string()),
		results: vec![result("https://a.test"), result("https://a.test"), result("https://b.test")],
	};
	let completion = FakeCompletion::new(|_, prompt| {
		if is_decomposition(prompt) {
			return Ok(whole("Who won the cup?"));
		}
		if prompt.contains("## Initial web search") {
			return Ok(fakes::generation_reply("The home side won.", "answer"));
		}

		unavailable()
	});
	let fakes = Fakes {
		web_search: Arc::new(FakeWebSearch::with_responses(vec![search])),
		..Fakes::new(completion)
	};
	let service = fakes.service(test_config());
	let response =
		service.query(request(question, Mode::External)).await.expect("Query succeeds.");

	assert_eq!(response.answer, "The home side won.");
	assert_eq!(
		response.web_sources,
		vec![
			WebSource {
				url: "https://a.test".to_string(),
				title: "Title of https://a.test".to_string(),
				favicon: None,
			},
			WebSource {
				url: "https://b.test".to_string(),
				title: "Title of https://b.test".to_string(),
				favicon: None,
			},
		],
	);
	assert_eq!(
		fakes.conversations.recorded(),
		vec![(question.to_string(), "The home side won.".to_string())],
	);
}

#[tokio::test]
async fn blank_question_is_rejected() {
	let fakes = Fakes::new(FakeCompletion::failing());
	let service = fakes.service(test_config());
	let err = service
		.query(request("   ", Mode::Internal))
		.await
		.expect_err("A blank question is invalid.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert_eq!(fakes.completion.count(), 0);
}
