use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use super::{answer_only, unavailable};
use bedrock_service::{BackendDescriptor, Error, contracts::CombinationContract};
use bedrock_testkit::{
	Fakes,
	config::{PRIMARY_ENDPOINT, SECONDARY_ENDPOINT},
	fakes::{FakeCompletion, FakeHosted},
	test_config,
};

#[tokio::test]
async fn budget_is_spent_before_reporting_exhaustion() {
	let cfg = test_config();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes = Fakes::new(FakeCompletion::failing());
	let service = fakes.service(cfg);
	let err = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect_err("Every tier fails.");

	assert!(matches!(err, Error::Exhausted { attempts: 3 }));
	// Each attempt tries the high-priority endpoint, then its alternate.
	assert_eq!(fakes.completion.count(), 6);
	assert_eq!(
		fakes.completion.endpoints(),
		[PRIMARY_ENDPOINT, SECONDARY_ENDPOINT].repeat(3),
	);
}

#[tokio::test]
async fn secondary_backend_failures_are_not_redirected() {
	let cfg = test_config();
	let backend = BackendDescriptor::secondary(&cfg.backends);
	let fakes = Fakes::new(FakeCompletion::failing());
	let service = fakes.service(cfg);
	let result = service.gateway.invoke(&CombinationContract, "Combine.", &backend).await;

	assert!(result.is_err());
	assert_eq!(fakes.completion.endpoints(), vec![SECONDARY_ENDPOINT.to_string(); 3]);
}

#[tokio::test]
async fn alternate_endpoint_recovers_a_primary_failure() {
	let cfg = test_config();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes = Fakes::new(FakeCompletion::new(|backend, _| {
		if backend.endpoint == PRIMARY_ENDPOINT {
			return unavailable();
		}

		Ok(answer_only("From the alternate endpoint."))
	}));
	let service = fakes.service(cfg);
	let output = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect("The alternate endpoint answers.");

	assert_eq!(output.answer, "From the alternate endpoint.");
	assert_eq!(fakes.completion.endpoints(), vec![PRIMARY_ENDPOINT, SECONDARY_ENDPOINT]);
}

#[tokio::test]
async fn provider_a_rotates_every_credential_before_provider_b() {
	let mut cfg = test_config();

	cfg.gateway.provider_a.enabled = true;
	cfg.gateway.provider_b.enabled = true;

	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes = Fakes {
		provider_a: Arc::new(FakeHosted::failing()),
		provider_b: Arc::new(FakeHosted::replying(&answer_only("From provider B."))),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(cfg);
	let output = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect("Provider B answers.");

	assert_eq!(output.answer, "From provider B.");
	assert_eq!(fakes.completion.count(), 2);
	assert_eq!(fakes.provider_a.credentials(), vec!["key-1", "key-2", "key-3"]);
	assert_eq!(fakes.provider_b.credentials(), vec!["key-b"]);
}

#[tokio::test]
async fn provider_a_success_stops_the_rotation() {
	let mut cfg = test_config();

	cfg.gateway.provider_a.enabled = true;
	cfg.gateway.provider_b.enabled = true;

	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes = Fakes {
		provider_a: Arc::new(FakeHosted::replying(&answer_only("From provider A."))),
		..Fakes::new(FakeCompletion::failing())
	};
	let service = fakes.service(cfg);
	let output = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect("Provider A answers.");

	assert_eq!(output.answer, "From provider A.");
	assert_eq!(fakes.provider_a.credentials(), vec!["key-1"]);
	assert_eq!(fakes.provider_b.count(), 0);
}

#[tokio::test]
async fn reasoning_and_fences_are_removed_before_parsing() {
	let cfg = test_config();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let raw = "<think>{\"answer\": \"draft\"}</think>\n```json\n{\"answer\": \"Clean.\"}\n```";
	let fakes = Fakes::new(FakeCompletion::replying(raw));
	let service = fakes.service(cfg);
	let output = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect("Sanitized output parses.");

	assert_eq!(output.answer, "Clean.");
	assert_eq!(fakes.completion.count(), 1);
}

#[tokio::test]
async fn contract_violations_consume_the_budget() {
	let cfg = test_config();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes = Fakes::new(FakeCompletion::replying(&answer_only("   ")));
	let service = fakes.service(cfg);
	let err = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect_err("A blank answer violates the contract.");

	assert!(matches!(err, Error::Exhausted { attempts: 3 }));
	assert_eq!(fakes.completion.count(), 6);
}

#[tokio::test]
async fn format_instructions_follow_the_prompt() {
	let cfg = test_config();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes = Fakes::new(FakeCompletion::new(|_, prompt| {
		if prompt.starts_with("Combine.\n\nRespond with a single JSON object") {
			Ok(answer_only("Instructed."))
		} else {
			unavailable()
		}
	}));
	let service = fakes.service(cfg);
	let output = service
		.gateway
		.invoke(&CombinationContract, "Combine.", &backend)
		.await
		.expect("The prompt carries its format instructions.");

	assert_eq!(output.answer, "Instructed.");
}

const CALL_DELAY_MS: u64 = 100;
const CALL_DELAY: Duration = Duration::from_millis(CALL_DELAY_MS);

#[tokio::test]
async fn calls_to_one_backend_are_serialized() {
	let cfg = test_config();
	let backend = BackendDescriptor::primary(&cfg.backends);
	let fakes =
		Fakes::new(FakeCompletion::replying(&answer_only("Done.")).with_delay(|_| CALL_DELAY_MS));
	let service = fakes.service(cfg);
	let started = Instant::now();
	let (first, second) = tokio::join!(
		service.gateway.invoke(&CombinationContract, "First.", &backend),
		service.gateway.invoke(&CombinationContract, "Second.", &backend),
	);

	assert!(first.is_ok() && second.is_ok());
	assert!(started.elapsed() >= CALL_DELAY * 2);
	assert_eq!(fakes.completion.count(), 2);
}

#[tokio::test]
async fn calls_to_different_backends_overlap() {
	let cfg = test_config();
	let primary = BackendDescriptor::primary(&cfg.backends);
	let secondary = BackendDescriptor::secondary(&cfg.backends);
	let fakes =
		Fakes::new(FakeCompletion::replying(&answer_only("Done.")).with_delay(|_| CALL_DELAY_MS));
	let service = fakes.service(cfg);
	let started = Instant::now();
	let (first, second) = tokio::join!(
		service.gateway.invoke(&CombinationContract, "First.", &primary),
		service.gateway.invoke(&CombinationContract, "Second.", &secondary),
	);

	assert!(first.is_ok() && second.is_ok());
	assert!(started.elapsed() < CALL_DELAY * 2);
	assert_eq!(fakes.completion.count(), 2);
	assert!(fakes.completion.endpoints().contains(&SECONDARY_ENDPOINT.to_string()));
}
