use std::sync::Arc;
use std::time::{Duration, Instant};

use http_journey_runner::prelude::*;
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

struct Harness {
    executor: Arc<Executor>,
    shutdown_handle: ShutdownHandle,
    reporter: Arc<Reporter>,
}

impl Harness {
    fn new() -> Self {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let shutdown_handle = ShutdownHandle::new();
        Self {
            executor: Arc::new(Executor::new(runtime, shutdown_handle.clone())),
            shutdown_handle,
            reporter: Arc::new(ReportConfig::default().enable_in_memory().init()),
        }
    }

    fn block_on<T>(&self, fut: impl std::future::Future<Output = T>) -> T {
        self.executor
            .execute_to_completion(async move { Ok(fut.await) })
            .unwrap()
    }

    fn runner(&self, vuser_id: u32, failures: Box<dyn FailureInjector>) -> JourneyRunner {
        JourneyRunner::new(
            self.executor.clone(),
            HttpClientInstrumented::new(self.reporter.clone()).unwrap(),
            self.reporter.clone(),
            VirtualUser::with_session(vuser_id, format!("session-{vuser_id}")),
            failures,
        )
    }

    fn runner_with_request_timeout(&self, vuser_id: u32, timeout: Duration) -> JourneyRunner {
        JourneyRunner::new(
            self.executor.clone(),
            HttpClientInstrumented::with_timeout(self.reporter.clone(), timeout).unwrap(),
            self.reporter.clone(),
            VirtualUser::with_session(vuser_id, format!("session-{vuser_id}")),
            Box::new(NoFailures),
        )
    }

    fn delayed_mock_server(&self, step_delay: Duration, summary_delay: Duration) -> MockServer {
        self.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/process"))
                .respond_with(ResponseTemplate::new(200).set_delay(step_delay))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(JOURNEY_COMPLETE_PATH))
                .respond_with(ResponseTemplate::new(200).set_delay(summary_delay))
                .mount(&server)
                .await;
            server
        })
    }

    fn operation(&self, operation_id: &str) -> OperationSummary {
        self.reporter
            .summary()
            .into_iter()
            .find(|s| s.operation_id == operation_id)
            .unwrap_or_else(|| panic!("no {operation_id} operation reported"))
    }

    fn mock_server(&self, step_status: u16) -> MockServer {
        self.block_on(async {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/api/process"))
                .respond_with(ResponseTemplate::new(step_status))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path(JOURNEY_COMPLETE_PATH))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
            server
        })
    }

    fn requests(&self, server: &MockServer) -> Vec<Request> {
        self.block_on(server.received_requests()).unwrap_or_default()
    }
}

fn journey(base_url: &str, waits: &[(&str, u64)]) -> JourneyConfig {
    JourneyConfig {
        company_name: "Next".to_string(),
        base_url: base_url.to_string(),
        test_name: "Next_Performance_Test".to_string(),
        script_name: "Next_Retail_Journey".to_string(),
        request_timeout_s: None,
        error_simulation: ErrorSimulation::disabled(),
        steps: waits
            .iter()
            .map(|(name, wait_s)| {
                StepDefinition::new(
                    name,
                    "/api/process",
                    r#"{"companyName":"{{companyName}}","stepName":"{{stepName}}"}"#,
                    *wait_s,
                )
            })
            .collect(),
    }
}

fn header_value(request: &Request, name: &str) -> String {
    request
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[test]
fn one_result_per_step_in_order() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let config = journey(
        &server.uri(),
        &[
            ("ProductDiscovery", 0),
            ("CartManagement", 0),
            ("CheckoutProcess", 0),
        ],
    );

    let results = harness.runner(1, Box::new(NoFailures)).run(&config);

    let names: Vec<&str> = results.iter().map(|r| r.step_name.as_str()).collect();
    assert_eq!(
        vec!["ProductDiscovery", "CartManagement", "CheckoutProcess"],
        names
    );
    assert!(results.iter().all(|r| r.passed()));
    assert!(results.iter().all(|r| r.status == Some(200)));
    assert_eq!("Step_CartManagement", results[1].transaction_name);
}

#[test]
fn requests_carry_correlation_headers_and_rendered_body() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let config = journey(&server.uri(), &[("ProductDiscovery", 0)]);

    harness.runner(4, Box::new(NoFailures)).run(&config);

    let requests = harness.requests(&server);
    assert_eq!(2, requests.len());

    let step = &requests[0];
    assert_eq!("/api/process", step.url.path());
    assert_eq!(
        "VU=4; Session=session-4; Step=ProductDiscovery; Script=Next_Retail_Journey; Test=Next_Performance_Test",
        header_value(step, CORRELATION_HEADER)
    );
    assert_eq!("Next", header_value(step, COMPANY_HEADER));
    assert_eq!("ProductDiscovery", header_value(step, STEP_HEADER));
    assert_eq!("application/json", header_value(step, "content-type"));
    assert_eq!(
        r#"{"companyName":"Next","stepName":"ProductDiscovery"}"#,
        String::from_utf8_lossy(&step.body)
    );

    let summary = &requests[1];
    assert_eq!(JOURNEY_COMPLETE_PATH, summary.url.path());
    assert_eq!(
        "VU=4; Session=session-4; Step=Journey_Complete; Script=Next_Retail_Journey; Test=Next_Performance_Test",
        header_value(summary, CORRELATION_HEADER)
    );
}

#[test]
fn summary_event_body() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let config = journey(&server.uri(), &[("ProductDiscovery", 0), ("CartManagement", 0)]);

    harness.runner(2, Box::new(NoFailures)).run(&config);

    let requests = harness.requests(&server);
    let summary = requests
        .iter()
        .find(|request| request.url.path() == JOURNEY_COMPLETE_PATH)
        .expect("summary event was not sent");
    let event: JourneyCompleteEvent = serde_json::from_slice(&summary.body).unwrap();

    assert_eq!("JOURNEY_COMPLETE", event.event_type);
    assert_eq!("Next", event.company_name);
    assert_eq!("Next_Performance_Test", event.test_name);
    assert_eq!("Next_Retail_Journey", event.script_name);
    assert_eq!(2, event.vuser_id);
    assert_eq!("session-2", event.session_id);
    assert_eq!(2, event.total_steps);
    assert!(chrono::DateTime::parse_from_rfc3339(&event.timestamp).is_ok());

    let raw: serde_json::Value = serde_json::from_slice(&summary.body).unwrap();
    for key in [
        "eventType",
        "companyName",
        "testName",
        "scriptName",
        "vuserId",
        "sessionId",
        "timestamp",
        "totalSteps",
    ] {
        assert!(raw.get(key).is_some(), "missing {key}");
    }
}

#[test]
fn error_status_fails_step_without_stopping_journey() {
    let harness = Harness::new();
    let server = harness.mock_server(500);
    let config = journey(&server.uri(), &[("ProductDiscovery", 0), ("CartManagement", 0)]);

    let results = harness.runner(1, Box::new(NoFailures)).run(&config);

    assert_eq!(2, results.len());
    for result in &results {
        assert_eq!(StepOutcome::Fail, result.outcome);
        assert_eq!(Some(StepError::Status { status: 500 }), result.error);
    }
}

#[test]
fn transport_failure_is_recorded_and_journey_continues() {
    let harness = Harness::new();
    // Nothing listens on port 1.
    let config = journey("http://127.0.0.1:1", &[("ProductDiscovery", 0), ("CartManagement", 0)]);

    let results = harness.runner(1, Box::new(NoFailures)).run(&config);

    assert_eq!(2, results.len());
    for result in &results {
        assert!(!result.passed());
        assert!(matches!(result.error, Some(StepError::Transport { .. })));
        assert_eq!(None, result.status);
    }

    let summary = harness.reporter.summary();
    let complete = summary
        .iter()
        .find(|s| s.operation_id == "Journey_Complete")
        .unwrap();
    assert_eq!(1, complete.failed);
}

#[test]
fn summary_sent_exactly_once_when_every_step_fails() {
    let harness = Harness::new();
    let server = harness.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/process"))
            .respond_with(ResponseTemplate::new(200))
            .expect(3)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(JOURNEY_COMPLETE_PATH))
            .and(header(CORRELATION_HEADER, "VU=1; Session=session-1; Step=Journey_Complete; Script=Next_Retail_Journey; Test=Next_Performance_Test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        server
    });
    let config = journey(
        &server.uri(),
        &[("ProductDiscovery", 0), ("CartManagement", 0), ("CheckoutProcess", 0)],
    );

    let results = harness
        .runner(1, Box::new(RandomFailures::seeded(1.0, 7)))
        .run(&config);

    assert!(results
        .iter()
        .all(|r| r.error == Some(StepError::Simulated)));
    harness.block_on(server.verify());
}

#[test]
fn disabled_simulation_reflects_transport_outcome_only() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let mut config = journey(&server.uri(), &[("ProductDiscovery", 0), ("CartManagement", 0)]);
    config.error_simulation = ErrorSimulation {
        enabled: false,
        rate: 1.0,
        seed: Some(1),
    };

    let failures = failure_injector(&config.error_simulation, 1);
    let results = harness.runner(1, failures).run(&config);

    assert!(results.iter().all(|r| r.passed() && r.error.is_none()));
}

#[test]
fn seeded_simulation_fails_close_to_configured_rate() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let steps: Vec<(String, u64)> = (0..400).map(|i| (format!("Step{i}"), 0)).collect();
    let steps: Vec<(&str, u64)> = steps.iter().map(|(n, w)| (n.as_str(), *w)).collect();
    let config = journey(&server.uri(), &steps);

    let results = harness
        .runner(1, Box::new(RandomFailures::seeded(0.25, 1234)))
        .run(&config);

    let simulated = results
        .iter()
        .filter(|r| r.error == Some(StepError::Simulated))
        .count();
    let observed = simulated as f64 / results.len() as f64;
    // Standard deviation at p = 0.25 over 400 steps is about 0.022.
    assert!((0.15..=0.35).contains(&observed), "observed {observed}");
    assert!(results
        .iter()
        .all(|r| r.error.is_none() || r.error == Some(StepError::Simulated)));
}

#[test]
fn waits_after_each_step() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let config = journey(&server.uri(), &[("A", 1), ("B", 2)]);

    let started = Instant::now();
    let results = harness.runner(1, Box::new(NoFailures)).run(&config);

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(results[0].duration >= Duration::from_secs(1));
    assert!(results[1].duration >= Duration::from_secs(2));
}

#[test]
fn shutdown_cancels_remaining_steps_but_still_reports() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let config = journey(&server.uri(), &[("A", 0), ("B", 0), ("C", 0)]);
    harness.shutdown_handle.shutdown();

    let results = harness.runner(1, Box::new(RandomFailures::seeded(1.0, 1))).run(&config);

    assert_eq!(3, results.len());
    assert!(results
        .iter()
        .all(|r| r.error == Some(StepError::Cancelled)));

    let requests = harness.requests(&server);
    assert_eq!(1, requests.len());
    assert_eq!(JOURNEY_COMPLETE_PATH, requests[0].url.path());
}

#[test]
fn get_steps_send_no_body() {
    let harness = Harness::new();
    let server = harness.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/track"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(JOURNEY_COMPLETE_PATH))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        server
    });
    let mut config = journey(&server.uri(), &[("DeliveryTracking", 0)]);
    config.steps[0].method = HttpMethod::Get;
    config.steps[0].path = "/api/track".to_string();

    let results = harness.runner(1, Box::new(NoFailures)).run(&config);

    assert!(results[0].passed());
    let requests = harness.requests(&server);
    assert!(requests[0].body.is_empty());
}

#[test]
fn transactions_are_reported_per_step() {
    let harness = Harness::new();
    let server = harness.mock_server(200);
    let config = journey(&server.uri(), &[("ProductDiscovery", 0), ("CartManagement", 0)]);

    let mut runner = harness.runner(1, Box::new(NoFailures));
    runner.run(&config);
    runner.run(&config);

    let operation_ids: Vec<(String, usize)> = harness
        .reporter
        .summary()
        .into_iter()
        .map(|s| (s.operation_id.clone(), s.total()))
        .collect();
    assert_eq!(
        vec![
            ("Journey_Initialization".to_string(), 2),
            ("http_post".to_string(), 6),
            ("Step_ProductDiscovery".to_string(), 2),
            ("Step_CartManagement".to_string(), 2),
            ("Journey_Complete".to_string(), 2),
        ],
        operation_ids
    );
}

#[test]
fn timed_out_request_is_a_transport_failure() {
    let harness = Harness::new();
    let server = harness.delayed_mock_server(Duration::from_secs(3), Duration::ZERO);
    let mut config = journey(&server.uri(), &[("ProductDiscovery", 0)]);
    config.request_timeout_s = Some(1);

    let results = harness
        .runner_with_request_timeout(1, Duration::from_secs(1))
        .run(&config);

    assert_eq!(1, results.len());
    assert!(!results[0].passed());
    assert!(
        matches!(results[0].error, Some(StepError::Transport { .. })),
        "unexpected error {:?}",
        results[0].error
    );
    assert_eq!(None, results[0].status);

    // One failed step request, then the summary event still goes out.
    let http_post = harness.operation("http_post");
    assert_eq!(1, http_post.failed);
    assert_eq!(1, http_post.passed);
    assert_eq!(1, harness.operation("Journey_Complete").passed);
}

#[test]
fn unanswered_summary_event_is_abandoned() {
    let harness = Harness::new();
    let server = harness.delayed_mock_server(Duration::ZERO, Duration::from_secs(30));
    let config = journey(&server.uri(), &[("ProductDiscovery", 0)]);

    let started = Instant::now();
    let results = harness
        .runner(1, Box::new(NoFailures))
        .with_summary_timeout(Duration::from_millis(500))
        .run(&config);

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(results[0].passed());
    assert_eq!(1, harness.operation("Journey_Complete").failed);
}
