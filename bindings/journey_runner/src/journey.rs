use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::SecondsFormat;
use http_client_instrumented::prelude::{
    HeaderMap, HeaderName, HeaderValue, HttpClientInstrumented, HttpResponse, Method, CONTENT_TYPE,
};
use journey_tunnel_runner::prelude::{
    report_outcome, Executor, OperationRecord, Reporter, ShutdownSignalError,
};
use serde::{Deserialize, Serialize};

use crate::config::{JourneyConfig, StepDefinition};
use crate::failure::FailureInjector;
use crate::trace::{TraceContext, VirtualUser, COMPANY_HEADER, CORRELATION_HEADER, STEP_HEADER};

/// Where the summary event is sent once a journey finishes.
pub const JOURNEY_COMPLETE_PATH: &str = "/api/journey-complete";

const INITIALIZATION_TRANSACTION: &str = "Journey_Initialization";
const COMPLETE_TRANSACTION: &str = "Journey_Complete";
const JOURNEY_COMPLETE_EVENT_TYPE: &str = "JOURNEY_COMPLETE";

/// Upper bound on sending the summary event. The send is not interrupted by shutdown, so it needs
/// its own limit for when the journey sets no request timeout.
pub const SUMMARY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Pass,
    Fail,
}

/// Why a step failed.
#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
pub enum StepError {
    /// The request never got a response, for example the connection was refused or timed out.
    #[display("transport error: {reason}")]
    Transport { reason: String },
    /// The service answered with a status of 400 or above.
    #[display("service responded with status {status}")]
    Status { status: u16 },
    /// Failed on purpose by the [FailureInjector].
    #[display("simulated error")]
    Simulated,
    /// The run was shut down before the step finished.
    #[display("cancelled by shutdown")]
    Cancelled,
    /// The request could not be built from the configuration.
    #[display("invalid request: {reason}")]
    InvalidRequest { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    pub step_name: String,
    pub transaction_name: String,
    pub outcome: StepOutcome,
    /// Wall-clock time for the request and the wait that follows it.
    pub duration: Duration,
    /// Response status, if a response was received.
    pub status: Option<u16>,
    pub error: Option<StepError>,
}

impl StepResult {
    pub fn passed(&self) -> bool {
        self.outcome == StepOutcome::Pass
    }

    fn cancelled(step: &StepDefinition) -> Self {
        Self {
            step_name: step.name.clone(),
            transaction_name: step.transaction_name(),
            outcome: StepOutcome::Fail,
            duration: Duration::ZERO,
            status: None,
            error: Some(StepError::Cancelled),
        }
    }
}

/// Body of the event sent to [JOURNEY_COMPLETE_PATH] at the end of every journey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyCompleteEvent {
    pub event_type: String,
    pub company_name: String,
    pub test_name: String,
    pub script_name: String,
    pub vuser_id: u32,
    pub session_id: String,
    /// RFC 3339 UTC time at which the event was sent.
    pub timestamp: String,
    pub total_steps: usize,
}

impl JourneyCompleteEvent {
    pub fn new(config: &JourneyConfig, vuser: &VirtualUser) -> Self {
        Self {
            event_type: JOURNEY_COMPLETE_EVENT_TYPE.to_string(),
            company_name: config.company_name.clone(),
            test_name: config.test_name.clone(),
            script_name: config.script_name.clone(),
            vuser_id: vuser.id,
            session_id: vuser.session_id.clone(),
            timestamp: chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            total_steps: config.steps.len(),
        }
    }
}

/// Runs a journey, one step at a time, on behalf of a single virtual user.
#[derive(Debug)]
pub struct JourneyRunner {
    executor: Arc<Executor>,
    client: HttpClientInstrumented,
    reporter: Arc<Reporter>,
    vuser: VirtualUser,
    failures: Box<dyn FailureInjector>,
    summary_timeout: Duration,
}

impl JourneyRunner {
    pub fn new(
        executor: Arc<Executor>,
        client: HttpClientInstrumented,
        reporter: Arc<Reporter>,
        vuser: VirtualUser,
        failures: Box<dyn FailureInjector>,
    ) -> Self {
        Self {
            executor,
            client,
            reporter,
            vuser,
            failures,
            summary_timeout: SUMMARY_TIMEOUT,
        }
    }

    /// Replace [SUMMARY_TIMEOUT] for this runner.
    pub fn with_summary_timeout(mut self, summary_timeout: Duration) -> Self {
        self.summary_timeout = summary_timeout;
        self
    }

    pub fn vuser(&self) -> &VirtualUser {
        &self.vuser
    }

    /// Run every step of the journey in order, then send the summary event.
    ///
    /// Always returns one result per configured step, in the configured order. A failed step
    /// does not stop the journey. If the run is shut down part way through, the in-flight step
    /// and every step after it are reported as [StepError::Cancelled].
    pub fn run(&mut self, config: &JourneyConfig) -> Vec<StepResult> {
        self.initialize(config);

        let mut results = Vec::with_capacity(config.steps.len());
        let mut cancelled = false;
        for step in &config.steps {
            let result = if cancelled {
                let result = StepResult::cancelled(step);
                let mut transaction = OperationRecord::new(&result.transaction_name);
                transaction.add_attr("vuser_id", self.vuser.id);
                report_outcome(&self.reporter, transaction, false);
                result
            } else {
                self.run_step(config, step)
            };

            cancelled |= result.error == Some(StepError::Cancelled);
            results.push(result);
        }

        self.send_summary(config);

        results
    }

    fn initialize(&self, config: &JourneyConfig) {
        let mut transaction = OperationRecord::new(INITIALIZATION_TRANSACTION);
        transaction.add_attr("vuser_id", self.vuser.id);

        let trace = TraceContext::new(&self.vuser, "Journey_Start", config);
        log::debug!("Starting journey: {}", trace);

        report_outcome(&self.reporter, transaction, true);
    }

    fn run_step(&mut self, config: &JourneyConfig, step: &StepDefinition) -> StepResult {
        let started = Instant::now();
        let mut transaction = OperationRecord::new(step.transaction_name());
        transaction.add_attr("vuser_id", self.vuser.id);

        let trace = TraceContext::new(&self.vuser, &step.name, config);
        let sent = match self.request_headers(config, &trace, Some(&step.name)) {
            Ok(headers) => {
                let body = step
                    .method
                    .has_body()
                    .then(|| step.render_body(&trace, &config.company_name));
                let url = config.url_for(&step.path);
                let client = self.client.clone();
                let method = Method::from(step.method);
                let wait = step.wait();

                self.executor.execute_in_place(async move {
                    let response = client
                        .send_json(method, &url, headers, body)
                        .await
                        .map_err(|e| StepError::Transport {
                            reason: format!("{:#}", anyhow::Error::new(e)),
                        });
                    tokio::time::sleep(wait).await;
                    Ok(response)
                })
            }
            Err(e) => Ok(Err(e)),
        };

        let (status, mut error) = match sent {
            Ok(Ok(response)) => response_status(response),
            Ok(Err(e)) => (None, Some(e)),
            Err(e) if e.is::<ShutdownSignalError>() => (None, Some(StepError::Cancelled)),
            Err(e) => (
                None,
                Some(StepError::Transport {
                    reason: e.to_string(),
                }),
            ),
        };

        if error != Some(StepError::Cancelled) && self.failures.should_fail() {
            log::error!("Simulated error in step: {}", step.name);
            error = Some(StepError::Simulated);
        }

        if let Some(error) = &error {
            if *error != StepError::Simulated {
                log::warn!("Step {} failed for VU {}: {}", step.name, self.vuser.id, error);
            }
        }

        let outcome = if error.is_none() {
            StepOutcome::Pass
        } else {
            StepOutcome::Fail
        };
        report_outcome(&self.reporter, transaction, outcome == StepOutcome::Pass);

        StepResult {
            step_name: step.name.clone(),
            transaction_name: step.transaction_name(),
            outcome,
            duration: started.elapsed(),
            status,
            error,
        }
    }

    /// Send the summary event. Runs even if the run is shutting down so that every journey that
    /// started is reported as complete exactly once. Gives up after the summary timeout.
    fn send_summary(&self, config: &JourneyConfig) {
        let transaction = OperationRecord::new(COMPLETE_TRANSACTION);
        let trace = TraceContext::new(&self.vuser, COMPLETE_TRANSACTION, config);
        let event = JourneyCompleteEvent::new(config, &self.vuser);

        let sent = self
            .request_headers(config, &trace, None)
            .map_err(anyhow::Error::new)
            .and_then(|headers| {
                let body = serde_json::to_string(&event)?;
                let url = config.url_for(JOURNEY_COMPLETE_PATH);
                let client = self.client.clone();
                let summary_timeout = self.summary_timeout;

                self.executor.execute_to_completion(async move {
                    tokio::time::timeout(
                        summary_timeout,
                        client.send_json(Method::POST, &url, headers, Some(body)),
                    )
                    .await
                    .map_err(|_| {
                        anyhow::anyhow!("No response within {}ms", summary_timeout.as_millis())
                    })?
                    .map_err(anyhow::Error::new)
                })
            });

        let passed = match sent {
            Ok(response) if !response.is_error() => true,
            Ok(response) => {
                log::warn!(
                    "Journey summary for VU {} rejected with status {}",
                    self.vuser.id,
                    response.status
                );
                false
            }
            Err(e) => {
                log::warn!("Failed to send journey summary for VU {}: {:?}", self.vuser.id, e);
                false
            }
        };

        report_outcome(&self.reporter, transaction, passed);
    }

    fn request_headers(
        &self,
        config: &JourneyConfig,
        trace: &TraceContext,
        step_name: Option<&str>,
    ) -> Result<HeaderMap, StepError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        insert_header(&mut headers, CORRELATION_HEADER, &trace.header_value())?;
        insert_header(&mut headers, COMPANY_HEADER, &config.company_name)?;
        if let Some(step_name) = step_name {
            insert_header(&mut headers, STEP_HEADER, step_name)?;
        }
        Ok(headers)
    }
}

fn response_status(response: HttpResponse) -> (Option<u16>, Option<StepError>) {
    let status = response.status.as_u16();
    let error = response.is_error().then_some(StepError::Status { status });
    (Some(status), error)
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) -> Result<(), StepError> {
    let invalid = |e: &dyn std::fmt::Display| StepError::InvalidRequest {
        reason: format!("{name}: {e}"),
    };
    let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| invalid(&e))?;
    let header_value = HeaderValue::from_str(value).map_err(|e| invalid(&e))?;
    headers.insert(header_name, header_value);
    Ok(())
}
