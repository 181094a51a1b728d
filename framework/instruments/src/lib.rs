mod report;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use report::{
    InMemoryReporter, NoopReporter, OperationSummary, ReportCollector, ReportConfig, Reporter,
};

/// A single timed unit of work, either a raw request made by an instrumented client or a named
/// transaction wrapping one journey step.
#[derive(Debug, Clone)]
pub struct OperationRecord {
    pub(crate) operation_id: String,
    started: Instant,
    pub(crate) elapsed: Option<Duration>,
    pub(crate) is_error: bool,
    pub(crate) attr: BTreeMap<String, String>,
}

impl OperationRecord {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            started: Instant::now(),
            elapsed: None,
            is_error: false,
            attr: BTreeMap::new(),
        }
    }

    pub fn add_attr(&mut self, key: impl Into<String>, value: impl ToString) {
        self.attr.insert(key.into(), value.to_string());
    }

    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// How long the operation took. Only set once the operation has been reported.
    pub fn duration(&self) -> Option<Duration> {
        self.elapsed
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attr.get(key).map(String::as_str)
    }

    fn finish(&mut self, is_error: bool) {
        self.elapsed = Some(self.started.elapsed());
        self.is_error = is_error;
    }
}

/// Stop the clock on `operation_record` and report it, treating an `Err` response as a failure.
pub fn report_operation<T, E>(
    reporter: &Reporter,
    operation_record: OperationRecord,
    response: &Result<T, E>,
) {
    report_outcome(reporter, operation_record, response.is_ok());
}

/// Stop the clock on `operation_record` and report it with an explicit pass/fail outcome.
///
/// Returns the elapsed time that was recorded.
pub fn report_outcome(
    reporter: &Reporter,
    mut operation_record: OperationRecord,
    passed: bool,
) -> Duration {
    operation_record.finish(!passed);
    let elapsed = operation_record.elapsed.unwrap_or_default();

    log::trace!(
        "Operation {} took {}ms, failed? {}",
        operation_record.operation_id,
        elapsed.as_millis(),
        operation_record.is_error,
    );

    reporter.add_operation(&operation_record);
    elapsed
}
