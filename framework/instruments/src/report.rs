mod in_memory_reporter;

use crate::OperationRecord;
use parking_lot::Mutex;

pub use in_memory_reporter::{InMemoryReporter, OperationSummary};

pub trait ReportCollector {
    fn add_operation(&mut self, operation_record: &OperationRecord);

    /// Aggregated view of the operations seen so far, if this collector keeps one.
    fn summary(&self) -> Vec<OperationSummary> {
        Vec::new()
    }

    fn finalize(&self);
}

/// Discards everything. Useful when the output of a run is not interesting, such as in tests.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ReportCollector for NoopReporter {
    fn add_operation(&mut self, _operation_record: &OperationRecord) {}

    fn finalize(&self) {}
}

#[derive(Debug, Default)]
pub struct ReportConfig {
    enable_in_memory: bool,
}

impl ReportConfig {
    pub fn enable_in_memory(mut self) -> Self {
        self.enable_in_memory = true;
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>> = Vec::new();

        if self.enable_in_memory {
            collectors.push(Mutex::new(Box::new(InMemoryReporter::new())));
        }

        if collectors.is_empty() {
            log::debug!("No report collectors enabled, operations will be discarded");
            collectors.push(Mutex::new(Box::new(NoopReporter)));
        }

        Reporter { collectors }
    }
}

/// Shared by every virtual user. Each collector sits behind its own lock so that recording an
/// operation only blocks other virtual users for as long as the push takes.
pub struct Reporter {
    collectors: Vec<Mutex<Box<dyn ReportCollector + Send>>>,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("collectors", &self.collectors.len())
            .finish()
    }
}

impl Reporter {
    pub fn add_operation(&self, operation_record: &OperationRecord) {
        for collector in &self.collectors {
            collector.lock().add_operation(operation_record);
        }
    }

    pub fn summary(&self) -> Vec<OperationSummary> {
        self.collectors
            .iter()
            .flat_map(|collector| collector.lock().summary())
            .collect()
    }

    pub fn finalize(&self) {
        for collector in &self.collectors {
            collector.lock().finalize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report_outcome;

    #[test]
    fn noop_reporter_keeps_nothing() {
        let reporter = ReportConfig::default().init();
        report_outcome(&reporter, OperationRecord::new("Step_Cart"), true);

        assert!(reporter.summary().is_empty());
        reporter.finalize();
    }
}
