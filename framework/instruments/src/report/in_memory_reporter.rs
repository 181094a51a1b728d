mod operations_table;

use crate::report::in_memory_reporter::operations_table::OperationRow;
use crate::report::ReportCollector;
use crate::OperationRecord;
use std::collections::HashMap;
use std::time::Duration;
use tabled::settings::Style;
use tabled::Table;

/// Aggregate figures for every operation reported under one operation id.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationSummary {
    pub operation_id: String,
    pub passed: usize,
    pub failed: usize,
    pub total_duration: Duration,
    /// Fastest passing operation, `None` if every operation failed.
    pub min_pass_duration: Option<Duration>,
    /// Slowest passing operation, `None` if every operation failed.
    pub max_pass_duration: Option<Duration>,
}

impl OperationSummary {
    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    fn avg_duration(&self) -> Duration {
        match u32::try_from(self.total()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(total) => self.total_duration / total,
        }
    }
}

/// Keeps all of the operations in memory and prints a summary of them at the end of the run.
///
/// Operations are listed in the order their id was first seen, which for a journey is the step
/// order.
#[derive(Debug, Default)]
pub struct InMemoryReporter {
    operation_records: Vec<OperationRecord>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn summarize(&self) -> Vec<OperationSummary> {
        let mut index = HashMap::new();
        let mut summaries: Vec<OperationSummary> = Vec::new();

        for record in &self.operation_records {
            let position = *index
                .entry(record.operation_id.clone())
                .or_insert_with(|| {
                    summaries.push(OperationSummary {
                        operation_id: record.operation_id.clone(),
                        passed: 0,
                        failed: 0,
                        total_duration: Duration::ZERO,
                        min_pass_duration: None,
                        max_pass_duration: None,
                    });
                    summaries.len() - 1
                });

            let summary = &mut summaries[position];
            let elapsed = record.elapsed.unwrap_or_default();
            summary.total_duration += elapsed;

            if record.is_error {
                summary.failed += 1;
            } else {
                summary.passed += 1;
                summary.min_pass_duration =
                    Some(summary.min_pass_duration.map_or(elapsed, |min| min.min(elapsed)));
                summary.max_pass_duration =
                    Some(summary.max_pass_duration.map_or(elapsed, |max| max.max(elapsed)));
            }
        }

        summaries
    }

    fn print_summary_of_operations(&self) {
        println!("\nSummary of operations");

        let rows = self
            .summarize()
            .into_iter()
            .map(|summary| OperationRow {
                total_operations: summary.total(),
                passed: summary.passed,
                failed: summary.failed,
                avg_time_ms: as_ms(summary.avg_duration()),
                min_pass_time_ms: summary.min_pass_duration.map(as_ms),
                max_pass_time_ms: summary.max_pass_duration.map(as_ms),
                total_duration_ms: as_ms(summary.total_duration),
                operation_id: summary.operation_id,
            })
            .collect::<Vec<_>>();

        let mut table = Table::new(rows);
        table.with(Style::modern());

        println!("{table}");
    }
}

fn as_ms(duration: Duration) -> f64 {
    duration.as_micros() as f64 / 1000.0
}

impl ReportCollector for InMemoryReporter {
    fn add_operation(&mut self, operation_record: &OperationRecord) {
        self.operation_records.push(operation_record.clone());
    }

    fn summary(&self) -> Vec<OperationSummary> {
        self.summarize()
    }

    fn finalize(&self) {
        self.print_summary_of_operations();
    }
}
