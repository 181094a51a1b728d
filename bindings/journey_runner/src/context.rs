use journey_tunnel_runner::prelude::UserValuesConstraint;

use crate::journey::{JourneyRunner, StepResult};

/// Running totals for one virtual user across all of its journeys.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct JourneyTotals {
    pub journeys: usize,
    pub steps_passed: usize,
    pub steps_failed: usize,
}

impl JourneyTotals {
    pub fn record(&mut self, results: &[StepResult]) {
        self.journeys += 1;
        let passed = results.iter().filter(|result| result.passed()).count();
        self.steps_passed += passed;
        self.steps_failed += results.len() - passed;
    }
}

#[derive(Default, Debug)]
pub struct JourneyAgentContext {
    pub runner: Option<JourneyRunner>,
    pub totals: JourneyTotals,
}

impl UserValuesConstraint for JourneyAgentContext {}
