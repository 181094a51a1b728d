mod common;
mod config;
mod context;
mod failure;
mod journey;
mod runner_context;
mod trace;

pub mod prelude {
    /// Hook helpers for journey scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::config::{ConfigError, ErrorSimulation, HttpMethod, JourneyConfig, StepDefinition};
    pub use crate::context::{JourneyAgentContext, JourneyTotals};
    pub use crate::failure::{failure_injector, FailureInjector, NoFailures, RandomFailures};
    pub use crate::journey::{
        JourneyCompleteEvent, JourneyRunner, StepError, StepOutcome, StepResult,
        JOURNEY_COMPLETE_PATH, SUMMARY_TIMEOUT,
    };
    pub use crate::runner_context::JourneyRunnerContext;
    pub use crate::trace::{
        TraceContext, VirtualUser, COMPANY_HEADER, CORRELATION_HEADER, STEP_HEADER,
    };

    /// Re-export of the `journey_tunnel_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use journey_tunnel_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use http_client_instrumented::prelude::*;
}
