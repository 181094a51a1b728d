mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod types;

pub mod prelude {
    pub use crate::cli::{JourneyTunnelScenarioCli, ReporterOpt};
    pub use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::types::JourneyTunnelResult;

    pub use journey_tunnel_core::prelude::{
        AgentBailError, DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError,
    };
    pub use journey_tunnel_instruments::{
        report_operation, report_outcome, OperationRecord, OperationSummary, ReportConfig,
        Reporter,
    };
}
