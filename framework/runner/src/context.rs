use std::{fmt::Debug, sync::Arc};

use journey_tunnel_instruments::Reporter;

use crate::executor::Executor;
use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle};

pub trait UserValuesConstraint: Default + Debug + Send + Sync + 'static {}

/// State shared by every virtual user in a run. It can only be modified by the global setup hook,
/// after that it is read-only.
#[derive(Debug)]
pub struct RunnerContext<RV: UserValuesConstraint> {
    executor: Arc<Executor>,
    reporter: Arc<Reporter>,
    shutdown_handle: ShutdownHandle,
    connection_string: Option<String>,
    run_id: String,
    value: RV,
}

impl<RV: UserValuesConstraint> RunnerContext<RV> {
    pub(crate) fn new(
        executor: Arc<Executor>,
        reporter: Arc<Reporter>,
        shutdown_handle: ShutdownHandle,
        connection_string: Option<String>,
        run_id: String,
    ) -> Self {
        Self {
            executor,
            reporter,
            shutdown_handle,
            connection_string,
            run_id,
            value: Default::default(),
        }
    }

    pub fn executor(&self) -> &Arc<Executor> {
        &self.executor
    }

    pub fn reporter(&self) -> Arc<Reporter> {
        self.reporter.clone()
    }

    /// The connection string given on the command line, if any.
    pub fn get_connection_string(&self) -> Option<&str> {
        self.connection_string.as_deref()
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Stop every virtual user at the end of its current behaviour run.
    pub fn force_stop_scenario(&self) {
        self.shutdown_handle.shutdown();
    }

    pub fn get_mut(&mut self) -> &mut RV {
        &mut self.value
    }

    pub fn get(&self) -> &RV {
        &self.value
    }
}

/// State owned by a single virtual user.
pub struct AgentContext<RV: UserValuesConstraint, V: UserValuesConstraint> {
    agent_index: usize,
    agent_id: String,
    runner_context: Arc<RunnerContext<RV>>,
    shutdown_listener: DelegatedShutdownListener,
    value: V,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> AgentContext<RV, V> {
    pub(crate) fn new(
        agent_index: usize,
        runner_context: Arc<RunnerContext<RV>>,
        shutdown_listener: DelegatedShutdownListener,
    ) -> Self {
        Self {
            agent_index,
            agent_id: format!("agent-{agent_index}"),
            runner_context,
            shutdown_listener,
            value: Default::default(),
        }
    }

    /// Zero based position of this virtual user within the run.
    pub fn agent_index(&self) -> usize {
        self.agent_index
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn runner_context(&self) -> &Arc<RunnerContext<RV>> {
        &self.runner_context
    }

    pub fn shutdown_listener(&mut self) -> &mut DelegatedShutdownListener {
        &mut self.shutdown_listener
    }

    pub fn get_mut(&mut self) -> &mut V {
        &mut self.value
    }

    pub fn get(&self) -> &V {
        &self.value
    }
}
