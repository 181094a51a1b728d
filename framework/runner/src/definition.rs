use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;

use crate::cli::{JourneyTunnelScenarioCli, ReporterOpt};
use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};

pub type HookResult = anyhow::Result<()>;

pub type GlobalHookMut<RV> = fn(&mut RunnerContext<RV>) -> HookResult;
pub type GlobalHook<RV> = fn(Arc<RunnerContext<RV>>) -> HookResult;
pub type AgentHookMut<RV, V> = fn(&mut AgentContext<RV, V>) -> HookResult;

const DEFAULT_BEHAVIOUR: &str = "default";

/// The builder for a scenario definition.
///
/// This must be used at the start of a load test to define the scenario that you want to run.
pub struct ScenarioDefinitionBuilder<RV: UserValuesConstraint, V: UserValuesConstraint> {
    /// The name of the scenario, which should be unique within the test suite.
    ///
    /// Recommended value is `env!("CARGO_PKG_NAME")`.
    name: String,
    cli: JourneyTunnelScenarioCli,
    /// Used when the command line does not set a duration.
    default_duration_s: Option<u64>,
    /// Global setup hook for this scenario. It will be run once, before any virtual users are started.
    setup_fn: Option<GlobalHookMut<RV>>,
    /// Setup hook for a virtual user, which will be run once for each virtual user as it starts.
    setup_agent_fn: Option<AgentHookMut<RV, V>>,
    /// The behaviours for this scenario. There are two ways that this can be used:
    /// - Specify a single behaviour for all virtual users using [ScenarioDefinitionBuilder::use_agent_behaviour].
    /// - Specify multiple behaviours using [ScenarioDefinitionBuilder::use_named_agent_behaviour]. You then need to tell the runner how many virtual users should run each behaviour.
    agent_behaviour: HashMap<String, AgentHookMut<RV, V>>,
    /// Teardown hook for a virtual user, run once it has stopped running its behaviour.
    teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    /// Global teardown hook, run once every virtual user has stopped. This is best effort, an
    /// error is logged but does not fail the run.
    teardown_fn: Option<GlobalHook<RV>>,
}

pub struct ScenarioDefinition<RV: UserValuesConstraint, V: UserValuesConstraint> {
    pub(crate) name: String,
    pub(crate) assigned_behaviours: Vec<AssignedBehaviour>,
    pub(crate) duration_s: Option<u64>,
    pub(crate) iterations: Option<usize>,
    pub(crate) connection_string: Option<String>,
    pub(crate) no_progress: bool,
    pub(crate) reporter: ReporterOpt,
    pub(crate) run_id: Option<String>,
    pub(crate) setup_fn: Option<GlobalHookMut<RV>>,
    pub(crate) setup_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) agent_behaviour: HashMap<String, AgentHookMut<RV, V>>,
    pub(crate) teardown_agent_fn: Option<AgentHookMut<RV, V>>,
    pub(crate) teardown_fn: Option<GlobalHook<RV>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AssignedBehaviour {
    pub(crate) behaviour_name: String,
    pub(crate) agent_count: usize,
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinitionBuilder<RV, V> {
    /// Initialise a new scenario definition from the scenario name and command line arguments.
    /// See the [ScenarioDefinitionBuilder::name] for more information about the name.
    pub fn new(name: &str, cli: JourneyTunnelScenarioCli) -> Self {
        Self {
            name: name.to_string(),
            cli,
            default_duration_s: None,
            setup_fn: None,
            setup_agent_fn: None,
            agent_behaviour: HashMap::new(),
            teardown_agent_fn: None,
            teardown_fn: None,
        }
    }

    /// Initialise a scenario definition, parsing the command line and setting up logging.
    pub fn new_with_init(name: &str) -> Self {
        Self::new(name, crate::init::init())
    }

    /// Run for this many seconds unless the command line says otherwise.
    pub fn with_default_duration_s(mut self, duration_s: u64) -> Self {
        self.default_duration_s = Some(duration_s);
        self
    }

    /// Set the global setup hook [ScenarioDefinitionBuilder::setup_fn] for this scenario.
    pub fn use_setup(mut self, setup_fn: GlobalHookMut<RV>) -> Self {
        self.setup_fn = Some(setup_fn);
        self
    }

    /// Set the virtual user setup hook [ScenarioDefinitionBuilder::setup_agent_fn] for this scenario.
    pub fn use_agent_setup(mut self, setup_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.setup_agent_fn = Some(setup_agent_fn);
        self
    }

    /// Set the default behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_agent_behaviour(self, behaviour: AgentHookMut<RV, V>) -> Self {
        self.use_named_agent_behaviour(DEFAULT_BEHAVIOUR, behaviour)
    }

    /// Set a named behaviour hook [ScenarioDefinitionBuilder::agent_behaviour] for this scenario.
    pub fn use_named_agent_behaviour(mut self, name: &str, behaviour: AgentHookMut<RV, V>) -> Self {
        let previous = self.agent_behaviour.insert(name.to_string(), behaviour);

        if previous.is_some() {
            panic!("Behaviour [{}] is already defined", name);
        }

        self
    }

    /// Set the virtual user teardown hook [ScenarioDefinitionBuilder::teardown_agent_fn] for this scenario.
    pub fn use_agent_teardown(mut self, teardown_agent_fn: AgentHookMut<RV, V>) -> Self {
        self.teardown_agent_fn = Some(teardown_agent_fn);
        self
    }

    /// Set the global teardown hook [ScenarioDefinitionBuilder::teardown_fn] for this scenario.
    pub fn use_teardown(mut self, teardown_fn: GlobalHook<RV>) -> Self {
        self.teardown_fn = Some(teardown_fn);
        self
    }

    pub(crate) fn build(self) -> anyhow::Result<ScenarioDefinition<RV, V>> {
        let assigned_behaviours = self.assign_behaviours()?;

        let duration_s = if self.cli.soak {
            None
        } else {
            self.cli.duration.or(self.default_duration_s)
        };

        let iterations = match (self.cli.iterations, duration_s, self.cli.soak) {
            (Some(0), _, _) => bail!("The number of iterations must be at least 1"),
            (Some(iterations), _, _) => Some(iterations),
            (None, None, false) => Some(1),
            (None, _, _) => None,
        };

        Ok(ScenarioDefinition {
            name: self.name,
            assigned_behaviours,
            duration_s,
            iterations,
            connection_string: self.cli.connection_string,
            no_progress: self.cli.no_progress,
            reporter: self.cli.reporter,
            run_id: self.cli.run_id,
            setup_fn: self.setup_fn,
            setup_agent_fn: self.setup_agent_fn,
            agent_behaviour: self.agent_behaviour,
            teardown_agent_fn: self.teardown_agent_fn,
            teardown_fn: self.teardown_fn,
        })
    }

    fn assign_behaviours(&self) -> anyhow::Result<Vec<AssignedBehaviour>> {
        let mut assigned = Vec::new();
        let mut total_assigned = 0;

        for (behaviour_name, agent_count) in &self.cli.behaviour {
            if !self.agent_behaviour.contains_key(behaviour_name) {
                bail!("Behaviour [{}] is not defined by this scenario", behaviour_name);
            }

            total_assigned += agent_count;
            assigned.push(AssignedBehaviour {
                behaviour_name: behaviour_name.clone(),
                agent_count: *agent_count,
            });
        }

        let agents = self.cli.agents.unwrap_or(total_assigned.max(1));
        if total_assigned > agents {
            bail!(
                "Assigned {} virtual users to behaviours but only {} virtual users are configured",
                total_assigned,
                agents
            );
        }

        if agents > total_assigned {
            assigned.push(AssignedBehaviour {
                behaviour_name: DEFAULT_BEHAVIOUR.to_string(),
                agent_count: agents - total_assigned,
            });
        }

        Ok(assigned)
    }
}

impl<RV: UserValuesConstraint, V: UserValuesConstraint> ScenarioDefinition<RV, V> {
    /// One behaviour name per virtual user, in virtual user order.
    pub(crate) fn assigned_behaviours_flat(&self) -> Vec<String> {
        self.assigned_behaviours
            .iter()
            .flat_map(|assigned| {
                std::iter::repeat(assigned.behaviour_name.clone()).take(assigned.agent_count)
            })
            .collect()
    }
}
