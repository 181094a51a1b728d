use std::env;
use std::time::Duration;

use anyhow::{bail, Context};
use http_client_instrumented::prelude::HttpClientInstrumented;
use journey_tunnel_runner::prelude::{
    AgentBailError, AgentContext, JourneyTunnelResult, RunnerContext,
};

use crate::config::JourneyConfig;
use crate::context::JourneyAgentContext;
use crate::failure::failure_injector;
use crate::journey::{JourneyRunner, StepResult};
use crate::runner_context::JourneyRunnerContext;
use crate::trace::VirtualUser;

/// Environment variable pointing at a TOML journey file that replaces the scenario's built-in journey.
pub const JT_JOURNEY_CONFIG_ENV: &str = "JT_JOURNEY_CONFIG";

/// Work out which journey to run.
///
/// If [`JT_JOURNEY_CONFIG_ENV`] is set the journey is loaded from that file, otherwise
/// `default_journey` is used. A connection string from the command line replaces the journey's
/// base URL. The result is validated.
pub fn resolve_journey(
    default_journey: JourneyConfig,
    connection_string: Option<&str>,
) -> JourneyTunnelResult<JourneyConfig> {
    let mut journey = match env::var(JT_JOURNEY_CONFIG_ENV).ok().as_deref() {
        Some("") => {
            bail!("'{JT_JOURNEY_CONFIG_ENV}' set to empty string");
        }
        Some(path) => {
            log::info!("Loading journey from {path}");
            JourneyConfig::from_toml_file(path)?
        }
        None => default_journey,
    };

    if let Some(connection_string) = connection_string {
        journey.base_url = connection_string.to_string();
    }

    journey.validate()?;

    Ok(journey)
}

/// Sets the journey and HTTP client in [JourneyRunnerContext]. Call this from the global setup hook.
///
/// ```rust,no_run
/// use http_journey_runner::prelude::*;
///
/// fn setup(ctx: &mut RunnerContext<JourneyRunnerContext>) -> HookResult {
///     let journey = JourneyConfig::from_toml_file("journey.toml")?;
///     configure_journey(ctx, journey)?;
///     Ok(())
/// }
/// ```
pub fn configure_journey(
    ctx: &mut RunnerContext<JourneyRunnerContext>,
    default_journey: JourneyConfig,
) -> JourneyTunnelResult<()> {
    let journey = resolve_journey(default_journey, ctx.get_connection_string())?;

    let reporter = ctx.reporter();
    let client = match journey.request_timeout_s {
        Some(timeout_s) => {
            HttpClientInstrumented::with_timeout(reporter, Duration::from_secs(timeout_s))?
        }
        None => HttpClientInstrumented::new(reporter)?,
    };

    log::info!(
        "Journey [{}] for {} has {} steps against {}",
        journey.script_name,
        journey.company_name,
        journey.steps.len(),
        journey.base_url
    );
    if journey.error_simulation.enabled {
        log::info!(
            "Simulating errors in {:.1}% of steps",
            journey.error_simulation.rate * 100.0
        );
    }

    ctx.get_mut().configure(journey, client);

    Ok(())
}

/// Gives the virtual user its identity and a [JourneyRunner]. Call this from the agent setup hook.
///
/// Virtual user ids start at 1. Each virtual user gets a new session id.
pub fn configure_virtual_user(
    ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>,
) -> JourneyTunnelResult<()> {
    let journey = ctx.runner_context().get().journey()?;
    let client = ctx.runner_context().get().client()?;

    let vuser_id =
        u32::try_from(ctx.agent_index() + 1).context("Too many virtual users for a u32 id")?;
    let vuser = VirtualUser::new(vuser_id);
    log::debug!(
        "Agent {} is VU {} with session {}",
        ctx.agent_id(),
        vuser.id,
        vuser.session_id
    );

    let runner = JourneyRunner::new(
        ctx.runner_context().executor().clone(),
        client,
        ctx.runner_context().reporter(),
        vuser,
        failure_injector(&journey.error_simulation, vuser_id),
    );
    ctx.get_mut().runner = Some(runner);

    Ok(())
}

/// Run the configured journey once for this virtual user. Call this from the agent behaviour.
pub fn run_journey(
    ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>,
) -> JourneyTunnelResult<Vec<StepResult>> {
    let journey = ctx.runner_context().get().journey()?;

    let Some(runner) = ctx.get_mut().runner.as_mut() else {
        return Err(AgentBailError::new(
            "Virtual user is not configured, call `configure_virtual_user` in the agent setup hook",
        )
        .into());
    };

    let results = runner.run(&journey);
    let vuser_id = runner.vuser().id;

    let passed = results.iter().filter(|result| result.passed()).count();
    log::info!(
        "VU {} finished journey: {}/{} steps passed",
        vuser_id,
        passed,
        results.len()
    );

    ctx.get_mut().totals.record(&results);

    Ok(results)
}

/// Log what this virtual user did over the run. Call this from the agent teardown hook.
pub fn report_virtual_user_totals(
    ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>,
) -> JourneyTunnelResult<()> {
    let totals = ctx.get().totals;
    log::info!(
        "Agent {} ran {} journeys, {} steps passed and {} failed",
        ctx.agent_id(),
        totals.journeys,
        totals.steps_passed,
        totals.steps_failed
    );

    Ok(())
}
