use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use journey_tunnel_core::prelude::AgentBailError;
use journey_tunnel_instruments::ReportConfig;

use crate::cli::ReporterOpt;
use crate::monitor::start_monitor;
use crate::progress::{start_progress, ProgressTarget};
use crate::{
    context::{AgentContext, RunnerContext, UserValuesConstraint},
    definition::ScenarioDefinitionBuilder,
    executor::Executor,
    shutdown::{start_shutdown_listener, ShutdownSignalError},
};

/// Run a scenario to completion.
///
/// Returns the number of virtual users that finished without bailing.
pub fn run<RV: UserValuesConstraint, V: UserValuesConstraint>(
    definition: ScenarioDefinitionBuilder<RV, V>,
) -> anyhow::Result<usize> {
    let definition = definition.build()?;
    let run_id = definition
        .run_id
        .clone()
        .unwrap_or_else(|| nanoid::nanoid!());
    let started_at = chrono::Utc::now();

    log::info!("Running scenario: {} (run id {})", definition.name, run_id);

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = start_shutdown_listener(&runtime)?;
    let executor = Arc::new(Executor::new(runtime, shutdown_handle.clone()));
    let report_config = match definition.reporter {
        ReporterOpt::InMemory => ReportConfig::default().enable_in_memory(),
        ReporterOpt::Noop => ReportConfig::default(),
    };
    let reporter = Arc::new(report_config.init());
    let mut runner_context = RunnerContext::new(
        executor,
        reporter,
        shutdown_handle.clone(),
        definition.connection_string.clone(),
        run_id.clone(),
    );

    if let Some(setup_fn) = &definition.setup_fn {
        setup_fn(&mut runner_context)?;
    }

    let assigned_behaviours = definition.assigned_behaviours_flat();
    let completed_iterations = Arc::new(AtomicUsize::new(0));

    if let Some(duration) = definition.duration_s {
        // Set a timer to shut down the test after the duration has elapsed
        let shutdown_handle = shutdown_handle.clone();
        runner_context.executor().spawn(async move {
            tokio::time::sleep(Duration::from_secs(duration)).await;
            shutdown_handle.shutdown();
        });
    }

    if !definition.no_progress {
        let target = match (definition.duration_s, definition.iterations) {
            (Some(duration), _) => Some(ProgressTarget::Duration(Duration::from_secs(duration))),
            (None, Some(iterations)) => Some(ProgressTarget::Iterations {
                total: iterations * assigned_behaviours.len(),
                completed: completed_iterations.clone(),
            }),
            (None, None) => None,
        };

        if let Some(target) = target {
            start_progress(target, shutdown_handle.new_listener());
        }
    }

    let runner_context = Arc::new(runner_context);

    // Ready to start spawning virtual users so start the resource monitor to report high usage
    // which might lead to misleading response times.
    start_monitor(shutdown_handle.new_listener());

    let mut handles = Vec::new();
    for (agent_index, assigned_behaviour) in assigned_behaviours.iter().enumerate() {
        let runner_context = runner_context.clone();

        let setup_agent_fn = definition.setup_agent_fn;
        let agent_behaviour_fn = definition
            .agent_behaviour
            .get(assigned_behaviour)
            .cloned();
        let teardown_agent_fn = definition.teardown_agent_fn;
        let iterations = definition.iterations;
        let completed_iterations = completed_iterations.clone();

        // For us to check if the virtual user should shut down between behaviour runs
        let mut cycle_shutdown_receiver = shutdown_handle.new_listener();
        // For the behaviour implementation to listen for shutdown and respond appropriately
        let delegated_shutdown_listener = shutdown_handle.new_listener();

        let agent_id = format!("agent-{}", agent_index);

        let handle = std::thread::Builder::new()
            .name(agent_id.clone())
            .spawn(move || {
                let mut context =
                    AgentContext::new(agent_index, runner_context, delegated_shutdown_listener);
                if let Some(setup_agent_fn) = setup_agent_fn {
                    if let Err(e) = setup_agent_fn(&mut context) {
                        log::error!("Agent setup failed for agent {}: {:?}", agent_id, e);
                        return false;
                    }
                }

                let mut bailed = false;
                if let Some(behaviour) = agent_behaviour_fn {
                    let mut runs = 0;
                    loop {
                        if cycle_shutdown_receiver.should_shutdown() {
                            log::debug!("Stopping agent {}", agent_id);
                            break;
                        }

                        if iterations.is_some_and(|iterations| runs >= iterations) {
                            log::debug!("Agent {} completed {} iterations", agent_id, runs);
                            break;
                        }

                        match behaviour(&mut context) {
                            Ok(()) => {}
                            Err(e) if e.is::<ShutdownSignalError>() => {
                                // Expected if the agent is being shutdown, the check at the top
                                // of the loop will catch this and break out.
                            }
                            Err(e) if e.is::<AgentBailError>() => {
                                log::warn!("Agent {} is bailing: {}", agent_id, e);
                                bailed = true;
                                break;
                            }
                            Err(e) => {
                                log::error!("Agent behaviour failed: {:?}", e);
                            }
                        }

                        runs += 1;
                        completed_iterations.fetch_add(1, Ordering::Relaxed);
                    }
                }

                if let Some(teardown_agent_fn) = teardown_agent_fn {
                    if let Err(e) = teardown_agent_fn(&mut context) {
                        log::error!("Agent teardown failed for agent {}: {:?}", agent_id, e);
                    }
                }

                !bailed
            })
            .context("Failed to spawn thread for virtual user")?;
        handles.push(handle);
    }

    let mut completed_agents = 0;
    for handle in handles {
        let completed = handle
            .join()
            .map_err(|e| anyhow::anyhow!("Error joining thread for virtual user: {:?}", e))?;
        if completed {
            completed_agents += 1;
        }
    }

    if let Some(teardown_fn) = definition.teardown_fn {
        // Don't crash the runner if the teardown fails. We still want the reporting and runner
        // shutdown to happen cleanly.
        if let Err(e) = teardown_fn(runner_context.clone()) {
            log::error!("Teardown failed: {:?}", e);
        }
    }

    // Stops the progress bar and resource monitor.
    shutdown_handle.shutdown();

    runner_context.reporter().finalize();

    let elapsed = chrono::Utc::now() - started_at;
    log::info!(
        "Run {} finished after {}s with {} of {} virtual users completing",
        run_id,
        elapsed.num_seconds(),
        completed_agents,
        assigned_behaviours.len()
    );

    Ok(completed_agents)
}
