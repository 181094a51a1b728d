use http_journey_runner::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn journey() -> JourneyConfig {
    JourneyConfig {
        company_name: "Next".to_string(),
        // Replaced by the connection string.
        base_url: "http://localhost:8080".to_string(),
        test_name: "Next_Performance_Test".to_string(),
        script_name: "Next_Retail_Journey".to_string(),
        request_timeout_s: Some(10),
        error_simulation: ErrorSimulation::disabled(),
        steps: vec![
            StepDefinition::new("ProductDiscovery", "/api/process", "{}", 0),
            StepDefinition::new("CartManagement", "/api/process", "{}", 0),
        ],
    }
}

fn setup(ctx: &mut RunnerContext<JourneyRunnerContext>) -> HookResult {
    configure_journey(ctx, journey())?;
    Ok(())
}

fn agent_setup(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
    configure_virtual_user(ctx)?;
    Ok(())
}

fn agent_behaviour(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
    let results = run_journey(ctx)?;
    assert_eq!(2, results.len());
    Ok(())
}

fn agent_teardown(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
    let totals = ctx.get().totals;
    assert_eq!(
        JourneyTotals {
            journeys: 2,
            steps_passed: 4,
            steps_failed: 0,
        },
        totals
    );
    report_virtual_user_totals(ctx)
}

fn cli(connection_string: String) -> JourneyTunnelScenarioCli {
    JourneyTunnelScenarioCli {
        connection_string: Some(connection_string),
        agents: Some(3),
        behaviour: vec![],
        duration: None,
        soak: false,
        iterations: Some(2),
        no_progress: true,
        reporter: ReporterOpt::InMemory,
        run_id: Some("scenario-run-test".to_string()),
    }
}

#[test]
fn every_virtual_user_runs_its_journeys() {
    std::env::remove_var(JT_JOURNEY_CONFIG_ENV);

    let server_runtime = tokio::runtime::Runtime::new().unwrap();
    let server = server_runtime.block_on(async {
        let server = MockServer::start().await;
        // 3 virtual users x 2 journeys x 2 steps
        Mock::given(method("POST"))
            .and(path("/api/process"))
            .respond_with(ResponseTemplate::new(200))
            .expect(12)
            .mount(&server)
            .await;
        // 3 virtual users x 2 journeys
        Mock::given(method("POST"))
            .and(path(JOURNEY_COMPLETE_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(6)
            .mount(&server)
            .await;
        server
    });

    let scenario = ScenarioDefinitionBuilder::<JourneyRunnerContext, JourneyAgentContext>::new(
        "every_virtual_user_runs_its_journeys",
        cli(server.uri()),
    )
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour)
    .use_agent_teardown(agent_teardown);

    let completed = run(scenario).unwrap();

    assert_eq!(3, completed);
    server_runtime.block_on(server.verify());
}

#[test]
fn behaviour_without_agent_setup_bails() {
    fn behaviour(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
        run_journey(ctx)?;
        Ok(())
    }

    let scenario = ScenarioDefinitionBuilder::<JourneyRunnerContext, JourneyAgentContext>::new(
        "behaviour_without_agent_setup_bails",
        cli("http://127.0.0.1:1".to_string()),
    )
    .use_setup(setup)
    .use_agent_behaviour(behaviour);

    let completed = run(scenario).unwrap();

    assert_eq!(0, completed);
}

#[test]
fn invalid_connection_string_fails_setup() {
    let scenario = ScenarioDefinitionBuilder::<JourneyRunnerContext, JourneyAgentContext>::new(
        "invalid_connection_string_fails_setup",
        cli("not a url".to_string()),
    )
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour);

    assert!(run(scenario).is_err());
}
