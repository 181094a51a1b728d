use http_journey_runner::prelude::*;

/// Request body for one of the `/api/process` steps, listing the substeps the service simulates.
fn process_body(substeps: &[(&str, u64)]) -> String {
    let substeps = substeps
        .iter()
        .map(|(name, duration)| format!(r#"{{"substepName":"{name}","duration":{duration}}}"#))
        .collect::<Vec<_>>()
        .join(",");

    format!(
        r#"{{"companyName":"{{{{companyName}}}}","stepName":"{{{{stepName}}}}","substeps":[{substeps}]}}"#
    )
}

/// The Next retail journey, used unless `JT_JOURNEY_CONFIG` points at another one.
fn retail_journey() -> JourneyConfig {
    JourneyConfig {
        company_name: "Next".to_string(),
        base_url: "http://localhost:8080".to_string(),
        test_name: "Next_Performance_Test_20251127".to_string(),
        script_name: "BizObs_Next_Retail_Journey".to_string(),
        request_timeout_s: None,
        error_simulation: ErrorSimulation::default(),
        steps: vec![
            StepDefinition::new(
                "ProductDiscovery",
                "/api/process",
                process_body(&[("Browse Categories", 5), ("Search Products", 8)]),
                13,
            ),
            StepDefinition::new(
                "CartManagement",
                "/api/process",
                process_body(&[("Add to Cart", 3), ("Update Quantities", 5)]),
                8,
            ),
            StepDefinition::new(
                "CheckoutProcess",
                "/api/process",
                process_body(&[("Payment Details", 12), ("Delivery Options", 7)]),
                19,
            ),
            StepDefinition::new(
                "OrderConfirmation",
                "/api/process",
                process_body(&[("Process Payment", 8), ("Generate Receipt", 4)]),
                12,
            ),
            StepDefinition::new(
                "FulfillmentProcessing",
                "/api/process",
                process_body(&[("Inventory Check", 6), ("Prepare Order", 15)]),
                21,
            ),
            StepDefinition::new(
                "DeliveryTracking",
                "/api/process",
                process_body(&[("Generate Tracking", 3), ("Send Notifications", 5)]),
                8,
            ),
        ],
    }
}

fn setup(ctx: &mut RunnerContext<JourneyRunnerContext>) -> HookResult {
    configure_journey(ctx, retail_journey())?;
    Ok(())
}

fn agent_setup(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
    configure_virtual_user(ctx)?;
    Ok(())
}

fn agent_behaviour(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
    let results = run_journey(ctx)?;

    for result in results.iter().filter(|result| !result.passed()) {
        if let Some(error) = &result.error {
            log::debug!("{} failed: {}", result.transaction_name, error);
        }
    }

    Ok(())
}

fn agent_teardown(ctx: &mut AgentContext<JourneyRunnerContext, JourneyAgentContext>) -> HookResult {
    report_virtual_user_totals(ctx)?;
    Ok(())
}

fn main() -> JourneyTunnelResult<()> {
    let builder = ScenarioDefinitionBuilder::<JourneyRunnerContext, JourneyAgentContext>::new_with_init(
        env!("CARGO_PKG_NAME"),
    )
    .use_setup(setup)
    .use_agent_setup(agent_setup)
    .use_agent_behaviour(agent_behaviour)
    .use_agent_teardown(agent_teardown);

    run(builder)?;

    Ok(())
}
