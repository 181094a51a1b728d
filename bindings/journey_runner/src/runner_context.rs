use std::sync::Arc;

use anyhow::Context;
use http_client_instrumented::prelude::HttpClientInstrumented;
use journey_tunnel_runner::prelude::UserValuesConstraint;

use crate::config::JourneyConfig;

/// Shared, read-only state for every virtual user, filled in by [crate::common::configure_journey].
#[derive(Default, Debug)]
pub struct JourneyRunnerContext {
    journey: Option<Arc<JourneyConfig>>,
    client: Option<HttpClientInstrumented>,
}

impl UserValuesConstraint for JourneyRunnerContext {}

impl JourneyRunnerContext {
    pub(crate) fn configure(&mut self, journey: JourneyConfig, client: HttpClientInstrumented) {
        self.journey = Some(Arc::new(journey));
        self.client = Some(client);
    }

    pub fn journey(&self) -> anyhow::Result<Arc<JourneyConfig>> {
        self.journey
            .clone()
            .context("Journey is not configured, call `configure_journey` in the setup hook")
    }

    pub fn client(&self) -> anyhow::Result<HttpClientInstrumented> {
        self.client
            .clone()
            .context("HTTP client is not configured, call `configure_journey` in the setup hook")
    }
}
