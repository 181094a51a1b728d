use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use journey_tunnel_instruments::{report_outcome, OperationRecord, Reporter};
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, StatusCode, Url};

/// What is kept of a response once its body has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body_len: usize,
}

impl HttpResponse {
    /// Whether the load tool should consider the request failed. Any status of 400 or above is a
    /// failure.
    pub fn is_error(&self) -> bool {
        self.status.is_client_error() || self.status.is_server_error()
    }
}

/// A [reqwest::Client] which records every request it makes as an operation named
/// `http_<method>`, tagged with the request path and the response status.
#[derive(Debug, Clone)]
pub struct HttpClientInstrumented {
    client: Client,
    reporter: Arc<Reporter>,
}

impl HttpClientInstrumented {
    /// Create a client that keeps reqwest's default timeouts.
    pub fn new(reporter: Arc<Reporter>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, reporter })
    }

    /// Create a client where each request, including reading the response body, must complete
    /// within `timeout`.
    pub fn with_timeout(reporter: Arc<Reporter>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, reporter })
    }

    /// Send a single request and read the whole response body.
    ///
    /// No retries are made. A transport failure, including a URL that cannot be parsed, is
    /// returned as an error. An error status is returned as a normal response.
    pub async fn send_json(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<String>,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut operation_record = OperationRecord::new(format!(
            "http_{}",
            method.as_str().to_ascii_lowercase()
        ));
        if let Ok(parsed) = Url::parse(url) {
            operation_record.add_attr("path", parsed.path());
        }

        let result = self.send_inner(method, url, headers, body).await;

        match &result {
            Ok(response) => {
                operation_record.add_attr("status", response.status.as_u16());
                report_outcome(&self.reporter, operation_record, !response.is_error());
            }
            Err(e) => {
                log::debug!("Request to {url} failed: {e}");
                report_outcome(&self.reporter, operation_record, false);
            }
        }

        result
    }

    async fn send_inner(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<String>,
    ) -> Result<HttpResponse, reqwest::Error> {
        let mut request = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        Ok(HttpResponse {
            status,
            body_len: body.len(),
        })
    }
}
