use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use http_client_instrumented::prelude::{HeaderValue, Method};
use serde::{Deserialize, Serialize};

use crate::trace::TraceContext;

/// Rate of simulated failures used when a journey file doesn't set one.
pub const DEFAULT_ERROR_RATE: f64 = 0.05;

/// Everything a virtual user needs to run one journey.
///
/// Usually loaded from TOML:
///
/// ```toml
/// company_name = "Next"
/// base_url = "http://localhost:8080"
/// test_name = "Next_Performance_Test"
/// script_name = "Next_Retail_Journey"
///
/// [error_simulation]
/// rate = 0.05
///
/// [[steps]]
/// name = "ProductDiscovery"
/// path = "/api/process"
/// wait_s = 13
/// body = '{"companyName":"{{companyName}}","stepName":"{{stepName}}"}'
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyConfig {
    pub company_name: String,
    pub base_url: String,
    /// Load test name, reported as `Test` in the correlation header.
    pub test_name: String,
    /// Load script name, reported as `Script` in the correlation header.
    pub script_name: String,
    /// Per request timeout. The HTTP client's default applies when not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_s: Option<u64>,
    #[serde(default)]
    pub error_simulation: ErrorSimulation,
    pub steps: Vec<StepDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorSimulation {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Probability in `[0.0, 1.0]` that a step is failed on purpose.
    #[serde(default = "default_error_rate")]
    pub rate: f64,
    /// Makes the injected failures repeatable. Each virtual user derives its own seed from this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl Default for ErrorSimulation {
    fn default() -> Self {
        Self {
            enabled: true,
            rate: DEFAULT_ERROR_RATE,
            seed: None,
        }
    }
}

impl ErrorSimulation {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_error_rate() -> f64 {
    DEFAULT_ERROR_RATE
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    #[default]
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl From<HttpMethod> for Method {
    fn from(value: HttpMethod) -> Self {
        match value {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    pub name: String,
    #[serde(default)]
    pub method: HttpMethod,
    /// Appended to the base URL, must start with `/`.
    pub path: String,
    /// Request body template, see [StepDefinition::render_body].
    #[serde(default)]
    pub body: String,
    /// Think time after the response, in seconds.
    #[serde(default)]
    pub wait_s: u64,
}

impl StepDefinition {
    pub fn new(name: &str, path: &str, body: impl Into<String>, wait_s: u64) -> Self {
        Self {
            name: name.to_string(),
            method: HttpMethod::Post,
            path: path.to_string(),
            body: body.into(),
            wait_s,
        }
    }

    /// The name this step is reported under.
    pub fn transaction_name(&self) -> String {
        format!("Step_{}", self.name)
    }

    pub fn wait(&self) -> Duration {
        Duration::from_secs(self.wait_s)
    }

    /// Fill in the body template for one request.
    ///
    /// Supported placeholders are `{{companyName}}`, `{{stepName}}`, `{{vuserId}}`,
    /// `{{sessionId}}`, `{{scriptName}}` and `{{testName}}`. Anything else is left as it is.
    ///
    /// Placeholders are expected inside JSON strings, so each value is JSON-escaped before it is
    /// substituted.
    pub fn render_body(&self, trace: &TraceContext, company_name: &str) -> String {
        let vuser_id = trace.vuser_id.to_string();
        [
            ("{{companyName}}", company_name),
            ("{{stepName}}", trace.step_name.as_str()),
            ("{{vuserId}}", vuser_id.as_str()),
            ("{{sessionId}}", trace.session_id.as_str()),
            ("{{scriptName}}", trace.script_name.as_str()),
            ("{{testName}}", trace.test_name.as_str()),
        ]
        .iter()
        .fold(self.body.clone(), |body, (placeholder, value)| {
            body.replace(placeholder, &json_string_content(value))
        })
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ConfigError {
    #[display("base URL [{base_url}] is not a valid http(s) URL: {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },
    #[display("journey has no steps")]
    NoSteps,
    #[display("step {index} has an empty name")]
    EmptyStepName { index: usize },
    #[display("step [{name}] is defined more than once")]
    DuplicateStep { name: String },
    #[display("path [{path}] of step [{name}] must start with '/'")]
    InvalidPath { name: String, path: String },
    #[display("{field} [{value}] cannot be sent in an HTTP header")]
    InvalidHeaderValue { field: String, value: String },
    #[display("{field} [{value}] cannot contain ';' or '=', they separate correlation fields")]
    InvalidCorrelationValue { field: String, value: String },
    #[display("request timeout must be at least 1 second")]
    ZeroRequestTimeout,
    #[display("error rate {rate} is not between 0 and 1")]
    InvalidErrorRate { rate: f64 },
}

impl JourneyConfig {
    /// Parse and validate a journey from TOML text.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: JourneyConfig =
            toml::from_str(content).context("Failed to parse journey configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a journey from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read journey configuration {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid journey configuration {}", path.display()))
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize journey configuration")
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            Ok(url) => {
                return Err(ConfigError::InvalidBaseUrl {
                    base_url: self.base_url.clone(),
                    reason: format!("unsupported scheme {}", url.scheme()),
                })
            }
            Err(e) => {
                return Err(ConfigError::InvalidBaseUrl {
                    base_url: self.base_url.clone(),
                    reason: e.to_string(),
                })
            }
        }

        for (field, value) in [
            ("company name", &self.company_name),
            ("test name", &self.test_name),
            ("script name", &self.script_name),
        ] {
            check_header_value(field, value)?;
        }
        check_correlation_value("test name", &self.test_name)?;
        check_correlation_value("script name", &self.script_name)?;

        if self.request_timeout_s == Some(0) {
            return Err(ConfigError::ZeroRequestTimeout);
        }

        if self.steps.is_empty() {
            return Err(ConfigError::NoSteps);
        }

        let mut seen = HashSet::new();
        for (index, step) in self.steps.iter().enumerate() {
            if step.name.trim().is_empty() {
                return Err(ConfigError::EmptyStepName { index });
            }
            if !seen.insert(step.name.as_str()) {
                return Err(ConfigError::DuplicateStep {
                    name: step.name.clone(),
                });
            }
            if !step.path.starts_with('/') {
                return Err(ConfigError::InvalidPath {
                    name: step.name.clone(),
                    path: step.path.clone(),
                });
            }
            check_header_value("step name", &step.name)?;
            check_correlation_value("step name", &step.name)?;
        }

        let rate = self.error_simulation.rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(ConfigError::InvalidErrorRate { rate });
        }

        Ok(())
    }

    /// Full URL for a path on the service under test.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// `value` escaped as the inside of a JSON string, without the surrounding quotes.
fn json_string_content(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

fn check_header_value(field: &str, value: &str) -> Result<(), ConfigError> {
    HeaderValue::from_str(value)
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidHeaderValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn check_correlation_value(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.contains([';', '=']) {
        return Err(ConfigError::InvalidCorrelationValue {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(())
}
