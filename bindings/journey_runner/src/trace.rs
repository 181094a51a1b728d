use std::fmt::{Display, Formatter};

use crate::config::JourneyConfig;

/// Correlates a request with the virtual user, session, step and test run that produced it.
pub const CORRELATION_HEADER: &str = "X-Correlation";
/// Name of the company whose journey is being simulated.
pub const COMPANY_HEADER: &str = "X-LoadRunner-Company";
/// Name of the step a request belongs to.
pub const STEP_HEADER: &str = "X-LoadRunner-Step";

/// Identity of one simulated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualUser {
    pub id: u32,
    pub session_id: String,
}

impl VirtualUser {
    /// A virtual user with a freshly generated session id.
    pub fn new(id: u32) -> Self {
        Self::with_session(id, nanoid::nanoid!())
    }

    pub fn with_session(id: u32, session_id: impl Into<String>) -> Self {
        Self {
            id,
            session_id: session_id.into(),
        }
    }
}

/// Built for every request a virtual user sends; never shared between virtual users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub vuser_id: u32,
    pub session_id: String,
    pub step_name: String,
    pub script_name: String,
    pub test_name: String,
}

impl TraceContext {
    pub fn new(vuser: &VirtualUser, step_name: &str, config: &JourneyConfig) -> Self {
        Self {
            vuser_id: vuser.id,
            session_id: vuser.session_id.clone(),
            step_name: step_name.to_string(),
            script_name: config.script_name.clone(),
            test_name: config.test_name.clone(),
        }
    }

    /// Value for the [CORRELATION_HEADER].
    pub fn header_value(&self) -> String {
        self.to_string()
    }
}

impl Display for TraceContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "VU={}; Session={}; Step={}; Script={}; Test={}",
            self.vuser_id, self.session_id, self.step_name, self.script_name, self.test_name
        )
    }
}
