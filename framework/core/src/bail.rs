/// Return this error from a virtual user's behaviour to indicate that the virtual user is bailing.
///
/// Use this when a virtual user cannot make progress any more, for example because its journey
/// configuration turned out to be unusable, but the other virtual users should keep running.
#[derive(derive_more::Error, derive_more::Display, Debug)]
pub struct AgentBailError {
    msg: String,
}

impl AgentBailError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { msg: msg.into() }
    }
}

impl Default for AgentBailError {
    fn default() -> Self {
        Self::new("Virtual user is bailing")
    }
}
