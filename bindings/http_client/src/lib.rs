mod client;

pub mod prelude {
    pub use crate::client::{HttpClientInstrumented, HttpResponse};

    // Types defined in reqwest that appear in the client's signatures are re-exported here so that
    // callers don't need a direct dependency on reqwest.
    pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
    pub use reqwest::{Method, StatusCode};
}
