//! HTTP API constants.

/// Default port for the operator API.
pub const DEFAULT_API_PORT: u16 = 8080;

/// Base path of the Environment API.
pub const ENVIRONMENTS_PATH: &str = "/apis/onboarding.beopenit.com/v1alpha1/environments";

/// Default endpoint used by `cnoctl`.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
