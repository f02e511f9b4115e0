//! API constants

/// Versioned prefix for every resource route.
pub const API_PREFIX: &str = "/api/v1";

pub const OPENAPI_PATH: &str = "/api/openapi.json";

pub const DOCS_PATH: &str = "/docs";

/// Slack on top of the largest accepted file for multipart framing.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;

pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;
