//! Shared HTTP constants (headers, cookies, problem URIs).

pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_REAL_IP: &str = "x-real-ip";
pub(crate) const HEADER_DO_NOT_TRACK: &str = "dnt";

pub(crate) const COOKIE_SESSION: &str = "agora_session";
pub(crate) const COOKIE_AUTH: &str = "agora_auth";
pub(crate) const COOKIE_THEME: &str = "agora_theme";

pub(crate) const UNKNOWN_CLIENT: &str = "unknown";
pub(crate) const INFO_PATH: &str = "/info";
pub(crate) const THEME_ITEM_PATH: &str = "/theme/{page}/{tag}";
pub(crate) const HEALTH_PATH: &str = "/health";
pub(crate) const HEALTH_FULL_PATH: &str = "/health/full";
pub(crate) const METRICS_PATH: &str = "/metrics";

pub(crate) const PROBLEM_INTERNAL: &str = "https://agora-forum.dev/problems/internal";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://agora-forum.dev/problems/service-unavailable";
