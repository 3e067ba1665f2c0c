//! Substring tables for classifying vendor failure messages.
//!
//! Vendors rarely return structured, stable error codes, so failures are
//! classified by matching the lower-cased message text against the tables
//! below. Matching is permissive: a slightly wrong suggestion beats none.
//!
//! All patterns live here. Supporting a new vendor phrasing means adding a
//! string to one of these tables, not editing provider code.
//!
//! A message can match several tables, so [`classify_message`] walks them in
//! [`PRIORITY`] order and the first hit wins.
//!
//! HTTP failures are classified on `"http <status>: <vendor message>"`.
//! Status codes are matched only in that `http <status>:` prefix form, never
//! as bare digits, since token counts, ports and request ids in the vendor
//! text are full of them.
//!
//! The `is_provider_*` predicates take an already lower-cased message;
//! [`classify_message`] lower-cases for you.

/// Failure classes recognised from message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    Auth,
    RateLimit,
    ModelNotFound,
    TokenLimit,
    ContentPolicy,
    Network,
    Unknown,
}

/// Rejected, missing or unauthorised credentials.
pub const AUTH_PATTERNS: &[&str] = &[
    "api key",
    "api_key",
    "apikey",
    "x-api-key",
    "authentication",
    "unauthorized",
    "unauthenticated",
    "invalid key",
    "permission denied",
    "permission_denied",
    "forbidden",
    "http 401:",
    "http 403:",
];

/// Throttling and quota exhaustion.
pub const RATE_LIMIT_PATTERNS: &[&str] = &[
    "rate limit",
    "rate_limit",
    "ratelimit",
    "http 429:",
    "too many requests",
    "quota",
    "resource_exhausted",
    "resource exhausted",
    "overloaded",
];

/// Unknown or unavailable model ids.
pub const MODEL_NOT_FOUND_PATTERNS: &[&str] = &[
    "model not found",
    "model_not_found",
    "no such model",
    "unknown model",
    "invalid model",
    "does not exist",
    "not found",
    "not_found",
    "http 404:",
];

/// Prompt or completion exceeding the context window or token limits.
pub const TOKEN_LIMIT_PATTERNS: &[&str] = &[
    "token limit",
    "too many tokens",
    "maximum context length",
    "context length",
    "context_length_exceeded",
    "context window",
    "max_tokens",
    "maximum tokens",
    "prompt is too long",
    "input is too long",
    "reduce the length",
    "exceeds the maximum",
];

/// Safety filters and moderation.
pub const CONTENT_POLICY_PATTERNS: &[&str] = &[
    "content policy",
    "content_policy",
    "content filter",
    "content_filter",
    "content management",
    "safety",
    "moderation",
    "flagged",
    "blocked",
    "harmful",
    "prohibited",
    "violat",
];

/// Transport-level and gateway failures.
pub const NETWORK_PATTERNS: &[&str] = &[
    "network",
    "connect",
    "econnrefused",
    "econnreset",
    "enotfound",
    "etimedout",
    "timeout",
    "timed out",
    "socket",
    "dns",
    "error sending request",
    "fetch failed",
    "unreachable",
    "bad gateway",
    "service unavailable",
    "http 502:",
    "http 503:",
    "http 504:",
];

/// Tables in the order they are tried.
pub const PRIORITY: &[(FailureClass, &[&str])] = &[
    (FailureClass::Auth, AUTH_PATTERNS),
    (FailureClass::RateLimit, RATE_LIMIT_PATTERNS),
    (FailureClass::ModelNotFound, MODEL_NOT_FOUND_PATTERNS),
    (FailureClass::TokenLimit, TOKEN_LIMIT_PATTERNS),
    (FailureClass::ContentPolicy, CONTENT_POLICY_PATTERNS),
    (FailureClass::Network, NETWORK_PATTERNS),
];

fn matches_any(lower_message: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| lower_message.contains(p))
}

pub fn is_provider_auth_error(lower_message: &str) -> bool {
    matches_any(lower_message, AUTH_PATTERNS)
}

pub fn is_provider_rate_limit_error(lower_message: &str) -> bool {
    matches_any(lower_message, RATE_LIMIT_PATTERNS)
}

pub fn is_provider_model_not_found_error(lower_message: &str) -> bool {
    matches_any(lower_message, MODEL_NOT_FOUND_PATTERNS)
}

pub fn is_provider_token_limit_error(lower_message: &str) -> bool {
    matches_any(lower_message, TOKEN_LIMIT_PATTERNS)
}

pub fn is_provider_content_policy_error(lower_message: &str) -> bool {
    matches_any(lower_message, CONTENT_POLICY_PATTERNS)
}

pub fn is_provider_network_error(lower_message: &str) -> bool {
    matches_any(lower_message, NETWORK_PATTERNS)
}

/// Classify a message by the first table in [`PRIORITY`] that matches.
///
/// The message is lower-cased here, so any casing is accepted.
pub fn classify_message(message: &str) -> FailureClass {
    let lower = message.to_lowercase();
    PRIORITY
        .iter()
        .find(|(_, patterns)| matches_any(&lower, patterns))
        .map(|(class, _)| *class)
        .unwrap_or(FailureClass::Unknown)
}
