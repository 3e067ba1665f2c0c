//! Builders for the standard provider failures, and the pipeline that turns a
//! raw vendor failure into one of them.
//!
//! Every builder returns an [`ApiError`](thinktank_types::ErrorKind::Api)
//! scoped to the provider, with non-empty suggestions. Nothing in this module
//! performs I/O.

use thiserror::Error;
use tracing::debug;

use thinktank_types::{BoxError, ThinktankError};

use crate::patterns::{self, FailureClass};

/// Static facts about a provider used to word its errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    /// Registry id (`"openai"`).
    pub id: &'static str,
    /// Human-readable vendor name (`"OpenAI"`).
    pub display_name: &'static str,
    /// Environment variable the key is read from.
    pub api_key_env: &'static str,
    /// Where users obtain a key.
    pub console_url: &'static str,
}

/// A raw failure at the vendor boundary, before classification.
#[derive(Debug, Error)]
pub enum VendorError {
    /// Already classified; passed through unchanged.
    #[error(transparent)]
    Taxonomy(#[from] ThinktankError),

    /// The vendor answered with a non-success status.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        /// Best-effort human-readable message extracted from the body.
        message: String,
        /// Raw response body.
        body: String,
    },

    /// The request never produced a response.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response that could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl VendorError {
    /// Display text plus every `source()` in the chain. Transport errors
    /// hide the useful part ("connection refused") in their sources.
    fn diagnostic_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}

const MAX_DETAIL_CHARS: usize = 500;

fn truncate_detail(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > MAX_DETAIL_CHARS {
        let cut: String = text.chars().take(MAX_DETAIL_CHARS).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

fn detail_suffix(cause: Option<&BoxError>) -> String {
    match cause.map(|c| truncate_detail(&c.to_string())) {
        Some(text) if !text.is_empty() => format!(": {text}"),
        _ => String::new(),
    }
}

fn scoped(info: &ProviderInfo, message: String, cause: Option<BoxError>) -> ThinktankError {
    let err = ThinktankError::api(message).for_provider(info.id);
    match cause {
        Some(c) => err.with_cause(c),
        None => err,
    }
}

/// No key was passed to the constructor and the env var is unset.
pub fn missing_api_key_error(info: &ProviderInfo) -> ThinktankError {
    scoped(
        info,
        format!(
            "{} API key is missing. Set the {} environment variable.",
            info.display_name, info.api_key_env
        ),
        None,
    )
    .with_suggestions([
        format!("Get an API key from {}", info.console_url),
        format!(
            "Export it in your shell: export {}=your-api-key",
            info.api_key_env
        ),
        "Add the export to your shell profile so it persists across sessions".to_string(),
    ])
    .with_examples([format!("export {}=your-api-key", info.api_key_env)])
}

/// The vendor rejected the key.
pub fn auth_error(info: &ProviderInfo, cause: Option<BoxError>) -> ThinktankError {
    let message = format!(
        "{} rejected the API key (authentication failed){}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    scoped(info, message, cause).with_suggestions([
        format!(
            "Check that {} holds a valid, unexpired key",
            info.api_key_env
        ),
        format!("Create or rotate a key at {}", info.console_url),
        "Make sure the key belongs to an account with access to this model".to_string(),
    ])
}

/// The vendor is throttling us. Detection only; nothing retries here.
pub fn rate_limit_error(info: &ProviderInfo, cause: Option<BoxError>) -> ThinktankError {
    let message = format!(
        "{} rate limit exceeded{}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    scoped(info, message, cause)
        .with_retryable(true)
        .with_suggestions([
            "Wait a moment and try again; back off exponentially if it keeps happening"
                .to_string(),
            "Reduce the number of concurrent requests or models in one run".to_string(),
            format!("Check your usage tier and quota at {}", info.console_url),
        ])
}

/// Prompt or requested output exceeds what the model accepts.
pub fn token_limit_error(info: &ProviderInfo, cause: Option<BoxError>) -> ThinktankError {
    let message = format!(
        "{} token limit exceeded{}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    scoped(info, message, cause)
        .with_suggestions([
            "Shorten the prompt or remove unneeded context".to_string(),
            "Request fewer output tokens with a smaller maxTokens".to_string(),
            "Use a model with a larger context window".to_string(),
        ])
        .with_examples(["thinktank run @prompt.txt --max-tokens 1000"])
}

/// The request tripped the vendor's safety filters.
pub fn content_policy_error(info: &ProviderInfo, cause: Option<BoxError>) -> ThinktankError {
    let message = format!(
        "{} blocked the request under its content policy{}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    scoped(info, message, cause).with_suggestions([
        "Rephrase the prompt to avoid content the provider may consider harmful".to_string(),
        format!(
            "{} applies its own safety filters; the same prompt may pass with another provider",
            info.display_name
        ),
        "Remove sensitive material from any included context".to_string(),
    ])
}

/// The requested model id is unknown to the vendor.
///
/// `available` lists valid ids for this provider when known. Up to five are
/// offered as examples.
pub fn model_not_found_error(
    info: &ProviderInfo,
    model_id: &str,
    available: &[String],
    cause: Option<BoxError>,
) -> ThinktankError {
    let message = format!(
        "Model '{model_id}' was not found on {}{}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    let err = scoped(info, message, cause).with_suggestions([
        "Check the model id for typos".to_string(),
        format!(
            "List the models available to your key: thinktank models --provider {}",
            info.id
        ),
        "Your account may not have access to this model yet".to_string(),
    ]);

    if available.is_empty() {
        err
    } else {
        err.with_suggestion(format!("Models available on {} include:", info.display_name))
            .with_examples(
                available
                    .iter()
                    .filter(|id| id.as_str() != model_id)
                    .take(5)
                    .map(|id| format!("{}:{id}", info.id)),
            )
    }
}

/// The vendor could not be reached.
pub fn network_error(info: &ProviderInfo, cause: Option<BoxError>) -> ThinktankError {
    let message = format!(
        "Network error while contacting {}{}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    scoped(info, message, cause)
        .with_retryable(true)
        .with_suggestions([
            "Check your internet connection".to_string(),
            "If you are behind a proxy or firewall, make sure it allows the provider's API host"
                .to_string(),
            "Check DNS resolution for the API host".to_string(),
            format!(
                "{} may be having an outage; try again shortly",
                info.display_name
            ),
        ])
}

/// Anything that matched no other class.
pub fn unknown_error(
    info: &ProviderInfo,
    message: &str,
    cause: Option<BoxError>,
) -> ThinktankError {
    let message = truncate_detail(message);
    let message = if message.is_empty() {
        format!("{} request failed with an unknown error", info.display_name)
    } else {
        format!("{} request failed: {message}", info.display_name)
    };
    scoped(info, message, cause).with_suggestions([
        format!(
            "Check the {} status page for ongoing incidents",
            info.display_name
        ),
        "Verify the model id and options in your configuration".to_string(),
        "Run again with --verbose to see the full request log".to_string(),
    ])
}

/// A `GET /models` listing failed for a reason that is not auth, throttling
/// or connectivity.
pub fn list_models_error(info: &ProviderInfo, cause: Option<BoxError>) -> ThinktankError {
    let message = format!(
        "Could not list models on {}{}",
        info.display_name,
        detail_suffix(cause.as_ref())
    );
    scoped(info, message, cause).with_suggestions([
        format!(
            "Check that the key in {} has access to the models endpoint",
            info.api_key_env
        ),
        "With a proxy or custom base URL, make sure it serves the models list".to_string(),
        format!(
            "Check the {} status page for ongoing incidents",
            info.display_name
        ),
    ])
}

/// Turn a raw vendor failure into a taxonomy error.
///
/// Already-classified errors come back unchanged. HTTP and transport
/// failures are classified on their message text via
/// [`patterns::classify_message`]; undecodable responses become
/// [`unknown_error`].
pub fn classify_error(info: &ProviderInfo, model_id: &str, error: VendorError) -> ThinktankError {
    classify(info, Some(model_id), error)
}

/// [`classify_error`] for model listing, where no model id is involved.
/// "Not found" and unmatched failures become [`list_models_error`].
pub fn classify_listing_error(info: &ProviderInfo, error: VendorError) -> ThinktankError {
    classify(info, None, error)
}

fn classify(info: &ProviderInfo, model_id: Option<&str>, error: VendorError) -> ThinktankError {
    if let VendorError::Taxonomy(err) = error {
        return err;
    }

    let message = error.diagnostic_message();
    let class = match error {
        VendorError::Decode(_) => FailureClass::Unknown,
        _ => patterns::classify_message(&message),
    };
    debug!(provider = info.id, model = model_id, ?class, "classified vendor failure");

    let cause: BoxError = Box::new(error);
    match (class, model_id) {
        (FailureClass::Auth, _) => auth_error(info, Some(cause)),
        (FailureClass::RateLimit, _) => rate_limit_error(info, Some(cause)),
        (FailureClass::TokenLimit, _) => token_limit_error(info, Some(cause)),
        (FailureClass::ContentPolicy, _) => content_policy_error(info, Some(cause)),
        (FailureClass::Network, _) => network_error(info, Some(cause)),
        (FailureClass::ModelNotFound, Some(id)) => {
            model_not_found_error(info, id, &[], Some(cause))
        }
        (FailureClass::Unknown, Some(_)) => unknown_error(info, &message, Some(cause)),
        (FailureClass::ModelNotFound | FailureClass::Unknown, None) => {
            list_models_error(info, Some(cause))
        }
    }
}

/// Whether retrying `err` later could plausibly succeed.
///
/// True for API errors of the rate-limit and network classes. The class is
/// fixed when the error is built, so detail text carried in the message
/// does not change the answer.
pub fn is_retryable(err: &ThinktankError) -> bool {
    err.is_api() && err.is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;
    use thinktank_types::ErrorCategory;

    const INFO: ProviderInfo = ProviderInfo {
        id: "acme",
        display_name: "Acme AI",
        api_key_env: "ACME_API_KEY",
        console_url: "https://acme.example/keys",
    };

    fn http(status: u16, message: &str) -> VendorError {
        VendorError::Http {
            status,
            message: message.into(),
            body: String::new(),
        }
    }

    #[test]
    fn missing_key_names_env_var_and_console() {
        let err = missing_api_key_error(&INFO);
        assert!(err.is_api());
        assert_eq!(err.provider_id(), Some("acme"));
        assert!(err.message().starts_with("[acme] "));
        assert!(err.message().contains("API key is missing"));
        assert!(err.message().contains("ACME_API_KEY"));
        assert!(
            err.suggestions()
                .iter()
                .any(|s| s.contains("https://acme.example/keys"))
        );
    }

    #[test]
    fn every_builder_has_suggestions() {
        let errors = [
            missing_api_key_error(&INFO),
            auth_error(&INFO, None),
            rate_limit_error(&INFO, None),
            token_limit_error(&INFO, None),
            content_policy_error(&INFO, None),
            model_not_found_error(&INFO, "m", &[], None),
            network_error(&INFO, None),
            unknown_error(&INFO, "", None),
        ];
        for err in errors {
            assert_eq!(err.category(), ErrorCategory::Api);
            assert_eq!(err.provider_id(), Some("acme"));
            assert!(!err.suggestions().is_empty(), "{}", err.message());
            assert!(err.suggestions().iter().all(|s| !s.is_empty()));
        }
    }

    #[test]
    fn model_not_found_suggests_alternatives() {
        let available = vec!["m".to_string(), "alpha".to_string(), "beta".to_string()];
        let err = model_not_found_error(&INFO, "m", &available, None);
        assert!(err.message().contains("'m'"));
        assert_eq!(
            err.examples(),
            &["acme:alpha".to_string(), "acme:beta".to_string()]
        );
    }

    #[test]
    fn model_not_found_caps_alternatives() {
        let available: Vec<String> = (0..10).map(|i| format!("model-{i}")).collect();
        let err = model_not_found_error(&INFO, "x", &available, None);
        assert_eq!(err.examples().len(), 5);
    }

    #[test]
    fn classify_passes_taxonomy_errors_through() {
        let original = ThinktankError::api("already classified").for_provider("acme");
        let out = classify_error(&INFO, "m", VendorError::Taxonomy(original));
        assert_eq!(out.message(), "[acme] already classified");
        assert!(out.cause().is_none());
    }

    #[test]
    fn classify_http_statuses() {
        let cases = [
            (401, "Invalid credentials", "rejected the API key"),
            (429, "slow down", "rate limit exceeded"),
            (404, "no route", "was not found"),
            (400, "maximum context length is 8192 tokens", "token limit"),
            (400, "Output blocked by safety settings", "content policy"),
            (503, "upstream", "Network error"),
            (400, "bad request", "request failed: HTTP 400: bad request"),
        ];
        for (status, msg, expected) in cases {
            let err = classify_error(&INFO, "m", http(status, msg));
            assert!(
                err.message().contains(expected),
                "status {status}: {}",
                err.message()
            );
            assert!(err.cause().is_some());
        }
    }

    #[test]
    fn classify_keeps_http_cause() {
        let err = classify_error(&INFO, "m", http(429, "slow down"));
        let cause = err.source().unwrap();
        assert_eq!(cause.to_string(), "HTTP 429: slow down");
    }

    #[test]
    fn decode_failures_are_unknown() {
        let err = classify_error(
            &INFO,
            "m",
            VendorError::Decode("rate limit field not found".into()),
        );
        assert!(err.message().contains("request failed"));
    }

    #[test]
    fn model_not_found_from_classification_names_model() {
        let err = classify_error(
            &INFO,
            "gpt-9",
            http(404, "The model `gpt-9` does not exist"),
        );
        assert!(err.message().contains("'gpt-9'"));
    }

    #[test]
    fn long_details_are_truncated() {
        let long = "x".repeat(2000);
        let err = classify_error(&INFO, "m", http(500, &long));
        assert!(err.message().len() < 800);
        assert!(err.message().ends_with("..."));
    }

    #[test]
    fn numbers_in_token_limit_body_do_not_mean_auth() {
        let err = classify_error(
            &INFO,
            "gpt-4o",
            http(
                400,
                "This model's maximum context length is 8192 tokens. However, your messages \
                 resulted in 14039 tokens",
            ),
        );
        assert!(
            err.message().contains("token limit exceeded"),
            "{}",
            err.message()
        );
        assert!(err.suggestions().iter().any(|s| s.contains("maxTokens")));
    }

    #[test]
    fn listing_failures_do_not_name_a_model() {
        let err = classify_listing_error(&INFO, http(404, "Not Found"));
        assert!(err.message().contains("Could not list models on Acme AI"));
        assert!(!err.message().contains("Model ''"));
        assert!(!err.suggestions().is_empty());

        let unknown = classify_listing_error(&INFO, http(500, "boom"));
        assert!(unknown.message().contains("Could not list models"));

        let auth = classify_listing_error(&INFO, http(401, "bad key"));
        assert!(auth.message().contains("rejected the API key"));
    }

    #[test]
    fn retryable_comes_from_the_class_not_the_text() {
        let auth = classify_error(
            &INFO,
            "m",
            http(401, "invalid api key; see your quota page"),
        );
        assert!(auth.message().contains("quota"));
        assert!(!is_retryable(&auth));

        let throttled = classify_error(&INFO, "m", http(429, "slow down"));
        assert!(is_retryable(&throttled));

        let worded = ThinktankError::api("rate limit, timeout, network").for_provider("acme");
        assert!(!is_retryable(&worded));
    }

    #[test]
    fn retryable_detection() {
        assert!(is_retryable(&rate_limit_error(&INFO, None)));
        assert!(is_retryable(&network_error(&INFO, None)));
        assert!(!is_retryable(&token_limit_error(&INFO, None)));
        assert!(!is_retryable(&ThinktankError::config("rate limit")));
    }
}
