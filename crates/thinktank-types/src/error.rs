//! The thinktank error taxonomy.
//!
//! Every failure that reaches a user is a [`ThinktankError`]: a message, a
//! [`ErrorCategory`], an optional cause, and remediation `suggestions` and
//! `examples`. The concrete flavour of the error lives in [`ErrorKind`], and
//! the human-facing name (`"ApiError"`, `"ConfigError"`, ...) is derived from
//! the kind so the two can never disagree.

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// A boxed, thread-safe error used as the `cause` of a [`ThinktankError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad classification shown in the `Error (<category>)` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Vendor call, key, quota, model, content or connectivity problems.
    Api,
    /// Malformed or missing configuration, unknown provider/model references.
    Configuration,
    /// Network failures outside a specific vendor call.
    Network,
    /// Reading or writing files.
    FileSystem,
    /// Access to a resource was denied.
    Permission,
    /// A value failed validation (e.g. a malformed model reference).
    Validation,
    /// Bad user input on the command line or in a prompt file.
    Input,
    /// Catch-all.
    Unknown,
}

impl ErrorCategory {
    /// The display label for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Api => "API",
            Self::Configuration => "Configuration",
            Self::Network => "Network",
            Self::FileSystem => "File System",
            Self::Permission => "Permission",
            Self::Validation => "Validation",
            Self::Input => "Input",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The concrete kind of a [`ThinktankError`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Base kind with no specialization.
    General,
    /// A failure talking to an LLM vendor.
    Api {
        /// Provider the failure belongs to, if known.
        provider_id: Option<String>,
    },
    /// Configuration problem.
    Config,
    /// Filesystem problem.
    FileSystem {
        /// The offending path, if known.
        file_path: Option<PathBuf>,
    },
    /// Validation failure.
    Validation,
    /// Network failure.
    Network,
    /// Permission failure.
    Permission,
    /// Input failure.
    Input,
}

impl ErrorKind {
    /// The type name reported for this kind in logs and output.
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "ThinktankError",
            Self::Api { .. } => "ApiError",
            Self::Config => "ConfigError",
            Self::FileSystem { .. } => "FileSystemError",
            Self::Validation => "ValidationError",
            Self::Network => "NetworkError",
            Self::Permission => "PermissionError",
            Self::Input => "InputError",
        }
    }

    /// The category an error of this kind gets unless overridden.
    pub fn default_category(&self) -> ErrorCategory {
        match self {
            Self::General => ErrorCategory::Unknown,
            Self::Api { .. } => ErrorCategory::Api,
            Self::Config => ErrorCategory::Configuration,
            Self::FileSystem { .. } => ErrorCategory::FileSystem,
            Self::Validation => ErrorCategory::Validation,
            Self::Network => ErrorCategory::Network,
            Self::Permission => ErrorCategory::Permission,
            Self::Input => ErrorCategory::Input,
        }
    }
}

/// A structured, user-actionable error.
///
/// Built once per failure with the constructor for its kind plus the
/// `with_*` builders, then returned as `Err`.
///
/// ```
/// use thinktank_types::ThinktankError;
///
/// let err = ThinktankError::api("boom").for_provider("openai");
/// assert_eq!(err.message(), "[openai] boom");
/// ```
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ThinktankError {
    kind: ErrorKind,
    category: ErrorCategory,
    /// Message as supplied by the caller, before any provider prefix.
    raw_message: String,
    /// Message as rendered (`[provider] raw` for scoped API errors).
    message: String,
    suggestions: Vec<String>,
    examples: Vec<String>,
    /// Set by whoever classified the failure; never inferred from text.
    retryable: bool,
    #[source]
    cause: Option<BoxError>,
}

impl ThinktankError {
    fn with_kind(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            category: kind.default_category(),
            kind,
            raw_message: message.clone(),
            message,
            suggestions: Vec::new(),
            examples: Vec::new(),
            retryable: false,
            cause: None,
        }
    }

    /// Base error with category `Unknown`.
    pub fn new(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::General, message)
    }

    /// API error, not yet scoped to a provider.
    pub fn api(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Api { provider_id: None }, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Config, message)
    }

    pub fn file_system(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::FileSystem { file_path: None }, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Validation, message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Network, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Permission, message)
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::with_kind(ErrorKind::Input, message)
    }

    /// Scope an API error to a provider.
    ///
    /// The rendered message becomes `[provider_id] <raw message>`. Calling
    /// this again replaces the scope, it never stacks prefixes. On kinds
    /// other than [`ErrorKind::Api`] this is a no-op.
    pub fn for_provider(mut self, provider_id: impl Into<String>) -> Self {
        if let ErrorKind::Api { provider_id: slot } = &mut self.kind {
            let id = provider_id.into();
            self.message = format!("[{id}] {}", self.raw_message);
            *slot = Some(id);
        }
        self
    }

    /// Attach the offending path to a filesystem error. No-op on other kinds.
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        if let ErrorKind::FileSystem { file_path } = &mut self.kind {
            *file_path = Some(path.into());
        }
        self
    }

    pub fn with_category(mut self, category: ErrorCategory) -> Self {
        self.category = category;
        self
    }

    pub fn with_cause(mut self, cause: impl Into<BoxError>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions
            .extend(suggestions.into_iter().map(Into::into));
        self
    }

    pub fn with_examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples.extend(examples.into_iter().map(Into::into));
        self
    }

    /// Mark whether retrying the failed operation later could succeed.
    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    /// Type name derived from the kind (`"ApiError"`, `"ConfigError"`, ...).
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    /// The rendered message, including a provider prefix when scoped.
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suggestions(&self) -> &[String] {
        &self.suggestions
    }

    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// The originating error, if any.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        self.cause.as_deref()
    }

    /// Provider id for API errors scoped with [`for_provider`](Self::for_provider).
    pub fn provider_id(&self) -> Option<&str> {
        match &self.kind {
            ErrorKind::Api { provider_id } => provider_id.as_deref(),
            _ => None,
        }
    }

    pub fn file_path(&self) -> Option<&Path> {
        match &self.kind {
            ErrorKind::FileSystem { file_path } => file_path.as_deref(),
            _ => None,
        }
    }

    pub fn is_api(&self) -> bool {
        matches!(self.kind, ErrorKind::Api { .. })
    }

    pub fn is_retryable(&self) -> bool {
        self.retryable
    }

    /// Render the error for display.
    ///
    /// Layout is a header, then `Suggestions:` and `Examples:` blocks, each
    /// present only when non-empty and separated by a blank line.
    pub fn format(&self) -> String {
        let mut out = format!("Error ({}): {}", self.category, self.message);

        if !self.suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for suggestion in &self.suggestions {
                out.push_str("\n  - ");
                out.push_str(suggestion);
            }
        }

        if !self.examples.is_empty() {
            out.push_str("\n\nExamples:");
            for example in &self.examples {
                out.push_str("\n  - ");
                out.push_str(example);
            }
        }

        out
    }

    /// Write [`format`](Self::format) to stderr.
    pub fn print(&self) {
        eprintln!("{}", self.format());
    }
}

/// A convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, ThinktankError>;
