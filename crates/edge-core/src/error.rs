//! Error taxonomy for a composed request.

/// Template retrieval or parsing failure. Terminal for the request.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    NotFound(String),

    #[error("Failed to read template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid template: {message}")]
    Invalid {
        message: String,
        /// Message safe to show to the end user.
        presentable: Option<String>,
    },
}

impl TemplateError {
    /// Create an invalid-template error with a user-facing message.
    pub fn presentable(message: impl Into<String>, presentable: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            presentable: Some(presentable.into()),
        }
    }

    /// Check if the template does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Get the message carried for the end user, if any.
    pub fn presentable_message(&self) -> Option<&str> {
        match self {
            Self::Invalid {
                presentable: Some(msg),
                ..
            } => Some(msg),
            _ => None,
        }
    }
}

/// Context retrieval failure. Recovered with an empty context.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Context error: {0}")]
pub struct ContextError(pub String);

/// Failure while composing the token sequence. Terminal for the request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ComposeError {
    #[error("No handler for tag '{0}'")]
    UnhandledTag(String),

    #[error("Resolver error: {0}")]
    Resolver(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("{fragments} async fragment(s) but the template has no deferred placeholder (missing <body>?)")]
    MissingDeferredPlaceholder { fragments: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_error_classes() {
        assert!(TemplateError::NotFound("/x".into()).is_not_found());
        let err = TemplateError::presentable("bad slot", "Page unavailable");
        assert!(!err.is_not_found());
        assert_eq!(err.presentable_message(), Some("Page unavailable"));
    }

    #[test]
    fn test_not_found_has_no_presentable_message() {
        assert_eq!(TemplateError::NotFound("/x".into()).presentable_message(), None);
    }

    #[test]
    fn test_missing_placeholder_message() {
        let err = ComposeError::MissingDeferredPlaceholder { fragments: 2 };
        assert!(err.to_string().starts_with("2 async fragment(s)"));
    }
}
