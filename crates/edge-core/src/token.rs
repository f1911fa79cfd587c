//! Template tokens.

use bytes::Bytes;

/// Synthetic insertion points added by the template serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaceholderKind {
    /// One-time insertion point for the client runtime script.
    Runtime,
    /// End-of-body insertion point for deferred fragment markup.
    Deferred,
}

impl PlaceholderKind {
    /// Get the name of this placeholder.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Runtime => "runtime",
            Self::Deferred => "deferred",
        }
    }
}

/// A single tag attribute, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    /// Lowercased attribute name.
    pub name: String,
    /// Decoded value (empty for boolean attributes).
    pub value: String,
}

impl Attribute {
    /// Create a new attribute.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// One unit of a tokenized template.
///
/// The sequence is produced once per request and consumed strictly in
/// order; nothing downstream reorders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Literal markup passed through unchanged.
    Literal(Bytes),
    /// Opening of a handled tag.
    OpenTag {
        name: String,
        attributes: Vec<Attribute>,
        self_closing: bool,
    },
    /// Closing of a handled tag.
    CloseTag { name: String },
    /// Synthetic placeholder.
    Placeholder(PlaceholderKind),
}

impl Token {
    /// Create a literal token from text.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(Bytes::from(text.into()))
    }

    /// Check if this token needs a resolver.
    pub fn is_structured(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }

    /// Get the tag name for open and close tokens.
    pub fn tag_name(&self) -> Option<&str> {
        match self {
            Self::OpenTag { name, .. } | Self::CloseTag { name } => Some(name),
            _ => None,
        }
    }

    /// Look up an attribute on an open tag.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        match self {
            Self::OpenTag { attributes, .. } => attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str()),
            _ => None,
        }
    }
}
