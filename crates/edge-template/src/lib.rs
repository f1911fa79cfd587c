//! Template tokenizer and slot merger.
//!
//! This crate turns a base template (and an optional child template) into
//! the ordered token sequence consumed by the composition engine:
//! - `TemplateParser` - Parse, merge and serialize
//! - `SlotMap` - Child template content grouped by slot
//! - `RenderMode` - Full document or fragment of a document
//!
//! Markup is parsed with html5ever, so malformed input is repaired the way a
//! browser would repair it rather than rejected.

mod dom;
mod serializer;
mod slots;

use edge_core::{ComposeConfig, PlaceholderKind, TemplateError, Token};

pub use dom::{parse_document, parse_fragment};
pub use slots::{SlotMap, DEFAULT_SLOT};

use serializer::Serializer;

/// How the template is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// A full HTML document; runtime and deferred placeholders are inserted.
    #[default]
    Document,
    /// A piece of a document embedded elsewhere; no placeholders.
    Fragment,
}

/// Non-fatal template problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateWarning {
    /// A second unnamed `<slot>` was found and ignored.
    DuplicateDefaultSlot,
}

impl std::fmt::Display for TemplateWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DuplicateDefaultSlot => write!(f, "duplicate unnamed slot ignored"),
        }
    }
}

/// Result of tokenizing a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTemplate {
    /// Tokens in document order.
    pub tokens: Vec<Token>,
    /// Problems found while merging.
    pub warnings: Vec<TemplateWarning>,
}

impl ParsedTemplate {
    /// Check if the deferred-content placeholder was inserted.
    pub fn has_deferred_placeholder(&self) -> bool {
        self.tokens
            .iter()
            .any(|t| *t == Token::Placeholder(PlaceholderKind::Deferred))
    }
}

/// Parses base and child templates into tokens.
///
/// Holds configuration only; parsing the same input twice yields the same
/// tokens.
#[derive(Debug, Clone)]
pub struct TemplateParser {
    structured_tags: Vec<String>,
    insert_before: Vec<String>,
}

impl TemplateParser {
    /// Create a parser from the composition config.
    pub fn new(config: &ComposeConfig) -> Self {
        Self {
            structured_tags: config.structured_tags(),
            insert_before: config
                .insert_before
                .iter()
                .map(|t| t.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Tokenize a base template, merging in an optional child template.
    ///
    /// Documents are parsed with the full tree builder; in fragment mode the
    /// base is parsed as `<body>` content.
    pub fn parse(
        &self,
        base: &str,
        child: Option<&str>,
        mode: RenderMode,
    ) -> Result<ParsedTemplate, TemplateError> {
        let base_nodes = match mode {
            RenderMode::Document => vec![dom::parse_document(base)],
            RenderMode::Fragment => dom::parse_fragment(base),
        };
        let slots = child
            .map(|markup| SlotMap::from_child(dom::parse_fragment(markup)))
            .unwrap_or_default();

        let (tokens, warnings) =
            Serializer::new(&self.structured_tags, &self.insert_before, mode, slots)
                .run(&base_nodes)
                .map_err(|err| TemplateError::Invalid {
                    message: format!("failed to serialize template: {err}"),
                    presentable: None,
                })?;

        Ok(ParsedTemplate { tokens, warnings })
    }
}
