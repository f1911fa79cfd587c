//! Serialization of a merged template into tokens.
//!
//! Ordinary markup goes through html5ever's `HtmlSerializer` into a byte
//! buffer. The buffer is cut into a `Literal` token whenever a structured
//! token or placeholder has to be emitted.

use std::io;

use bytes::Bytes;
use edge_core::{Attribute, PlaceholderKind, Token};
use html5ever::serialize::{HtmlSerializer, SerializeOpts, Serializer as _};
use markup5ever_rcdom::{Handle, NodeData};

use crate::dom;
use crate::slots::{SlotMap, DEFAULT_SLOT};
use crate::{RenderMode, TemplateWarning};

pub(crate) struct Serializer<'a> {
    structured_tags: &'a [String],
    insert_before: &'a [String],
    mode: RenderMode,
    slots: SlotMap,
    markup: HtmlSerializer<Vec<u8>>,
    tokens: Vec<Token>,
    runtime_inserted: bool,
    deferred_inserted: bool,
    default_slot_seen: bool,
    warnings: Vec<TemplateWarning>,
}

impl<'a> Serializer<'a> {
    pub(crate) fn new(
        structured_tags: &'a [String],
        insert_before: &'a [String],
        mode: RenderMode,
        slots: SlotMap,
    ) -> Self {
        Self {
            structured_tags,
            insert_before,
            mode,
            slots,
            markup: HtmlSerializer::new(Vec::new(), SerializeOpts::default()),
            tokens: Vec::new(),
            runtime_inserted: false,
            deferred_inserted: false,
            default_slot_seen: false,
            warnings: Vec::new(),
        }
    }

    pub(crate) fn run(mut self, nodes: &[Handle]) -> io::Result<(Vec<Token>, Vec<TemplateWarning>)> {
        self.nodes(nodes)?;
        self.flush();
        if !self.slots.is_empty() {
            tracing::debug!(slots = ?self.slots.remaining(), "Child template content has no matching slot");
        }
        Ok((self.tokens, self.warnings))
    }

    fn flush(&mut self) {
        let bytes = std::mem::take(&mut self.markup.writer);
        if !bytes.is_empty() {
            self.tokens.push(Token::Literal(Bytes::from(bytes)));
        }
    }

    fn push(&mut self, token: Token) {
        self.flush();
        self.tokens.push(token);
    }

    fn nodes(&mut self, nodes: &[Handle]) -> io::Result<()> {
        for node in nodes {
            self.node(node)?;
        }
        Ok(())
    }

    fn node(&mut self, node: &Handle) -> io::Result<()> {
        match &node.data {
            NodeData::Document => self.nodes(&dom::children(node)),
            NodeData::Doctype { name, .. } => self.markup.write_doctype(name),
            NodeData::Text { contents } => {
                let text = contents.borrow();
                self.markup.write_text(&text)
            }
            NodeData::Comment { contents } => self.markup.write_comment(contents),
            NodeData::ProcessingInstruction { target, contents } => {
                self.markup.write_processing_instruction(target, contents)
            }
            NodeData::Element { name, attrs, .. } => {
                let local = &*name.local;
                if self.is_slot(node, local) {
                    return self.slot(node);
                }

                if self.mode == RenderMode::Document
                    && !self.runtime_inserted
                    && self.insert_before.iter().any(|t| t == local)
                {
                    self.insert_runtime();
                }

                if let Some(tag) = self.structured_name(node, local) {
                    let attributes = attrs
                        .borrow()
                        .iter()
                        .map(|a| Attribute::new(&*a.name.local, &*a.value))
                        .collect();
                    self.push(Token::OpenTag {
                        name: tag.clone(),
                        attributes,
                        self_closing: dom::is_void(local),
                    });
                    self.nodes(&dom::children(node))?;
                    self.push(Token::CloseTag { name: tag });
                    return Ok(());
                }

                {
                    let attrs = attrs.borrow();
                    self.markup
                        .start_elem(name.clone(), attrs.iter().map(|a| (&a.name, &*a.value)))?;
                }
                self.nodes(&dom::children(node))?;
                if local == "body" && self.mode == RenderMode::Document && !self.deferred_inserted {
                    if !self.runtime_inserted {
                        self.insert_runtime();
                    }
                    self.push(Token::Placeholder(PlaceholderKind::Deferred));
                    self.deferred_inserted = true;
                }
                self.markup.end_elem(name.clone())
            }
        }
    }

    fn insert_runtime(&mut self) {
        self.push(Token::Placeholder(PlaceholderKind::Runtime));
        self.runtime_inserted = true;
    }

    /// `<slot>`, or `<script type="slot">` where a slot element would be
    /// moved out of `<head>` by the parser.
    fn is_slot(&self, node: &Handle, local: &str) -> bool {
        local == "slot"
            || (local == "script" && script_type(node).as_deref() == Some("slot"))
    }

    /// Name of the structured token for this element, if it is a handled tag.
    ///
    /// `<script type="fragment">` is an alias for `<fragment>`.
    fn structured_name(&self, node: &Handle, local: &str) -> Option<String> {
        if self.structured_tags.iter().any(|t| t == local) {
            return Some(local.to_string());
        }
        if local == "script" {
            let kind = script_type(node)?;
            if self.structured_tags.contains(&kind) {
                return Some(kind);
            }
        }
        None
    }

    fn slot(&mut self, node: &Handle) -> io::Result<()> {
        let name = dom::attribute(node, "name")
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| DEFAULT_SLOT.to_string());

        if name == DEFAULT_SLOT {
            if self.default_slot_seen {
                tracing::warn!("Template declares more than one unnamed slot, ignoring the extra one");
                self.warnings.push(TemplateWarning::DuplicateDefaultSlot);
                return Ok(());
            }
            self.default_slot_seen = true;
        }

        match self.slots.take(&name) {
            Some(nodes) => self.nodes(&nodes),
            None => self.nodes(&dom::children(node)),
        }
    }
}

fn script_type(node: &Handle) -> Option<String> {
    dom::attribute(node, "type").map(|t| t.trim().to_ascii_lowercase())
}
