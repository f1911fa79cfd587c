//! Slot mapping for child templates.

use std::collections::HashMap;

use markup5ever_rcdom::Handle;

use crate::dom;

/// Name of the slot that collects unnamed content.
pub const DEFAULT_SLOT: &str = "default";

/// Child template nodes grouped by target slot name.
///
/// Built once per merge and drained while serializing the base template;
/// each entry is handed out at most once.
#[derive(Default)]
pub struct SlotMap {
    slots: HashMap<String, Vec<Handle>>,
}

impl SlotMap {
    /// Group the top-level nodes of a child template.
    ///
    /// Elements go to the slot named by their `slot` attribute (or the
    /// default slot). Text and comments follow the element before them.
    pub fn from_child(nodes: Vec<Handle>) -> Self {
        let mut slots: HashMap<String, Vec<Handle>> = HashMap::new();
        let mut current = DEFAULT_SLOT.to_string();

        for node in nodes {
            if dom::element_name(&node).is_some() {
                current = dom::attribute(&node, "slot")
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| DEFAULT_SLOT.to_string());
            }
            slots.entry(current.clone()).or_default().push(node);
        }

        Self { slots }
    }

    /// Take the nodes for a slot, leaving nothing behind.
    pub fn take(&mut self, name: &str) -> Option<Vec<Handle>> {
        self.slots.remove(name)
    }

    /// Check if no slot content remains.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Names of slots not yet taken.
    pub fn remaining(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.slots.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for SlotMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotMap")
            .field("slots", &self.remaining())
            .finish()
    }
}
