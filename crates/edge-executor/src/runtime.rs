//! The client runtime delivered once per document.
//!
//! The runtime moves deferred fragment markup to its placeholder, imports
//! each fragment script once and calls its default export with the
//! fragment's element. When every primary fragment has initialised it sets
//! `interactive` and dispatches `<name>:interactive` on `window`.

use serde_json::json;

use crate::markers::js_literal;

/// Runtime source: a function taking `(global, name)`.
pub const RUNTIME_JS: &str = include_str!("../assets/pipe.js");

/// The runtime as a script element, published under `name`.
pub fn runtime_script(name: &str) -> String {
    format!(
        "<script data-pipe>({})(window, {});</script>",
        RUNTIME_JS.trim(),
        js_literal(&json!(name))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_script_names_instance() {
        let script = runtime_script("Pipe");
        assert!(script.starts_with("<script data-pipe>(function (global, name)"));
        assert!(script.ends_with(r#"(window, "Pipe");</script>"#));
    }

    #[test]
    fn test_runtime_cannot_close_its_element() {
        assert!(!RUNTIME_JS.contains("</"));
    }

    #[test]
    fn test_runtime_exposes_marker_methods() {
        for method in ["pipe.placeholder", "pipe.start", "pipe.end", "pipe.loadCSS"] {
            assert!(RUNTIME_JS.contains(method), "missing {method}");
        }
    }
}
