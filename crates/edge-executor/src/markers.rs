//! Markup emitted around fragment content for the client runtime.

use serde_json::json;

use crate::index::IndexRange;

/// Encode a value as a JavaScript literal safe inside a `<script>` element.
pub fn js_literal(value: &serde_json::Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Escape text for a double-quoted HTML attribute.
pub fn escape_attribute(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Builds marker scripts for one runtime instance name.
#[derive(Debug, Clone)]
pub struct Markers {
    pipe: String,
}

impl Markers {
    /// Markers calling the runtime published under `pipe`.
    pub fn new(pipe: impl Into<String>) -> Self {
        Self { pipe: pipe.into() }
    }

    fn call(&self, method: &str, args: &[String]) -> String {
        format!(
            "<script data-pipe>{}.{}({})</script>",
            self.pipe,
            method,
            args.join(", ")
        )
    }

    /// Position marker for deferred content.
    pub fn placeholder(&self, index: usize) -> String {
        self.call("placeholder", &[index.to_string()])
    }

    /// Opening marker; `script` is an empty string when there is none.
    pub fn start(&self, index: usize, script: &str, attributes: &str) -> String {
        self.call(
            "start",
            &[index.to_string(), js_literal(&json!(script)), attributes.to_string()],
        )
    }

    /// Closing marker matching `start`.
    pub fn end(&self, index: usize, script: &str, attributes: &str) -> String {
        self.call(
            "end",
            &[index.to_string(), js_literal(&json!(script)), attributes.to_string()],
        )
    }

    /// Stylesheet load for deferred content.
    pub fn load_css(&self, href: &str) -> String {
        self.call("loadCSS", &[js_literal(&json!(href))])
    }

    /// Blocking stylesheet link for in-place content.
    pub fn stylesheet(&self, href: &str) -> String {
        format!(r#"<link rel="stylesheet" href="{}">"#, escape_attribute(href))
    }
}

/// Correlation object passed to `start` and `end`, as a JavaScript literal.
pub fn marker_attributes(id: &str, range: IndexRange, primary: bool) -> String {
    format!(
        r#"{{"id":{},"range":[{},{}],"primary":{}}}"#,
        js_literal(&json!(id)),
        range.low,
        range.high,
        primary
    )
}

/// Everything written before and after a fragment body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Envelope {
    pub prefix: String,
    pub suffix: String,
}

/// What a fragment needs to wrap its body.
#[derive(Debug, Clone)]
pub struct EnvelopeSpec<'a> {
    pub id: &'a str,
    pub range: IndexRange,
    pub stylesheets: &'a [String],
    pub scripts: &'a [String],
    pub primary: bool,
    /// Content goes to the end of the document instead of in place.
    pub deferred: bool,
    /// Skip the id-bearing wrapper element (in-place content only).
    pub inline: bool,
}

impl Markers {
    /// Wrap a fragment body.
    ///
    /// One start/end pair per script index; the pairs nest, so end markers
    /// come in reverse order.
    pub fn envelope(&self, spec: &EnvelopeSpec<'_>) -> Envelope {
        let attributes = marker_attributes(spec.id, spec.range, spec.primary);
        let wrap = spec.deferred || !spec.inline;
        let mut envelope = Envelope::default();

        // Deferred content loads every stylesheet through the runtime; in-place
        // content blocks on the first one only.
        if spec.deferred {
            for href in spec.stylesheets {
                envelope.prefix.push_str(&self.load_css(href));
            }
        } else if let Some(href) = spec.stylesheets.first() {
            envelope.prefix.push_str(&self.stylesheet(href));
        }

        for index in spec.range.indices() {
            let script = spec.scripts.get(index - spec.range.low).map(String::as_str).unwrap_or("");
            envelope.prefix.push_str(&self.start(index, script, &attributes));
        }
        if wrap {
            envelope
                .prefix
                .push_str(&format!(r#"<div id="{}">"#, escape_attribute(spec.id)));
            envelope.suffix.push_str("</div>");
        }
        for index in spec.range.indices().rev() {
            let script = spec.scripts.get(index - spec.range.low).map(String::as_str).unwrap_or("");
            envelope.suffix.push_str(&self.end(index, script, &attributes));
        }

        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_literal_cannot_close_element() {
        assert_eq!(js_literal(&json!("</script>")), r#""<\/script>""#);
    }

    #[test]
    fn test_placeholder() {
        assert_eq!(
            Markers::new("Pipe").placeholder(3),
            "<script data-pipe>Pipe.placeholder(3)</script>"
        );
    }

    #[test]
    fn test_in_place_envelope() {
        let markers = Markers::new("Pipe");
        let scripts = vec!["http://a/x.js".to_string()];
        let stylesheets = vec!["http://a/x.css".to_string()];
        let envelope = markers.envelope(&EnvelopeSpec {
            id: "f1",
            range: IndexRange::new(0, 1),
            stylesheets: &stylesheets,
            scripts: &scripts,
            primary: true,
            deferred: false,
            inline: false,
        });

        assert_eq!(
            envelope.prefix,
            concat!(
                r#"<link rel="stylesheet" href="http://a/x.css">"#,
                r#"<script data-pipe>Pipe.start(0, "http://a/x.js", {"id":"f1","range":[0,0],"primary":true})</script>"#,
                r#"<div id="f1">"#
            )
        );
        assert_eq!(
            envelope.suffix,
            concat!(
                "</div>",
                r#"<script data-pipe>Pipe.end(0, "http://a/x.js", {"id":"f1","range":[0,0],"primary":true})</script>"#
            )
        );
    }

    #[test]
    fn test_in_place_envelope_links_first_stylesheet_only() {
        let stylesheets = vec!["a.css".to_string(), "b.css".to_string()];
        let envelope = Markers::new("Pipe").envelope(&EnvelopeSpec {
            id: "f1",
            range: IndexRange::new(0, 1),
            stylesheets: &stylesheets,
            scripts: &[],
            primary: false,
            deferred: false,
            inline: false,
        });
        assert!(envelope.prefix.starts_with(r#"<link rel="stylesheet" href="a.css">"#));
        assert!(!envelope.prefix.contains("b.css"));
    }

    #[test]
    fn test_inline_envelope_has_no_wrapper() {
        let envelope = Markers::new("Pipe").envelope(&EnvelopeSpec {
            id: "f1",
            range: IndexRange::new(2, 0),
            stylesheets: &[],
            scripts: &[],
            primary: false,
            deferred: false,
            inline: true,
        });
        assert!(!envelope.prefix.contains("<div"));
        assert!(envelope.prefix.contains(r#"Pipe.start(2, """#));
        assert!(envelope.suffix.contains(r#"Pipe.end(2, """#));
    }

    #[test]
    fn test_deferred_envelope_uses_load_css_and_wrapper() {
        let stylesheets = vec!["s.css".to_string(), "t.css".to_string()];
        let envelope = Markers::new("Pipe").envelope(&EnvelopeSpec {
            id: "late",
            range: IndexRange::new(0, 0),
            stylesheets: &stylesheets,
            scripts: &[],
            primary: false,
            deferred: true,
            inline: true,
        });
        assert!(envelope.prefix.starts_with(concat!(
            r#"<script data-pipe>Pipe.loadCSS("s.css")</script>"#,
            r#"<script data-pipe>Pipe.loadCSS("t.css")</script>"#
        )));
        assert!(envelope.prefix.ends_with(r#"<div id="late">"#));
    }

    #[test]
    fn test_end_markers_reversed() {
        let scripts: Vec<String> = (0..3).map(|i| format!("{i}.js")).collect();
        let envelope = Markers::new("P").envelope(&EnvelopeSpec {
            id: "x",
            range: IndexRange::new(3, 3),
            stylesheets: &[],
            scripts: &scripts,
            primary: false,
            deferred: false,
            inline: true,
        });
        let five = envelope.suffix.find("P.end(5").unwrap();
        let three = envelope.suffix.find("P.end(3").unwrap();
        assert!(five < three);
        assert_eq!(envelope.prefix.matches("P.start(").count(), 3);
    }
}
