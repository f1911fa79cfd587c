//! Show how a template is tokenized.

use anyhow::{Context as _, Result};
use edge_core::Token;
use edge_template::{RenderMode, TemplateParser};
use serde_json::{json, Value};

use super::TokensArgs;
use crate::context::Context;
use crate::output::preview;

/// Run the tokens command.
pub async fn run(args: TokensArgs, ctx: &Context) -> Result<()> {
    let base_path = ctx.resolve_path(&args.base);
    let base = std::fs::read_to_string(&base_path)
        .with_context(|| format!("Failed to read template: {}", base_path.display()))?;
    let child = match &args.child {
        Some(path) => {
            let path = ctx.resolve_path(path);
            Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read template: {}", path.display()))?,
            )
        }
        None => None,
    };
    let mode = if args.fragment {
        RenderMode::Fragment
    } else {
        RenderMode::Document
    };

    let parsed = TemplateParser::new(&ctx.config.compose)
        .parse(&base, child.as_deref(), mode)
        .with_context(|| format!("Failed to tokenize template: {}", args.base))?;

    if ctx.output.is_json() {
        let tokens: Vec<Value> = parsed.tokens.iter().map(token_json).collect();
        let warnings: Vec<String> = parsed.warnings.iter().map(|w| w.to_string()).collect();
        ctx.output.json(&json!({ "tokens": tokens, "warnings": warnings }));
        return Ok(());
    }

    ctx.output.header(&format!("{} ({} tokens)", args.base, parsed.tokens.len()));
    for (position, token) in parsed.tokens.iter().enumerate() {
        let (kind, detail) = describe(token);
        ctx.output.token(position, kind, &detail);
    }
    for warning in &parsed.warnings {
        ctx.output.warn(&warning.to_string());
    }
    Ok(())
}

fn describe(token: &Token) -> (&'static str, String) {
    match token {
        Token::Literal(bytes) => ("literal", preview(&String::from_utf8_lossy(bytes), 72)),
        Token::OpenTag {
            name,
            attributes,
            self_closing,
        } => {
            let attrs: String = attributes
                .iter()
                .map(|a| format!(r#" {}="{}""#, a.name, a.value))
                .collect();
            let close = if *self_closing { " /" } else { "" };
            ("open", format!("<{name}{attrs}{close}>"))
        }
        Token::CloseTag { name } => ("close", format!("</{name}>")),
        Token::Placeholder(kind) => ("placeholder", kind.name().to_string()),
    }
}

fn token_json(token: &Token) -> Value {
    match token {
        Token::Literal(bytes) => json!({ "literal": String::from_utf8_lossy(bytes) }),
        Token::OpenTag {
            name,
            attributes,
            self_closing,
        } => {
            let attributes: serde_json::Map<String, Value> = attributes
                .iter()
                .map(|a| (a.name.clone(), Value::String(a.value.clone())))
                .collect();
            json!({ "name": name, "attributes": attributes, "selfClosing": self_closing })
        }
        Token::CloseTag { name } => json!({ "closingTag": name }),
        Token::Placeholder(kind) => json!({ "placeholder": kind.name() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edge_core::{Attribute, PlaceholderKind};

    #[test]
    fn test_structured_token_json() {
        let open = Token::OpenTag {
            name: "fragment".to_string(),
            attributes: vec![Attribute::new("src", "http://a/")],
            self_closing: false,
        };
        assert_eq!(
            token_json(&open),
            json!({ "name": "fragment", "attributes": { "src": "http://a/" }, "selfClosing": false })
        );
        assert_eq!(
            token_json(&Token::CloseTag {
                name: "fragment".to_string()
            }),
            json!({ "closingTag": "fragment" })
        );
        assert_eq!(
            token_json(&Token::Placeholder(PlaceholderKind::Deferred)),
            json!({ "placeholder": "deferred" })
        );
    }

    #[test]
    fn test_describe() {
        let (kind, detail) = describe(&Token::literal("<p>\n</p>"));
        assert_eq!(kind, "literal");
        assert_eq!(detail, "<p>\\n</p>");
    }
}
