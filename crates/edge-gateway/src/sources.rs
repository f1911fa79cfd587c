//! Template and context retrieval.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use edge_core::{CompositionContext, ContextError, RequestId, TemplateError};
use http::HeaderMap;

use crate::config::TemplatesConfig;

/// The parts of an inbound request that sources may look at.
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub path: String,
    pub headers: HeaderMap,
    pub request_id: RequestId,
}

impl RequestInfo {
    /// Describe a request, reusing its `x-request-id` when present.
    pub fn new(path: impl Into<String>, headers: HeaderMap) -> Self {
        let request_id = RequestId::from_headers(&headers);
        Self {
            path: path.into(),
            headers,
            request_id,
        }
    }
}

/// A page template, optionally merged into a base template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateSet {
    pub base: String,
    /// Child content distributed into the base template's slots.
    pub child: Option<String>,
}

impl TemplateSet {
    /// A template with no child.
    pub fn single(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            child: None,
        }
    }
}

/// Finds the template for a request.
#[async_trait]
pub trait TemplateSource: Send + Sync {
    async fn fetch(&self, request: &RequestInfo) -> Result<TemplateSet, TemplateError>;
}

/// Finds the composition context for a request.
#[async_trait]
pub trait ContextSource: Send + Sync {
    async fn fetch(&self, request: &RequestInfo) -> Result<CompositionContext, ContextError>;
}

/// Templates read from a directory.
///
/// `/` maps to `index.<ext>`, `/a/b` to `a/b.<ext>`. With a base template
/// configured, the page file becomes the base template's child.
#[derive(Debug, Clone)]
pub struct FileTemplateSource {
    root: PathBuf,
    base_template: Option<String>,
    extension: String,
}

impl FileTemplateSource {
    pub fn new(config: &TemplatesConfig) -> Self {
        Self {
            root: config.path.clone(),
            base_template: config.base_template.clone(),
            extension: config.extension.clone(),
        }
    }

    /// File backing a request path, or `None` if the path leaves the root.
    pub fn template_path(&self, request_path: &str) -> Option<PathBuf> {
        let trimmed = request_path.split('?').next().unwrap_or_default().trim_matches('/');
        let name = if trimmed.is_empty() { "index" } else { trimmed };

        let safe = name
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        if !safe || name.contains('\\') {
            return None;
        }

        Some(self.root.join(format!("{name}.{}", self.extension)))
    }

    async fn read(path: &Path, label: &str) -> Result<String, TemplateError> {
        tokio::fs::read_to_string(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                TemplateError::NotFound(label.to_string())
            } else {
                TemplateError::Read {
                    path: path.display().to_string(),
                    source,
                }
            }
        })
    }
}

#[async_trait]
impl TemplateSource for FileTemplateSource {
    async fn fetch(&self, request: &RequestInfo) -> Result<TemplateSet, TemplateError> {
        let path = self.template_path(&request.path).ok_or_else(|| {
            tracing::debug!(request_id = %request.request_id, path = %request.path, "Rejected template path");
            TemplateError::NotFound(request.path.clone())
        })?;
        let page = Self::read(&path, &request.path).await?;

        match &self.base_template {
            Some(base) => {
                let base_path = self.root.join(base);
                let base = Self::read(&base_path, base).await.map_err(|err| match err {
                    // A missing base is a deployment problem, not a missing page.
                    TemplateError::NotFound(name) => TemplateError::presentable(
                        format!("base template {name} is missing"),
                        "Internal Server Error",
                    ),
                    other => other,
                })?;
                Ok(TemplateSet {
                    base,
                    child: Some(page),
                })
            }
            None => Ok(TemplateSet::single(page)),
        }
    }
}

/// Templates held in memory, keyed by request path.
#[derive(Debug, Clone, Default)]
pub struct StaticTemplates {
    templates: HashMap<String, TemplateSet>,
}

impl StaticTemplates {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `template` for `path`.
    pub fn with(mut self, path: impl Into<String>, template: TemplateSet) -> Self {
        self.templates.insert(path.into(), template);
        self
    }
}

#[async_trait]
impl TemplateSource for StaticTemplates {
    async fn fetch(&self, request: &RequestInfo) -> Result<TemplateSet, TemplateError> {
        let path = request.path.split('?').next().unwrap_or_default();
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| TemplateError::NotFound(path.to_string()))
    }
}

/// Every request gets an empty context.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

#[async_trait]
impl ContextSource for NoContext {
    async fn fetch(&self, _request: &RequestInfo) -> Result<CompositionContext, ContextError> {
        Ok(CompositionContext::default())
    }
}

/// Every request gets the same context.
#[derive(Debug, Clone, Default)]
pub struct StaticContext(pub CompositionContext);

#[async_trait]
impl ContextSource for StaticContext {
    async fn fetch(&self, _request: &RequestInfo) -> Result<CompositionContext, ContextError> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, content).unwrap();
    }

    fn source(root: &Path, base: Option<&str>) -> FileTemplateSource {
        FileTemplateSource::new(&TemplatesConfig {
            path: root.to_path_buf(),
            base_template: base.map(str::to_string),
            extension: "html".to_string(),
        })
    }

    fn request(path: &str) -> RequestInfo {
        RequestInfo::new(path, HeaderMap::new())
    }

    #[test]
    fn test_path_mapping() {
        let source = source(Path::new("/t"), None);
        assert_eq!(source.template_path("/"), Some(PathBuf::from("/t/index.html")));
        assert_eq!(source.template_path("/shop/cart/"), Some(PathBuf::from("/t/shop/cart.html")));
        assert_eq!(source.template_path("/a?x=1"), Some(PathBuf::from("/t/a.html")));
    }

    #[test]
    fn test_traversal_rejected() {
        let source = source(Path::new("/t"), None);
        assert_eq!(source.template_path("/../etc/passwd"), None);
        assert_eq!(source.template_path("/a/./b"), None);
        assert_eq!(source.template_path("/a\\..\\b"), None);
    }

    #[tokio::test]
    async fn test_reads_page() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.html", "<p>home</p>");

        let set = source(dir.path(), None).fetch(&request("/")).await.unwrap();
        assert_eq!(set, TemplateSet::single("<p>home</p>"));
    }

    #[tokio::test]
    async fn test_missing_page_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = source(dir.path(), None).fetch(&request("/nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_base_template_takes_page_as_child() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.html", "<body><slot></slot></body>");
        write(&dir, "shop/item.html", "<p>item</p>");

        let set = source(dir.path(), Some("base.html"))
            .fetch(&request("/shop/item"))
            .await
            .unwrap();
        assert_eq!(set.base, "<body><slot></slot></body>");
        assert_eq!(set.child.as_deref(), Some("<p>item</p>"));
    }

    #[tokio::test]
    async fn test_missing_base_is_not_a_missing_page() {
        let dir = TempDir::new().unwrap();
        write(&dir, "index.html", "x");

        let err = source(dir.path(), Some("base.html"))
            .fetch(&request("/"))
            .await
            .unwrap_err();
        assert!(!err.is_not_found());
        assert_eq!(err.presentable_message(), Some("Internal Server Error"));
    }

    #[tokio::test]
    async fn test_static_sources() {
        let templates = StaticTemplates::new().with("/a", TemplateSet::single("A"));
        assert_eq!(templates.fetch(&request("/a?q")).await.unwrap().base, "A");
        assert!(templates.fetch(&request("/b")).await.unwrap_err().is_not_found());

        let context = CompositionContext::new().with_override("timeout", "5");
        let fetched = StaticContext(context.clone()).fetch(&request("/")).await.unwrap();
        assert_eq!(fetched, context);
        assert_eq!(NoContext.fetch(&request("/")).await.unwrap(), CompositionContext::default());
    }
}
