//! Heads and bodies of document responses.

use bytes::Bytes;
use edge_core::{ComposeConfig, RequestId, ResponseHead, TemplateError};
use edge_data::{header_names, AssetLinks};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Body of a failed response when the error carries no message for users.
pub const GENERIC_FAILURE: &str = "Internal Server Error";

/// Headers forwarded verbatim from the primary fragment.
const FORWARDED: [HeaderName; 2] = [header::CONTENT_TYPE, header::LOCATION];

fn base_headers(request_id: &RequestId) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
        headers.insert(header_names::X_REQUEST_ID, value);
    }
    headers
}

/// Head of a composed document.
///
/// Without a primary fragment the document is a plain 200. Otherwise the
/// primary's status, content type and location are used, and its retained
/// assets are announced for preloading.
pub fn document_head(
    primary: Option<&ResponseHead>,
    config: &ComposeConfig,
    request_id: &RequestId,
) -> ResponseHead {
    let mut head = ResponseHead::new(StatusCode::OK);
    head.headers = base_headers(request_id);

    let Some(primary) = primary else {
        return head;
    };
    head.status = primary.status;
    for name in FORWARDED {
        if let Some(value) = primary.headers.get(&name) {
            head.headers.insert(name, value.clone());
        }
    }

    let assets = AssetLinks::from_headers(
        &primary.headers,
        &config.asset_link_headers,
        config.max_asset_links,
    );
    if let Some(link) = preload_header(&assets) {
        head.headers.insert(header::LINK, link);
    }
    head
}

/// `Link` header value preloading stylesheets, then scripts.
pub fn preload_header(assets: &AssetLinks) -> Option<HeaderValue> {
    let styles = assets
        .stylesheets
        .iter()
        .map(|uri| format!(r#"<{uri}>; rel="preload"; as="style""#));
    let scripts = assets
        .scripts
        .iter()
        .map(|uri| format!(r#"<{uri}>; rel="preload"; as="script""#));
    let entries: Vec<String> = styles.chain(scripts).collect();

    if entries.is_empty() {
        return None;
    }
    HeaderValue::from_str(&entries.join(", ")).ok()
}

/// Head of a response that failed before anything was sent.
pub fn failure_head(request_id: &RequestId) -> ResponseHead {
    let mut head = ResponseHead::new(StatusCode::INTERNAL_SERVER_ERROR);
    head.headers = base_headers(request_id);
    head
}

/// Body for a failed template retrieval.
pub fn template_failure_body(error: &TemplateError) -> Bytes {
    Bytes::from(
        error
            .presentable_message()
            .unwrap_or(GENERIC_FAILURE)
            .to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(status: u16, headers: &[(&str, &str)]) -> ResponseHead {
        let mut head = ResponseHead::new(StatusCode::from_u16(status).unwrap());
        for (name, value) in headers {
            head.headers.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        head
    }

    #[test]
    fn test_document_without_primary() {
        let head = document_head(None, &ComposeConfig::default(), &RequestId::from_string("r1"));
        assert_eq!(head.status, StatusCode::OK);
        assert_eq!(head.headers["cache-control"], "no-cache, no-store, must-revalidate");
        assert_eq!(head.headers["pragma"], "no-cache");
        assert_eq!(head.headers["content-type"], DEFAULT_CONTENT_TYPE);
        assert_eq!(head.headers["x-request-id"], "r1");
        assert!(head.headers.get("link").is_none());
    }

    #[test]
    fn test_primary_status_and_subset_forwarded() {
        let upstream = primary(
            302,
            &[
                ("location", "/login"),
                ("content-type", "text/html"),
                ("set-cookie", "a=b"),
            ],
        );
        let head = document_head(
            Some(&upstream),
            &ComposeConfig::default(),
            &RequestId::from_string("r1"),
        );
        assert_eq!(head.status, StatusCode::FOUND);
        assert_eq!(head.headers["location"], "/login");
        assert_eq!(head.headers["content-type"], "text/html");
        assert!(head.headers.get("set-cookie").is_none());
    }

    #[test]
    fn test_preload_from_primary_assets() {
        let upstream = primary(
            200,
            &[(
                "link",
                r#"<http://a/1.js>; rel="fragment-script", <http://a/2.js>; rel="fragment-script", <http://a/s.css>; rel="stylesheet""#,
            )],
        );
        let head = document_head(
            Some(&upstream),
            &ComposeConfig::default(),
            &RequestId::from_string("r1"),
        );
        assert_eq!(
            head.headers["link"],
            r#"<http://a/s.css>; rel="preload"; as="style", <http://a/1.js>; rel="preload"; as="script""#
        );
    }

    #[test]
    fn test_template_failure_body() {
        let missing = TemplateError::NotFound("/x".to_string());
        assert_eq!(template_failure_body(&missing), GENERIC_FAILURE);
        let bad = TemplateError::presentable("slot loop", "Page unavailable");
        assert_eq!(template_failure_body(&bad), "Page unavailable");
        assert_eq!(
            failure_head(&RequestId::from_string("r")).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
