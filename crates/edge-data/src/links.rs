//! Asset-link header parsing.
//!
//! Fragments announce their stylesheet and script dependencies through a
//! `Link`-style header: `<uri>; rel="relation"[; other-params], ...`.

use http::HeaderMap;

/// One parsed `Link` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLink {
    /// Target URI, as written.
    pub uri: String,
    /// The `rel` parameter, never empty.
    pub rel: String,
}

/// Relations the gateway acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetRelation {
    Stylesheet,
    FragmentScript,
}

impl AssetRelation {
    /// Match a `rel` value.
    pub fn from_rel(rel: &str) -> Option<Self> {
        match rel.trim().to_ascii_lowercase().as_str() {
            "stylesheet" => Some(Self::Stylesheet),
            "fragment-script" => Some(Self::FragmentScript),
            _ => None,
        }
    }
}

/// Split on `separator` where it is outside `<...>` and `"..."`.
fn split_outside(value: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_angle = false;
    let mut in_quote = false;
    let mut start = 0;

    for (i, c) in value.char_indices() {
        match c {
            '"' if !in_angle => in_quote = !in_quote,
            '<' if !in_quote => in_angle = true,
            '>' if !in_quote => in_angle = false,
            c if c == separator && !in_angle && !in_quote => {
                parts.push(&value[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}

fn parse_entry(entry: &str) -> Option<AssetLink> {
    let entry = entry.trim().strip_prefix('<')?;
    let end = entry.find('>')?;
    let uri = entry[..end].trim();
    if uri.is_empty() {
        return None;
    }

    let rel = split_outside(&entry[end + 1..], ';')
        .into_iter()
        .filter_map(|param| param.split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("rel"))
        .map(|(_, value)| value.trim().trim_matches('"').trim().to_string())
        .filter(|rel| !rel.is_empty())?;

    Some(AssetLink {
        uri: uri.to_string(),
        rel,
    })
}

/// Parse a `Link` header value. Unparseable entries and entries without a
/// `rel` are dropped; order is preserved.
pub fn parse_link_header(value: &str) -> Vec<AssetLink> {
    split_outside(value, ',')
        .into_iter()
        .filter_map(parse_entry)
        .collect()
}

/// The assets of one fragment response, capped per relation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetLinks {
    /// Stylesheet URIs in header order.
    pub stylesheets: Vec<String>,
    /// Fragment script URIs in header order.
    pub scripts: Vec<String>,
}

impl AssetLinks {
    /// Read assets from the first of `header_names` present on the response,
    /// keeping at most `max_per_relation` of each kind.
    pub fn from_headers<S: AsRef<str>>(
        headers: &HeaderMap,
        header_names: &[S],
        max_per_relation: usize,
    ) -> Self {
        let value = header_names
            .iter()
            .filter_map(|name| headers.get(name.as_ref()))
            .filter_map(|value| value.to_str().ok())
            .find(|value| !value.trim().is_empty());

        match value {
            Some(value) => Self::from_links(parse_link_header(value), max_per_relation),
            None => Self::default(),
        }
    }

    /// Sort parsed links by relation, keeping at most `max_per_relation`.
    pub fn from_links(links: Vec<AssetLink>, max_per_relation: usize) -> Self {
        let mut assets = Self::default();
        for link in links {
            let target = match AssetRelation::from_rel(&link.rel) {
                Some(AssetRelation::Stylesheet) => &mut assets.stylesheets,
                Some(AssetRelation::FragmentScript) => &mut assets.scripts,
                None => continue,
            };
            if target.len() < max_per_relation {
                target.push(link.uri);
            }
        }
        assets
    }

    /// Check if there are no assets.
    pub fn is_empty(&self) -> bool {
        self.stylesheets.is_empty() && self.scripts.is_empty()
    }
}
