//! Preview routing table.
//!
//! Maps a file path to its public URL. Routes are tried in order; the first
//! whose glob pattern matches wins. URL templates understand:
//! - `{path}`: file path without extension
//! - `{dir}`: parent directory
//! - `{slug}`: file stem (`index` renders as empty)

use glob::{MatchOptions, Pattern};
use log::warn;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewRoute {
    /// Glob over file paths, e.g. `content/posts/*.md`
    pub pattern: String,
    /// URL template, e.g. `/blog/{slug}/`
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    pub base_url: String,
    #[serde(default)]
    pub routes: Vec<PreviewRoute>,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

impl PreviewConfig {
    /// Public URL for `path`, or None if no route matches.
    pub fn url_for(&self, path: &str) -> Option<String> {
        let route = self.routes.iter().find(|route| match Pattern::new(&route.pattern) {
            Ok(pattern) => pattern.matches_with(path, MATCH_OPTIONS),
            Err(e) => {
                warn!("Invalid preview route pattern {:?}: {}", route.pattern, e);
                false
            }
        })?;

        let rendered = render_template(&route.url, path);
        // Absolute templates point off-site and ignore the base URL
        if let Some((scheme, rest)) = rendered.split_once("://") {
            let (host, tail) = rest.split_once('/').unwrap_or((rest, ""));
            return Some(format!("{}://{}/{}", scheme, host, collapse_slashes(tail)));
        }
        let base = self.base_url.trim_end_matches('/');
        Some(format!("{}/{}", base, collapse_slashes(rendered.trim_start_matches('/'))))
    }
}

fn render_template(template: &str, path: &str) -> String {
    let without_ext = match path.rsplit_once('.') {
        Some((stem, ext)) if !ext.contains('/') => stem,
        _ => path,
    };
    let (dir, stem) = without_ext.rsplit_once('/').unwrap_or(("", without_ext));
    let slug = if stem == "index" { "" } else { stem };

    template
        .replace("{path}", without_ext)
        .replace("{dir}", dir)
        .replace("{slug}", slug)
}

/// Empty substitutions leave doubled separators behind; only ever applied
/// to the path part of a URL.
fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch == '/' && out.ends_with('/') {
            continue;
        }
        out.push(ch);
    }
    out.trim_start_matches('/').to_string()
}
