//! Rules for accepted source references.

use regex::Regex;
use reqwest::Url;
use std::sync::OnceLock;

fn share_host_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)^(?:[a-z0-9-]+\.)*(?:dropbox\.com|dropboxusercontent\.com)$")
            .expect("share host pattern is valid")
    })
}

fn is_content_host(host: &str) -> bool {
    let host = host.to_ascii_lowercase();
    host == "dropboxusercontent.com" || host.ends_with(".dropboxusercontent.com")
}

/// Whether `url` points at a Dropbox share or content host.
///
/// The URL is parsed, so credentials or ports cannot disguise another host.
pub fn is_supported_share_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url.trim()) else {
        return false;
    };
    matches!(parsed.scheme(), "http" | "https")
        && parsed.username().is_empty()
        && parsed.password().is_none()
        && parsed
            .host_str()
            .map_or(false, |host| share_host_pattern().is_match(host))
}

/// Rewrite a Dropbox share link into a direct-download link.
///
/// Content-host links pass through untouched, as does anything that is not a
/// Dropbox link. On share links the `dl` query toggle is dropped and every
/// other query parameter is kept.
pub fn to_direct_download(url: &str) -> String {
    let url = url.trim();
    let Ok(mut parsed) = Url::parse(url) else {
        return url.to_string();
    };
    let Some(host) = parsed.host_str().map(str::to_ascii_lowercase) else {
        return url.to_string();
    };
    if is_content_host(&host) || !share_host_pattern().is_match(&host) {
        return url.to_string();
    }

    if host == "www.dropbox.com" && parsed.set_host(Some("dl.dropboxusercontent.com")).is_err() {
        return url.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| key != "dl")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }
    parsed.to_string()
}
