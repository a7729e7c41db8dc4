//! Helpers for sanitizing data before it enters log lines and span fields.
//!
//! Storage paths can embed customer names and public URLs can carry signed
//! query strings, so only the harmless parts are logged.

use std::path::Path;

use reqwest::Url;

/// Returns only the filename component of a path (no directory).
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

/// Strips credentials, query string and fragment from a URL.
///
/// - `https://user:pw@cdn.example.com/a.mp4?token=x` → `https://****@cdn.example.com/a.mp4`
/// - `https://cdn.example.com/a.mp4?sig=abc` → `https://cdn.example.com/a.mp4`
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return "<invalid url>".to_string();
    };

    let had_userinfo = !parsed.username().is_empty() || parsed.password().is_some();
    parsed.set_query(None);
    parsed.set_fragment(None);
    if had_userinfo {
        // Fails only for cannot-be-a-base URLs, which carry no userinfo.
        let _ = parsed.set_password(None);
        let _ = parsed.set_username("****");
    }

    parsed.to_string()
}
