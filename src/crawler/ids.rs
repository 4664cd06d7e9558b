//! Identity extraction from site URLs
//!
//! Note ids live after `/explore/` or `/note/`, author ids after
//! `/profile/`. The segment ends at the query string; tracking parameters
//! (`xsec_token` and friends) never become part of an identity.

/// Extract the note id from a note link, empty if the URL carries neither
/// recognized path form.
#[must_use]
pub fn note_id_from_url(url: &str) -> String {
    segment_after(url, "/explore/")
        .or_else(|| segment_after(url, "/note/"))
        .unwrap_or_default()
}

/// Extract the author id from a profile link, empty on any other URL.
#[must_use]
pub fn user_id_from_url(url: &str) -> String {
    segment_after(url, "/profile/").unwrap_or_default()
}

/// The path segment immediately following `marker`, cut at `?`
fn segment_after(url: &str, marker: &str) -> Option<String> {
    let (_, rest) = url.split_once(marker)?;
    let end = rest.find(['?', '/']).unwrap_or(rest.len());
    Some(rest[..end].to_string())
}
