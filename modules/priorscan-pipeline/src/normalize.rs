use std::collections::HashSet;

use priorscan_common::{truncate_chars, Candidate};

use crate::sources::{source_trust, RawHit};

/// Preview length for the pipeline-internal snippet. The persister applies
/// the tighter 500-char bound when building the match row.
const PREVIEW_MAX_CHARS: usize = 1000;

/// Pure mapping from a source-specific raw hit to the canonical candidate
/// shape. Malformed individual fields degrade to defaults; there is no
/// failure path.
pub fn normalize(hit: RawHit) -> Candidate {
    let url = hit.url.unwrap_or_default();
    let trust = source_trust(hit.kind, &url);

    let title = hit
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled innovation".to_string());

    let snippet = hit
        .snippet
        .map(|s| truncate_chars(s.trim(), PREVIEW_MAX_CHARS).to_string())
        .unwrap_or_default();

    Candidate {
        title,
        owner: non_empty_or(hit.owner, "Unknown"),
        country: non_empty_or(hit.country, "Unknown"),
        kind: hit.kind,
        legal_status: non_empty_or(hit.legal_status, hit.kind.default_legal_status()),
        snippet,
        source_url: sanitize_url(&url),
        trust,
        raw: hit.raw,
    }
}

fn non_empty_or(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Drop within-run duplicates by (normalized title, kind), keeping the
/// first arrival. Two sources reporting the same innovation should produce
/// one row, not two.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert((normalize_title(&c.title), c.kind)))
        .collect()
}

fn normalize_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// A match must carry a resolvable absolute http(s) URL: the UI's sole
/// external affordance per result is "visit source".
pub fn valid_http_url(candidate_url: &str) -> bool {
    match url::Url::parse(candidate_url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https"),
        Err(_) => false,
    }
}

/// Strip tracking parameters from URLs before persistence.
pub fn sanitize_url(raw: &str) -> String {
    const TRACKING_PARAMS: &[&str] = &[
        "fbclid", "gclid", "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
        "ref", "mc_cid", "mc_eid",
    ];

    let Ok(mut parsed) = url::Url::parse(raw) else {
        return raw.to_string();
    };

    if parsed.query().is_none() {
        return raw.to_string();
    }

    let clean_pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if clean_pairs.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
    }

    parsed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use priorscan_common::SourceKind;

    fn hit() -> RawHit {
        RawHit {
            title: Some("  Smart irrigation valve  ".to_string()),
            owner: None,
            country: Some("".to_string()),
            kind: SourceKind::Patent,
            legal_status: None,
            snippet: Some("a".repeat(2000)),
            url: Some("https://patents.google.com/patent/US1".to_string()),
            raw: None,
        }
    }

    #[test]
    fn missing_fields_degrade_to_defaults() {
        let c = normalize(hit());
        assert_eq!(c.title, "Smart irrigation valve");
        assert_eq!(c.owner, "Unknown");
        assert_eq!(c.country, "Unknown");
        assert_eq!(c.legal_status, "Granted");
        assert_eq!(c.snippet.chars().count(), PREVIEW_MAX_CHARS);
        assert!(c.trust > 0.9);
    }

    #[test]
    fn missing_title_gets_placeholder() {
        let mut h = hit();
        h.title = None;
        assert_eq!(normalize(h).title, "Untitled innovation");
    }

    #[test]
    fn dedup_keeps_first_arrival_per_title_and_kind() {
        let a = normalize(hit());
        let mut b = normalize(hit());
        b.owner = "Other Corp".to_string();
        let mut c = normalize(hit());
        c.kind = SourceKind::Startup;

        let kept = dedup_candidates(vec![a, b, c]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].owner, "Unknown");
    }

    #[test]
    fn url_validation_requires_absolute_http() {
        assert!(valid_http_url("https://example.com/x"));
        assert!(valid_http_url("http://example.com"));
        assert!(!valid_http_url("ftp://example.com"));
        assert!(!valid_http_url("/relative/path"));
        assert!(!valid_http_url(""));
    }

    #[test]
    fn sanitize_strips_tracking_params_only() {
        let url = "https://example.com/p?utm_source=x&id=42&fbclid=abc";
        assert_eq!(sanitize_url(url), "https://example.com/p?id=42");

        let bare = "https://example.com/p";
        assert_eq!(sanitize_url(bare), bare);
    }
}
