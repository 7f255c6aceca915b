//! Best-effort trade tag recovered from free-form campaign strings.
//!
//! Campaign groups went through several naming conventions
//! (`4h_linkedin_duct`, `nb2_2026-03_trowel_d2`, ...). Classification never
//! fails; anything unrecognised falls through to `DEFAULT_TRADE`. The tag is
//! only used for filtering and reporting and is never stored.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub key: &'static str,
    pub label: &'static str,
}

pub const TRADES: &[Trade] = &[
    Trade { key: "duct", label: "HVAC" },
    Trade { key: "trowel", label: "Masonry & Plastering" },
    Trade { key: "wrench", label: "Plumbing" },
    Trade { key: "spark", label: "Electrical" },
    Trade { key: "hammer", label: "Carpentry" },
    Trade { key: "roller", label: "Painting & Decorating" },
    Trade { key: "shingle", label: "Roofing" },
    Trade { key: "tile", label: "Tiling" },
    Trade { key: "landscape", label: "Landscaping" },
];

pub const DEFAULT_TRADE: &str = "general";

fn registered(segment: &str) -> Option<&'static str> {
    TRADES.iter().find(|t| t.key == segment).map(|t| t.key)
}

/// Leftmost key bounded by underscores, or trailing after an underscore.
fn embedded(s: &str) -> Option<&'static str> {
    s.split('_').skip(1).find_map(registered)
}

/// Segment `n` from the end (0 = last) of an underscore-delimited string.
fn segment_from_end(s: &str, n: usize) -> Option<&str> {
    s.rsplit('_').nth(n).filter(|seg| !seg.is_empty())
}

/// Classifies an ad from its campaign group, UTM campaign and landing path.
/// First match wins, in this order: embedded key, last segment,
/// second-to-last segment, landing path, default.
pub fn classify(campaign_group: &str, utm_campaign: &str, landing_path: &str) -> &'static str {
    let sources = [
        campaign_group.trim().to_ascii_lowercase(),
        utm_campaign.trim().to_ascii_lowercase(),
    ];

    if let Some(key) = sources.iter().find_map(|s| embedded(s)) {
        return key;
    }
    for n in [0, 1] {
        if let Some(key) = sources
            .iter()
            .find_map(|s| segment_from_end(s, n).and_then(registered))
        {
            return key;
        }
    }
    landing_path
        .to_ascii_lowercase()
        .split(|c: char| c == '/' || c == '-' || c == '_' || c == '?')
        .find_map(registered)
        .unwrap_or(DEFAULT_TRADE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_key() {
        assert_eq!(classify("4h_linkedin_duct", "", ""), "duct");
    }

    #[test]
    fn test_key_before_modifier_segment() {
        assert_eq!(classify("nb2_2026-03_trowel_d2", "", ""), "trowel");
        assert_eq!(classify("trowel_d2", "", ""), "trowel");
    }

    #[test]
    fn test_bare_key_and_case() {
        assert_eq!(classify("Wrench", "", ""), "wrench");
        assert_eq!(classify("", "Spring_SPARK", ""), "spark");
    }

    #[test]
    fn test_leftmost_embedded_key_wins() {
        assert_eq!(classify("q2_tile_hammer", "", ""), "tile");
        assert_eq!(classify("q2_hammer_tile", "", ""), "hammer");
        assert_eq!(classify("", "x_landscape_duct_2026", ""), "landscape");
    }

    #[test]
    fn test_campaign_group_wins_over_utm() {
        assert_eq!(classify("q2_tile", "q2_hammer", ""), "tile");
        assert_eq!(classify("brand_awareness", "q2_hammer", ""), "hammer");
    }

    #[test]
    fn test_landing_path_fallback() {
        assert_eq!(classify("brand", "", "/trades/roller-pros"), "roller");
        assert_eq!(classify("brand", "spring", "/lp/shingle"), "shingle");
    }

    #[test]
    fn test_unrecognised_falls_back_to_default() {
        assert_eq!(classify("", "", ""), DEFAULT_TRADE);
        assert_eq!(classify("ducts_only", "", "/home"), DEFAULT_TRADE);
    }
}
