//! Stock photo lookup for `{{PEXELS:query}}`. Always yields a URL.

/// Used when no keyword matches.
pub const GENERIC_PHOTO_ID: u32 = 1103970;

/// Keyword to photo id. Earlier rows win.
const PHOTOS: &[(&str, u32)] = &[
    ("stadium", 270085),
    ("football", 399187),
    ("soccer", 46798),
    ("basketball", 1752757),
    ("baseball", 209977),
    ("hockey", 6847503),
    ("tennis", 5739100),
    ("golf", 274263),
    ("crowd", 1190298),
    ("city", 466685),
    ("skyline", 1519088),
    ("night", 1402787),
    ("sunset", 1237119),
    ("weather", 1118873),
    ("storm", 1162251),
    ("rain", 110874),
    ("snow", 688660),
    ("beach", 1032650),
    ("mountain", 417173),
    ("forest", 957024),
    ("ocean", 1001682),
    ("news", 518543),
    ("studio", 2510428),
    ("election", 1550337),
    ("finance", 6801648),
    ("stock", 6770610),
    ("technology", 373543),
    ("space", 1169754),
    ("abstract", 2693212),
    ("money", 259027),
];

/// The first keyword contained in the query wins.
pub fn photo_id(query: &str) -> u32 {
    let q = query.to_lowercase();
    PHOTOS
        .iter()
        .find(|(keyword, _)| q.contains(keyword))
        .map(|(_, id)| *id)
        .unwrap_or(GENERIC_PHOTO_ID)
}

pub fn resolve(query: &str) -> String {
    photo_url(photo_id(query))
}

pub fn photo_url(id: u32) -> String {
    format!("https://images.pexels.com/photos/{id}/pexels-photo-{id}.jpeg?auto=compress&cs=tinysrgb&w=1920")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(photo_id("Night CITY skyline"), 466685);
        assert_eq!(photo_id("a packed football stadium"), 270085);
        assert_eq!(photo_id("quarterly report"), GENERIC_PHOTO_ID);
        assert!(resolve("").contains("/photos/1103970/"));
    }
}
