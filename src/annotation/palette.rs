//! Marker palette: the user's ordered list of marker glyphs

use serde::{Deserialize, Serialize};

/// Storage key of the palette
pub const PALETTE_KEY: &str = "emoji-palette";

/// Palette used until the reader edits it
pub const DEFAULT_MARKERS: &[&str] = &["❤", "⭐", "😂", "😭", "🔥", "💡"];

/// Ordered, duplicate-free list of marker glyphs. Global, not per work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarkerPalette(Vec<String>);

impl Default for MarkerPalette {
    fn default() -> Self {
        Self::new(DEFAULT_MARKERS.iter().copied())
    }
}

impl MarkerPalette {
    /// Build a palette, trimming entries and dropping blanks and repeats
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut palette = Self(Vec::new());
        for m in markers {
            palette.add(m.as_ref());
        }
        palette
    }

    pub fn markers(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, marker: &str) -> bool {
        self.0.iter().any(|m| m == marker.trim())
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Append a marker. Returns false if it is blank or already present.
    pub fn add(&mut self, marker: &str) -> bool {
        let marker = marker.trim();
        if marker.is_empty() || self.contains(marker) {
            return false;
        }
        self.0.push(marker.to_string());
        true
    }

    /// Remove a marker. Returns false if it was not present.
    pub fn remove(&mut self, marker: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|m| m != marker.trim());
        self.0.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette_is_seeded() {
        let palette = MarkerPalette::default();
        assert_eq!(palette.len(), DEFAULT_MARKERS.len());
        assert_eq!(palette.first(), Some("❤"));
    }

    #[test]
    fn test_add_skips_blanks_and_duplicates() {
        let mut palette = MarkerPalette::new(["❤"]);
        assert!(!palette.add("  "));
        assert!(!palette.add(" ❤ "));
        assert!(palette.add("🌙"));
        assert_eq!(palette.markers(), &["❤".to_string(), "🌙".to_string()]);
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut palette = MarkerPalette::new(["a", "b", "c"]);
        assert!(palette.remove("b"));
        assert!(!palette.remove("b"));
        assert_eq!(palette.markers(), &["a".to_string(), "c".to_string()]);
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let palette = MarkerPalette::new(["x", "y"]);
        assert_eq!(serde_json::to_string(&palette).unwrap(), r#"["x","y"]"#);
    }
}
