//! Splitting of multi-artist credit strings.
//!
//! Chart feeds credit collaborations in a single text field, e.g.
//! `"Artist A feat. Artist B & Artist C"`. Before any entity matching the
//! credit is broken into individual names, except for known group names
//! that contain a separator themselves ("Simon & Garfunkel", "AC/DC").

use lazy_static::lazy_static;
use regex::Regex;

/// Group names that must never be split. The abbreviations `feat.` and `ft.`
/// only separate with their dot, so names like "Little Feat" need no entry.
pub const DEFAULT_GROUP_NAMES: &[&str] = &[
    "Simon & Garfunkel",
    "Earth, Wind & Fire",
    "Crosby, Stills, Nash & Young",
    "Hall & Oates",
    "Mumford & Sons",
    "Florence + The Machine",
    "Sly & The Family Stone",
    "Kool & The Gang",
    "Peter, Paul and Mary",
    "AC/DC",
];

lazy_static! {
    static ref SEPARATOR_RE: Regex =
        Regex::new(r"(?i)&|,|/|\bfeaturing\b|\bfeat\.|\bft\.")
            .expect("separator regex is valid");
}

/// Splits credit strings using the built-in group allow-list plus any
/// configured extras.
#[derive(Debug, Clone)]
pub struct NameSplitter {
    /// Lower-cased group names, longest first so that a longer group wins
    /// over a shorter one it contains.
    groups: Vec<String>,
}

impl Default for NameSplitter {
    fn default() -> Self {
        Self::new(&[])
    }
}

impl NameSplitter {
    pub fn new(extra_groups: &[String]) -> Self {
        let mut groups: Vec<String> = DEFAULT_GROUP_NAMES
            .iter()
            .map(|g| g.to_string())
            .chain(extra_groups.iter().cloned())
            .map(|g| g.trim().to_ascii_lowercase())
            .filter(|g| !g.is_empty())
            .collect();
        groups.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        groups.dedup();
        Self { groups }
    }

    /// Split a credit string into candidate entity names.
    ///
    /// Names keep their original casing, are trimmed, and appear once each in
    /// order of first occurrence (compared case-insensitively).
    pub fn split(&self, raw: &str) -> Vec<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let lowered = trimmed.to_ascii_lowercase();
        if self.groups.iter().any(|g| *g == lowered) {
            return vec![trimmed.to_string()];
        }

        // Pull embedded group names out first, masking them with a separator
        // so the remaining text splits around them.
        let mut found: Vec<(usize, String)> = Vec::new();
        let mut masked = lowered.clone().into_bytes();
        for group in &self.groups {
            let mut search_from = 0;
            while let Some(offset) = find_from(&masked, group.as_bytes(), search_from) {
                let end = offset + group.len();
                if is_word_boundary(&masked, offset, end) {
                    found.push((offset, trimmed[offset..end].to_string()));
                    masked[offset..end].fill(b',');
                }
                search_from = end;
            }
        }

        // Masked bytes are ASCII commas replacing whole group matches, and
        // lowercase ASCII folding preserves byte offsets, so this is still
        // valid UTF-8 aligned with `trimmed`.
        let masked = String::from_utf8_lossy(&masked).into_owned();
        let mut last = 0;
        for separator in SEPARATOR_RE.find_iter(&masked) {
            found.push((last, trimmed[last..separator.start()].to_string()));
            last = separator.end();
        }
        found.push((last, trimmed[last..].to_string()));

        found.sort_by_key(|(offset, _)| *offset);

        let mut seen: Vec<String> = Vec::new();
        let mut names = Vec::new();
        for (_, piece) in found {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            let key = piece.to_lowercase();
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            names.push(piece.to_string());
        }
        names
    }
}

/// Split with the default allow-list only.
pub fn split_names(raw: &str) -> Vec<String> {
    NameSplitter::default().split(raw)
}

fn find_from(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    if needle.is_empty() || from >= haystack.len() {
        return None;
    }
    haystack[from..]
        .windows(needle.len())
        .position(|window| window == needle)
        .map(|pos| pos + from)
}

fn is_word_boundary(bytes: &[u8], start: usize, end: usize) -> bool {
    let before_ok = start == 0 || !bytes[start - 1].is_ascii_alphanumeric();
    let after_ok = end >= bytes.len() || !bytes[end].is_ascii_alphanumeric();
    before_ok && after_ok
}
