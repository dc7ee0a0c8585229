use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

mod numbering;

pub use numbering::{
    MAX_NUMBER, NumberError, compact_numbers, next_sibling, sibling_after, sibling_before,
};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, thiserror::Error)]
pub enum FnameError {
    #[error("filename does not match the outline grammar: {0}")]
    InvalidFilename(String),
    #[error("invalid materialized path: {0}")]
    InvalidMp(String),
}

// ---------------------------------------------------------------------------
// Materialized paths
// ---------------------------------------------------------------------------

/// A node's position in the outline: three-digit sibling numbers from the
/// root down, rendered `100-200-050`. The empty path is the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Mp(Vec<u16>);

impl Mp {
    /// The root position (no segments).
    pub fn root() -> Self {
        Mp(Vec::new())
    }

    pub fn from_segments(segments: Vec<u16>) -> Self {
        Mp(segments)
    }

    /// Parse a non-empty `-`-joined segment list; each segment in 001..999.
    pub fn parse(s: &str) -> Result<Self, FnameError> {
        if s.is_empty() {
            return Err(FnameError::InvalidMp(s.to_string()));
        }
        let mut segments = Vec::new();
        for part in s.split('-') {
            if part.len() != 3 || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(FnameError::InvalidMp(s.to_string()));
            }
            let n: u16 = part.parse().map_err(|_| FnameError::InvalidMp(s.to_string()))?;
            if n == 0 {
                return Err(FnameError::InvalidMp(s.to_string()));
            }
            segments.push(n);
        }
        Ok(Mp(segments))
    }

    /// Whether a string matches the MP grammar.
    pub fn is_mp_shaped(s: &str) -> bool {
        Mp::parse(s).is_ok()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn segments(&self) -> &[u16] {
        &self.0
    }

    /// The sibling number at this position; `None` for the root.
    pub fn last(&self) -> Option<u16> {
        self.0.last().copied()
    }

    /// The enclosing position; the parent of a depth-1 path is the root.
    pub fn parent(&self) -> Mp {
        let mut segments = self.0.clone();
        segments.pop();
        Mp(segments)
    }

    pub fn child(&self, number: u16) -> Mp {
        let mut segments = self.0.clone();
        segments.push(number);
        Mp(segments)
    }

    /// Strict-descendant test: `self` lies somewhere below `other`.
    pub fn is_descendant_of(&self, other: &Mp) -> bool {
        self.0.len() > other.0.len() && self.0[..other.0.len()] == other.0[..]
    }

    /// Re-prefix a path: the leading `old_prefix` segments are replaced by
    /// `new_prefix`. Callers must ensure `self` is `old_prefix` or below it.
    pub fn rebase(&self, old_prefix: &Mp, new_prefix: &Mp) -> Mp {
        let mut segments = new_prefix.0.clone();
        segments.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Mp(segments)
    }
}

impl fmt::Display for Mp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "-")?;
            }
            write!(f, "{seg:03}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Filename grammar
// ---------------------------------------------------------------------------

/// Document role that carries a slug segment in its filename.
pub const DRAFT: &str = "draft";
/// Document role holding a node's working notes.
pub const NOTES: &str = "notes";

static FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(\d{3}(?:-\d{3})*)_([A-Za-z0-9]{12})(?:_([a-z][a-z0-9]*)(?:_([a-z0-9]+(?:-[a-z0-9]+)*))?)?\.md$",
    )
    .unwrap()
});

static DOC_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*$").unwrap());

/// Whether a string is a valid document-type identifier.
pub fn is_valid_doc_type(s: &str) -> bool {
    DOC_TYPE_RE.is_match(s)
}

/// A filename decomposed against the outline grammar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFile {
    /// The on-disk filename this was parsed from.
    pub name: String,
    pub mp: Mp,
    pub sid: String,
    pub doc_type: Option<String>,
    pub slug: Option<String>,
}

impl ParsedFile {
    pub fn depth(&self) -> usize {
        self.mp.depth()
    }

    pub fn is_draft(&self) -> bool {
        self.doc_type.as_deref() == Some(DRAFT)
    }
}

/// Parse a filename against the grammar. Slugs are permitted only on
/// `draft` documents; anything else is rejected whole.
pub fn parse_filename(name: &str) -> Result<ParsedFile, FnameError> {
    let caps = FILENAME_RE
        .captures(name)
        .ok_or_else(|| FnameError::InvalidFilename(name.to_string()))?;
    let mp = Mp::parse(&caps[1]).map_err(|_| FnameError::InvalidFilename(name.to_string()))?;
    let doc_type = caps.get(3).map(|m| m.as_str().to_string());
    let slug = caps.get(4).map(|m| m.as_str().to_string());
    if slug.is_some() && doc_type.as_deref() != Some(DRAFT) {
        return Err(FnameError::InvalidFilename(name.to_string()));
    }
    Ok(ParsedFile {
        name: name.to_string(),
        mp,
        sid: caps[2].to_string(),
        doc_type,
        slug,
    })
}

/// Render the canonical filename for the given parts; the exact inverse of
/// [`parse_filename`]. The slug appears iff the type is `draft` and the
/// slug is non-empty.
pub fn file_name(mp: &Mp, sid: &str, doc_type: Option<&str>, slug: Option<&str>) -> String {
    let mut out = format!("{mp}_{sid}");
    if let Some(dt) = doc_type {
        out.push('_');
        out.push_str(dt);
        if dt == DRAFT {
            if let Some(slug) = slug.filter(|s| !s.is_empty()) {
                out.push('_');
                out.push_str(slug);
            }
        }
    }
    out.push_str(".md");
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_mp() -> impl Strategy<Value = Mp> {
        proptest::collection::vec(1u16..=999, 1..5).prop_map(Mp::from_segments)
    }

    fn arb_sid() -> impl Strategy<Value = String> {
        "[A-Za-z0-9]{12}"
    }

    proptest! {
        #[test]
        fn mp_display_parse_roundtrip(mp in arb_mp()) {
            prop_assert_eq!(Mp::parse(&mp.to_string()).unwrap(), mp);
        }

        #[test]
        fn parse_generate_identity(
            mp in arb_mp(),
            sid in arb_sid(),
            slug in proptest::option::of("[a-z0-9]{1,6}(-[a-z0-9]{1,6}){0,2}"),
        ) {
            let name = file_name(&mp, &sid, Some(DRAFT), slug.as_deref());
            let parsed = parse_filename(&name).unwrap();
            prop_assert_eq!(
                file_name(&parsed.mp, &parsed.sid, parsed.doc_type.as_deref(), parsed.slug.as_deref()),
                name
            );
        }

        #[test]
        fn generate_parse_roundtrip_non_draft(
            mp in arb_mp(),
            sid in arb_sid(),
            doc_type in "[a-z][a-z0-9]{0,7}",
        ) {
            let name = file_name(&mp, &sid, Some(&doc_type), None);
            let parsed = parse_filename(&name).unwrap();
            prop_assert_eq!(parsed.mp, mp);
            prop_assert_eq!(parsed.sid, sid);
            prop_assert_eq!(parsed.doc_type.as_deref(), Some(doc_type.as_str()));
        }
    }
}
