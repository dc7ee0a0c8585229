use std::io::Read;

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum IdentError {
    #[error("identifier byte source failed: {0}")]
    ByteSource(#[from] std::io::Error),
    #[error("identifier byte source exhausted")]
    SourceExhausted,
}

// ---------------------------------------------------------------------------
// Stable identifiers
// ---------------------------------------------------------------------------

/// Alphabet for stable identifiers, indexed by a rejection-sampled byte.
const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Length of a stable identifier in characters.
pub const SID_LEN: usize = 12;

// Largest multiple of the alphabet size that fits in a byte. Bytes at or
// above this threshold are rejected so the modulo mapping stays unbiased.
const REJECT_THRESHOLD: u16 = (256 / ALPHABET.len() as u16) * ALPHABET.len() as u16;

/// Generate a 12-character base-62 stable identifier from a byte source.
///
/// Single bytes are drawn from `source`; any byte that would bias the
/// modulo mapping is discarded and a fresh byte is drawn in its place.
pub fn generate_sid<R: Read>(source: &mut R) -> Result<String, IdentError> {
    let mut out = String::with_capacity(SID_LEN);
    let mut buf = [0u8; 1];
    while out.len() < SID_LEN {
        let n = source.read(&mut buf)?;
        if n == 0 {
            return Err(IdentError::SourceExhausted);
        }
        let byte = buf[0] as u16;
        if byte >= REJECT_THRESHOLD {
            continue;
        }
        out.push(ALPHABET[(byte as usize) % ALPHABET.len()] as char);
    }
    Ok(out)
}

/// Whether a string has the shape of a stable identifier.
pub fn is_sid_shaped(s: &str) -> bool {
    s.len() == SID_LEN && s.bytes().all(|b| b.is_ascii_alphanumeric())
}

// ---------------------------------------------------------------------------
// Slugification
// ---------------------------------------------------------------------------

/// Derive a URL-safe slug from a title.
///
/// The title is decomposed (NFD) and combining marks are dropped, so
/// accented letters fall back to their base form. ASCII letters and digits
/// pass through lowercased; runs of whitespace and hyphens collapse to a
/// single `-`; everything else is dropped. The result never starts or ends
/// with `-` and may be empty.
pub fn slug(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for c in title.nfd() {
        if is_combining_mark(c) {
            continue;
        }
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if c.is_whitespace() || c == '-' {
            if !out.is_empty() && !out.ends_with('-') {
                out.push('-');
            }
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
