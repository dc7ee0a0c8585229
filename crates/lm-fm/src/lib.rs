use serde_yaml::Value;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum FmError {
    #[error("frontmatter block is not closed by a `---` line")]
    UnclosedFrontmatter,
    #[error("frontmatter is not valid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("frontmatter is not a mapping")]
    NotAMapping,
    #[error("frontmatter `title` is not a string")]
    TitleNotString,
}

// ---------------------------------------------------------------------------
// Splitting
// ---------------------------------------------------------------------------

const DELIMITER: &str = "---";

/// Split a document into its frontmatter YAML and body.
///
/// Frontmatter is present iff the document starts with a `---` line; the
/// block runs until the next `---` on its own line. A document that opens
/// a block and never closes it is an error. Documents without frontmatter
/// return `("", doc)`.
pub fn split(doc: &str) -> Result<(&str, &str), FmError> {
    let Some(rest) = doc
        .strip_prefix("---\n")
        .or_else(|| doc.strip_prefix("---\r\n"))
    else {
        return Ok(("", doc));
    };

    let close = find_closing_delimiter(rest).ok_or(FmError::UnclosedFrontmatter)?;
    let yaml = &rest[..close];
    let after = &rest[close + DELIMITER.len()..];
    let body = after
        .strip_prefix('\n')
        .or_else(|| after.strip_prefix("\r\n"))
        .unwrap_or(after);
    Ok((yaml, body))
}

/// Byte offset of a closing `---` sitting on its own line.
fn find_closing_delimiter(s: &str) -> Option<usize> {
    let mut offset = 0;
    for line in s.split_inclusive('\n') {
        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        if trimmed == DELIMITER {
            return Some(offset);
        }
        offset += line.len();
    }
    None
}

// ---------------------------------------------------------------------------
// Title access
// ---------------------------------------------------------------------------

/// Extract the `title` scalar from a document's frontmatter.
///
/// Returns `None` when there is no frontmatter or no `title` key. Fails on
/// malformed YAML and on a `title` of any non-string kind.
pub fn get_title(doc: &str) -> Result<Option<String>, FmError> {
    let (yaml, _) = split(doc)?;
    if yaml.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_yaml::from_str(yaml)?;
    let map = match value {
        // A comment-only block parses to null; treat it as no keys.
        Value::Null => return Ok(None),
        Value::Mapping(map) => map,
        _ => return Err(FmError::NotAMapping),
    };
    match map.get(&Value::String("title".into())) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(FmError::TitleNotString),
    }
}

/// Rewrite a document so its frontmatter `title` equals `new_title`.
///
/// Every other frontmatter line survives byte-for-byte: an existing title
/// is replaced on the line where its key begins, a missing title is
/// appended just before the closing delimiter, and a document with no
/// frontmatter gains a block containing only the title.
pub fn set_title(doc: &str, new_title: &str) -> Result<String, FmError> {
    let (yaml, body) = split(doc)?;
    let title_line = format!("title: {}", encode_scalar(new_title));

    if !has_frontmatter(doc) {
        return Ok(format!("---\n{title_line}\n---\n{doc}"));
    }

    // Parse to learn whether a title key exists at all; the edit itself is
    // textual so comments and key order survive.
    let has_title = if yaml.trim().is_empty() {
        false
    } else {
        match serde_yaml::from_str::<Value>(yaml)? {
            Value::Null => false,
            Value::Mapping(map) => map.contains_key(&Value::String("title".into())),
            _ => return Err(FmError::NotAMapping),
        }
    };

    let new_yaml = if has_title {
        replace_title_line(yaml, &title_line)
    } else {
        let mut out = yaml.to_string();
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&title_line);
        out.push('\n');
        out
    };

    Ok(format!("---\n{new_yaml}---\n{body}"))
}

fn has_frontmatter(doc: &str) -> bool {
    doc.starts_with("---\n") || doc.starts_with("---\r\n")
}

/// Replace the first column-0 `title:` line, keeping all others verbatim.
fn replace_title_line(yaml: &str, title_line: &str) -> String {
    let mut out = String::with_capacity(yaml.len() + title_line.len());
    let mut replaced = false;
    for line in yaml.split_inclusive('\n') {
        if !replaced && is_title_key_line(line) {
            out.push_str(title_line);
            out.push('\n');
            replaced = true;
        } else {
            out.push_str(line);
        }
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// Whether a raw frontmatter line introduces a top-level `title` key.
fn is_title_key_line(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("title") else {
        return false;
    };
    rest.trim_start_matches([' ', '\t']).starts_with(':')
}

// ---------------------------------------------------------------------------
// Scalar encoding
// ---------------------------------------------------------------------------

/// Encode a title for embedding as a single-line YAML scalar.
///
/// Harmless values pass verbatim. Values containing `\n`, `:`, `"` or `\`,
/// or starting with `#`, become a double-quoted scalar with those
/// characters escaped; when the value contains a newline, colons are
/// written as `\x3a` so no layered re-parse can misread a colon mid-line.
/// This is the only guard against title-based YAML injection.
pub fn encode_scalar(s: &str) -> String {
    let needs_quoting =
        s.contains(['\n', ':', '"', '\\']) || s.starts_with('#');
    if !needs_quoting {
        return s.to_string();
    }
    let escape_colons = s.contains('\n');
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            ':' if escape_colons => out.push_str("\\x3a"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
