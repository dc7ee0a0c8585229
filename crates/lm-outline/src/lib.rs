use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;

use lm_fname::{DRAFT, Mp, NOTES, ParsedFile, parse_filename};

// ---------------------------------------------------------------------------
// Findings
// ---------------------------------------------------------------------------

/// What a validation pass observed about the outline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    InvalidFilename,
    DuplicateSid,
    MissingDocType,
    SlugDrift,
    MalformedFrontmatter,
    MissingReservation,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::InvalidFilename => write!(f, "invalid_filename"),
            FindingKind::DuplicateSid => write!(f, "duplicate_sid"),
            FindingKind::MissingDocType => write!(f, "missing_doc_type"),
            FindingKind::SlugDrift => write!(f, "slug_drift"),
            FindingKind::MalformedFrontmatter => write!(f, "malformed_frontmatter"),
            FindingKind::MissingReservation => write!(f, "missing_reservation"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

/// A single observation; findings are data returned from read operations,
/// never errors.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub message: String,
    /// The filename the finding is about, when one applies.
    pub path: Option<String>,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(p) => write!(f, "[{}] {}: {}", self.kind, p, self.message),
            None => write!(f, "[{}] {}", self.kind, self.message),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes and the outline
// ---------------------------------------------------------------------------

/// All files sharing one `(MP, SID)` pair.
#[derive(Debug, Clone)]
pub struct Node {
    pub mp: Mp,
    pub sid: String,
    /// Extracted from the draft's frontmatter when a caller has read it;
    /// building from filenames alone leaves it unset.
    pub title: Option<String>,
    pub files: Vec<ParsedFile>,
}

impl Node {
    /// The node's document types, in filename order.
    pub fn doc_types(&self) -> Vec<&str> {
        self.files.iter().filter_map(|f| f.doc_type.as_deref()).collect()
    }

    pub fn has_doc_type(&self, doc_type: &str) -> bool {
        self.files.iter().any(|f| f.doc_type.as_deref() == Some(doc_type))
    }

    pub fn draft_file(&self) -> Option<&ParsedFile> {
        self.files.iter().find(|f| f.is_draft())
    }
}

/// Every node of a project, ordered by materialized path.
#[derive(Debug, Clone, Default)]
pub struct Outline {
    nodes: Vec<Node>,
}

impl Outline {
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut [Node] {
        &mut self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn by_mp(&self, mp: &Mp) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.mp == mp)
    }

    /// All nodes carrying the given SID; more than one is a finding, not
    /// an impossibility.
    pub fn by_sid(&self, sid: &str) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.sid == sid).collect()
    }

    /// Direct children of a position, in sibling order.
    pub fn children_of(&self, parent: &Mp) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.mp.depth() == parent.depth() + 1 && n.mp.is_descendant_of(parent))
            .collect()
    }

    /// Every node strictly below a position.
    pub fn descendants_of(&self, ancestor: &Mp) -> Vec<&Node> {
        self.nodes.iter().filter(|n| n.mp.is_descendant_of(ancestor)).collect()
    }

    /// Sibling numbers taken at a parent's child level.
    pub fn occupied(&self, parent: &Mp) -> BTreeSet<u16> {
        self.children_of(parent).iter().filter_map(|n| n.mp.last()).collect()
    }

    /// Whether a position exists or is the root (which always does).
    pub fn position_exists(&self, mp: &Mp) -> bool {
        mp.is_root() || self.by_mp(mp).is_some()
    }
}

// ---------------------------------------------------------------------------
// Building
// ---------------------------------------------------------------------------

/// Parse raw directory entries, dropping names that miss the grammar into
/// `invalid_filename` findings.
pub fn parse_entries(names: &[String]) -> (Vec<ParsedFile>, Vec<Finding>) {
    let mut files = Vec::new();
    let mut findings = Vec::new();
    for name in names {
        match parse_filename(name) {
            Ok(f) => files.push(f),
            Err(e) => findings.push(Finding {
                kind: FindingKind::InvalidFilename,
                severity: Severity::Warning,
                message: e.to_string(),
                path: Some(name.clone()),
            }),
        }
    }
    (files, findings)
}

/// Group parsed files into nodes and surface structural duplicates.
pub fn build(files: Vec<ParsedFile>) -> (Outline, Vec<Finding>) {
    let mut groups: BTreeMap<(Mp, String), Vec<ParsedFile>> = BTreeMap::new();
    for f in files {
        groups.entry((f.mp.clone(), f.sid.clone())).or_default().push(f);
    }

    let mut sid_positions: BTreeMap<String, Vec<Mp>> = BTreeMap::new();
    let mut nodes = Vec::with_capacity(groups.len());
    for ((mp, sid), files) in groups {
        sid_positions.entry(sid.clone()).or_default().push(mp.clone());
        nodes.push(Node { mp, sid, title: None, files });
    }

    let mut findings = Vec::new();
    for (sid, positions) in sid_positions {
        if positions.len() > 1 {
            let rendered: Vec<String> = positions.iter().map(|m| m.to_string()).collect();
            findings.push(Finding {
                kind: FindingKind::DuplicateSid,
                severity: Severity::Error,
                message: format!("sid {sid} appears at {}", rendered.join(", ")),
                path: None,
            });
        }
    }

    (Outline { nodes }, findings)
}

/// Findings for nodes missing their mandatory draft or notes member.
pub fn missing_doc_types(outline: &Outline) -> Vec<Finding> {
    let mut findings = Vec::new();
    for node in outline.nodes() {
        if !node.has_doc_type(DRAFT) {
            findings.push(Finding {
                kind: FindingKind::MissingDocType,
                severity: Severity::Error,
                message: format!("node {} ({}) has no draft document", node.mp, node.sid),
                path: None,
            });
        }
        if !node.has_doc_type(NOTES) {
            findings.push(Finding {
                kind: FindingKind::MissingDocType,
                severity: Severity::Warning,
                message: format!("node {} ({}) has no notes document", node.mp, node.sid),
                path: None,
            });
        }
    }
    findings
}

// ---------------------------------------------------------------------------
// Selectors
// ---------------------------------------------------------------------------

/// How a caller names a node: by explicit position, explicit identifier,
/// or a bare string dispatched on shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Mp(String),
    Sid(String),
    Bare(String),
}

impl Selector {
    pub fn parse(s: &str) -> Selector {
        if let Some(rest) = s.strip_prefix("mp:") {
            Selector::Mp(rest.to_string())
        } else if let Some(rest) = s.strip_prefix("sid:") {
            Selector::Sid(rest.to_string())
        } else {
            Selector::Bare(s.to_string())
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Mp(s) => write!(f, "mp:{s}"),
            Selector::Sid(s) => write!(f, "sid:{s}"),
            Selector::Bare(s) => write!(f, "{s}"),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolveError {
    #[error("no node matches selector `{0}`")]
    NotFound(String),
    #[error("selector `{0}` matches more than one node")]
    Ambiguous(String),
}

/// Resolve a selector against an outline.
pub fn resolve<'a>(outline: &'a Outline, selector: &Selector) -> Result<&'a Node, ResolveError> {
    match selector {
        Selector::Mp(s) => resolve_mp(outline, s, selector),
        Selector::Sid(s) => resolve_sid(outline, s, selector),
        Selector::Bare(s) => {
            if Mp::is_mp_shaped(s) {
                resolve_mp(outline, s, selector)
            } else if lm_ident::is_sid_shaped(s) {
                resolve_sid(outline, s, selector)
            } else {
                Err(ResolveError::NotFound(selector.to_string()))
            }
        }
    }
}

fn resolve_mp<'a>(
    outline: &'a Outline,
    raw: &str,
    selector: &Selector,
) -> Result<&'a Node, ResolveError> {
    let mp = Mp::parse(raw).map_err(|_| ResolveError::NotFound(selector.to_string()))?;
    outline.by_mp(&mp).ok_or_else(|| ResolveError::NotFound(selector.to_string()))
}

fn resolve_sid<'a>(
    outline: &'a Outline,
    raw: &str,
    selector: &Selector,
) -> Result<&'a Node, ResolveError> {
    let matches = outline.by_sid(raw);
    match matches.len() {
        0 => Err(ResolveError::NotFound(selector.to_string())),
        1 => Ok(matches[0]),
        _ => Err(ResolveError::Ambiguous(selector.to_string())),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
