//! Node creation.

use std::collections::BTreeSet;

use lm_fname::{DRAFT, Mp, NOTES, file_name, next_sibling, sibling_after, sibling_before};
use lm_outline::Outline;

use crate::error::ServiceError;
use crate::{CancelToken, OutlineService, resolve_node};

/// Attempts at drawing an unused identifier before giving up; collisions
/// are astronomically rare with a sane byte source, so hitting the cap
/// means the source is broken.
const SID_ATTEMPTS: usize = 100;

#[derive(Debug, Clone)]
pub struct AddRequest {
    pub title: String,
    /// Parent position as an MP string; empty means the root.
    pub parent: String,
    /// Selector of an existing sibling to insert before.
    pub before: Option<String>,
    /// Selector of an existing sibling to insert after.
    pub after: Option<String>,
    pub apply: bool,
}

#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub sid: String,
    pub mp: Mp,
    /// The draft document's filename.
    pub filename: String,
}

impl OutlineService {
    /// Create a node: a draft carrying the title and an empty notes file.
    pub fn add(&mut self, req: &AddRequest, cancel: &CancelToken) -> Result<AddOutcome, ServiceError> {
        cancel.check()?;
        if req.title.trim().is_empty() {
            return Err(ServiceError::EmptyTitle);
        }
        self.with_lock(|s| s.add_locked(req, cancel))
    }

    fn add_locked(&mut self, req: &AddRequest, cancel: &CancelToken) -> Result<AddOutcome, ServiceError> {
        let (outline, _) = self.load_outline()?;

        let parent = parse_parent(&req.parent)?;
        if !outline.position_exists(&parent) {
            return Err(ServiceError::NodeNotFound(req.parent.clone()));
        }

        let sid = self.fresh_sid(&outline)?;
        let number = choose_number(
            &outline,
            &parent,
            None,
            req.before.as_deref(),
            req.after.as_deref(),
        )?;
        let mp = parent.child(number);
        let slug = lm_ident::slug(&req.title);
        let draft_name = file_name(&mp, &sid, Some(DRAFT), Some(&slug));
        let notes_name = file_name(&mp, &sid, Some(NOTES), None);
        let outcome = AddOutcome { sid: sid.clone(), mp, filename: draft_name.clone() };

        if !req.apply {
            return Ok(outcome);
        }

        // The marker lands before any file write; a marker failure leaves
        // nothing behind.
        if let Some(store) = &self.reservations {
            store
                .reserve(&sid)
                .map_err(|e| ServiceError::write(format!("reservation marker {sid}"), e))?;
        }

        cancel.check()?;
        let body = format!("---\ntitle: {}\n---\n", lm_fm::encode_scalar(&req.title));
        self.dir
            .write(&draft_name, &body)
            .map_err(|e| ServiceError::write(&draft_name, e))?;

        cancel.check()?;
        // A notes failure keeps the draft: both share the SID, and
        // check+repair reconstructs the missing notes file.
        self.dir
            .write(&notes_name, "")
            .map_err(|e| ServiceError::write(&notes_name, e))?;

        Ok(outcome)
    }

    /// Draw identifiers until one is unused by both the outline and the
    /// reservation store.
    fn fresh_sid(&mut self, outline: &Outline) -> Result<String, ServiceError> {
        for _ in 0..SID_ATTEMPTS {
            let sid = lm_ident::generate_sid(&mut self.sid_source)?;
            if !outline.by_sid(&sid).is_empty() {
                continue;
            }
            if let Some(store) = &self.reservations {
                let taken = store
                    .contains(&sid)
                    .map_err(|e| ServiceError::read(format!("reservation marker {sid}"), e))?;
                if taken {
                    continue;
                }
            }
            return Ok(sid);
        }
        Err(ServiceError::read(
            "identifier source",
            std::io::Error::other("could not draw an unused identifier"),
        ))
    }
}

/// Parse an `AddRequest` parent string; empty selects the root.
fn parse_parent(s: &str) -> Result<Mp, ServiceError> {
    if s.is_empty() {
        return Ok(Mp::root());
    }
    Mp::parse(s).map_err(|_| ServiceError::NodeNotFound(s.to_string()))
}

/// Pick a sibling number under `parent`. Anchors must be direct children
/// of the parent; `before` wins when both anchors are set. `exclude`
/// removes a number from the occupied set (a node about to vacate it).
pub(crate) fn choose_number(
    outline: &Outline,
    parent: &Mp,
    exclude: Option<u16>,
    before: Option<&str>,
    after: Option<&str>,
) -> Result<u16, ServiceError> {
    let mut occupied: BTreeSet<u16> = outline.occupied(parent);
    if let Some(n) = exclude {
        occupied.remove(&n);
    }
    if let Some(sel) = before {
        let anchor = anchor_number(outline, parent, sel)?;
        Ok(sibling_before(&occupied, anchor)?)
    } else if let Some(sel) = after {
        let anchor = anchor_number(outline, parent, sel)?;
        Ok(sibling_after(&occupied, anchor)?)
    } else {
        Ok(next_sibling(&occupied)?)
    }
}

fn anchor_number(outline: &Outline, parent: &Mp, selector: &str) -> Result<u16, ServiceError> {
    let node = resolve_node(outline, selector)?;
    if node.mp.parent() != *parent {
        return Err(ServiceError::NodeNotFound(selector.to_string()));
    }
    Ok(node.mp.last().expect("anchor node is not the root"))
}
