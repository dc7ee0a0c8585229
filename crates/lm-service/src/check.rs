//! Validation and auto-repair.

use lm_fname::{DRAFT, NOTES, file_name};
use lm_outline::{Finding, FindingKind, Node, Severity};

use crate::error::ServiceError;
use crate::plan::{RenamePair, apply_renames};
use crate::{CancelToken, OutlineService};

/// What `repair` fixed and what it left for a human.
#[derive(Debug, Clone, Default)]
pub struct RepairOutcome {
    pub applied: Vec<Finding>,
    pub unrepaired: Vec<Finding>,
}

impl OutlineService {
    /// Validate the project. Pure read: no lock is taken, so a check that
    /// races a writer sees an eventually-consistent view.
    pub fn check(&self, cancel: &CancelToken) -> Result<Vec<Finding>, ServiceError> {
        cancel.check()?;
        let (outline, mut findings) = self.load_outline()?;
        findings.extend(lm_outline::missing_doc_types(&outline));

        for node in outline.nodes() {
            cancel.check()?;
            if let Some(finding) = self.survey_draft(node)? {
                findings.push(finding);
            }
        }

        if let Some(store) = &self.reservations {
            for node in outline.nodes() {
                cancel.check()?;
                let reserved = store
                    .contains(&node.sid)
                    .map_err(|e| ServiceError::read(format!("reservation marker {}", node.sid), e))?;
                if !reserved {
                    findings.push(Finding {
                        kind: FindingKind::MissingReservation,
                        severity: Severity::Warning,
                        message: format!("sid {} has no reservation marker", node.sid),
                        path: None,
                    });
                }
            }
        }

        Ok(findings)
    }

    /// Inspect a node's draft for malformed frontmatter or slug drift.
    fn survey_draft(&self, node: &Node) -> Result<Option<Finding>, ServiceError> {
        let Some(draft) = node.draft_file() else {
            return Ok(None);
        };
        let content = self
            .dir
            .read(&draft.name)
            .map_err(|e| ServiceError::read(&draft.name, e))?;
        let title = match lm_fm::get_title(&content) {
            Ok(title) => title,
            Err(e) => {
                return Ok(Some(Finding {
                    kind: FindingKind::MalformedFrontmatter,
                    severity: Severity::Error,
                    message: e.to_string(),
                    path: Some(draft.name.clone()),
                }));
            }
        };
        // An absent title behaves like an empty one: the filename should
        // then carry no slug at all.
        let expected = lm_ident::slug(title.as_deref().unwrap_or_default());
        let actual = draft.slug.clone().unwrap_or_default();
        if expected != actual {
            return Ok(Some(Finding {
                kind: FindingKind::SlugDrift,
                severity: Severity::Warning,
                message: format!("slug `{actual}` does not match title slug `{expected}`"),
                path: Some(draft.name.clone()),
            }));
        }
        Ok(None)
    }

    /// Fix what a check can fix: missing notes files, missing reservation
    /// markers, and drifted draft slugs. Everything else comes back in
    /// `unrepaired`.
    pub fn repair(&mut self, cancel: &CancelToken) -> Result<RepairOutcome, ServiceError> {
        cancel.check()?;
        self.with_lock(|s| s.repair_locked(cancel))
    }

    fn repair_locked(&mut self, cancel: &CancelToken) -> Result<RepairOutcome, ServiceError> {
        let (outline, parse_findings) = self.load_outline()?;
        let mut outcome = RepairOutcome {
            // Invalid filenames and duplicate SIDs have no mechanical fix.
            unrepaired: parse_findings,
            ..Default::default()
        };
        let mut renames: Vec<RenamePair> = Vec::new();

        for node in outline.nodes() {
            cancel.check()?;

            if !node.has_doc_type(NOTES) {
                let name = file_name(&node.mp, &node.sid, Some(NOTES), None);
                self.dir
                    .write(&name, "")
                    .map_err(|e| ServiceError::write(&name, e))?;
                outcome.applied.push(Finding {
                    kind: FindingKind::MissingDocType,
                    severity: Severity::Warning,
                    message: format!("wrote empty notes file for node {}", node.mp),
                    path: Some(name),
                });
            }
            if !node.has_doc_type(DRAFT) {
                outcome.unrepaired.push(Finding {
                    kind: FindingKind::MissingDocType,
                    severity: Severity::Error,
                    message: format!("node {} ({}) has no draft document", node.mp, node.sid),
                    path: None,
                });
            }

            if let Some(store) = &self.reservations {
                let reserved = store
                    .contains(&node.sid)
                    .map_err(|e| ServiceError::read(format!("reservation marker {}", node.sid), e))?;
                if !reserved {
                    store
                        .reserve(&node.sid)
                        .map_err(|e| ServiceError::write(format!("reservation marker {}", node.sid), e))?;
                    outcome.applied.push(Finding {
                        kind: FindingKind::MissingReservation,
                        severity: Severity::Warning,
                        message: format!("created reservation marker for sid {}", node.sid),
                        path: None,
                    });
                }
            }

            match self.survey_draft(node)? {
                Some(finding) if finding.kind == FindingKind::SlugDrift => {
                    let draft = node.draft_file().expect("drift implies a draft");
                    let content = self
                        .dir
                        .read(&draft.name)
                        .map_err(|e| ServiceError::read(&draft.name, e))?;
                    let title = lm_fm::get_title(&content)?.unwrap_or_default();
                    let to = file_name(
                        &node.mp,
                        &node.sid,
                        Some(DRAFT),
                        Some(&lm_ident::slug(&title)),
                    );
                    renames.push(RenamePair::new(draft.name.clone(), to));
                    outcome.applied.push(finding);
                }
                Some(finding) => outcome.unrepaired.push(finding),
                None => {}
            }
        }

        apply_renames(self.dir.as_ref(), &renames, cancel)?;
        Ok(outcome)
    }
}
