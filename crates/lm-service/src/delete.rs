//! Node removal: plain, recursive, and promote.

use lm_fname::{MAX_NUMBER, next_sibling};

use crate::error::ServiceError;
use crate::plan::{DeletePlan, apply_deletes, apply_renames, rebased_renames};
use crate::{CancelToken, OutlineService, resolve_node};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeleteMode {
    /// Refuse when the node has descendants.
    #[default]
    Default,
    /// Remove the node and its whole subtree.
    Recursive,
    /// Remove the node, reparenting its direct children to its parent.
    Promote,
}

#[derive(Debug, Clone)]
pub struct DeleteRequest {
    pub selector: String,
    pub mode: DeleteMode,
    pub apply: bool,
}

impl OutlineService {
    /// Delete a node. Renames (for promoted children) run before any
    /// file is removed, so reparented subtrees are in place when their
    /// former ancestor disappears.
    pub fn delete(
        &mut self,
        req: &DeleteRequest,
        cancel: &CancelToken,
    ) -> Result<DeletePlan, ServiceError> {
        cancel.check()?;
        self.with_lock(|s| s.delete_locked(req, cancel))
    }

    fn delete_locked(
        &mut self,
        req: &DeleteRequest,
        cancel: &CancelToken,
    ) -> Result<DeletePlan, ServiceError> {
        let (outline, _) = self.load_outline()?;
        let node = resolve_node(&outline, &req.selector)?;
        let descendants = outline.descendants_of(&node.mp);

        let own_files: Vec<String> = node.files.iter().map(|f| f.name.clone()).collect();
        let mut plan = DeletePlan::default();

        match req.mode {
            DeleteMode::Default => {
                if !descendants.is_empty() {
                    return Err(ServiceError::NodeHasChildren(node.mp.to_string()));
                }
                plan.deletes = own_files;
            }
            DeleteMode::Recursive => {
                plan.deletes = own_files;
                plan.deletes.extend(
                    descendants.iter().flat_map(|n| n.files.iter().map(|f| f.name.clone())),
                );
            }
            DeleteMode::Promote => {
                let parent = node.mp.parent();
                let own_number = node.mp.last().expect("resolved nodes are never the root");
                let mut occupied = outline.occupied(&parent);
                occupied.remove(&own_number);

                let children = outline.children_of(&node.mp);
                let available = MAX_NUMBER as usize - occupied.len();
                if children.len() > available {
                    return Err(ServiceError::InsufficientGaps {
                        needed: children.len(),
                        available,
                    });
                }

                for child in children {
                    let number = next_sibling(&occupied)?;
                    occupied.insert(number);
                    let new_child_mp = parent.child(number);
                    let below = outline.descendants_of(&child.mp);
                    let subtree = child
                        .files
                        .iter()
                        .chain(below.iter().flat_map(|n| n.files.iter()))
                        .cloned();
                    plan.renames.extend(rebased_renames(subtree, &child.mp, &new_child_mp));
                }
                plan.deletes = own_files;
            }
        }

        if !req.apply {
            return Ok(plan);
        }
        apply_renames(self.dir.as_ref(), &plan.renames, cancel)?;
        apply_deletes(self.dir.as_ref(), &plan.deletes, cancel)?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn request(selector: &str, mode: DeleteMode) -> DeleteRequest {
        DeleteRequest { selector: selector.into(), mode, apply: true }
    }

    #[test]
    fn default_refuses_nodes_with_children() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_p.md", "---\ntitle: P\n---\n"),
            ("100-100_Bbbbbbbbbbb2_draft_c.md", "---\ntitle: C\n---\n"),
        ]);
        let err = svc.delete(&request("100", DeleteMode::Default), &CancelToken::new());
        assert!(matches!(err, Err(ServiceError::NodeHasChildren(_))));
        assert_eq!(dir.names().len(), 2);
    }

    #[test]
    fn default_removes_a_leaf_node() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_a.md", "---\ntitle: A\n---\n"),
            ("100_Aaaaaaaaaaa1_notes.md", ""),
            ("200_Bbbbbbbbbbb2_draft_b.md", "---\ntitle: B\n---\n"),
        ]);
        let plan = svc.delete(&request("100", DeleteMode::Default), &CancelToken::new()).unwrap();
        assert!(plan.renames.is_empty());
        assert_eq!(plan.deletes.len(), 2);
        assert_eq!(dir.names(), vec!["200_Bbbbbbbbbbb2_draft_b.md"]);
    }

    #[test]
    fn recursive_removes_the_subtree() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_p.md", "---\ntitle: P\n---\n"),
            ("100-100_Bbbbbbbbbbb2_draft_c.md", "---\ntitle: C\n---\n"),
            ("100-100-100_Ccccccccccc3_notes.md", ""),
            ("200_Dddddddddd04_draft_s.md", "---\ntitle: S\n---\n"),
        ]);
        svc.delete(&request("100", DeleteMode::Recursive), &CancelToken::new()).unwrap();
        assert_eq!(dir.names(), vec!["200_Dddddddddd04_draft_s.md"]);
    }

    #[test]
    fn promote_reparents_children_into_freed_slots() {
        // Scenario: deleting a parent frees its own slot; the children
        // land on the roundest free root numbers, 100 then 200.
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_p.md", "---\ntitle: P\n---\n"),
            ("100_Aaaaaaaaaaa1_notes.md", ""),
            ("100-100_Bbbbbbbbbbb2_draft_c1.md", "---\ntitle: C1\n---\n"),
            ("100-200_Ccccccccccc3_draft_c2.md", "---\ntitle: C2\n---\n"),
            ("300_Dddddddddd04_draft_s.md", "---\ntitle: S\n---\n"),
        ]);
        let plan = svc.delete(&request("100", DeleteMode::Promote), &CancelToken::new()).unwrap();
        assert_eq!(plan.renames.len(), 2);
        assert_eq!(plan.deletes.len(), 2);
        assert_eq!(
            dir.names(),
            vec![
                "100_Bbbbbbbbbbb2_draft_c1.md",
                "200_Ccccccccccc3_draft_c2.md",
                "300_Dddddddddd04_draft_s.md",
            ]
        );
    }

    #[test]
    fn promote_carries_grandchildren_along() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_p.md", "---\ntitle: P\n---\n"),
            ("100-100_Bbbbbbbbbbb2_draft_c.md", "---\ntitle: C\n---\n"),
            ("100-100-100_Ccccccccccc3_draft_g.md", "---\ntitle: G\n---\n"),
        ]);
        svc.delete(&request("100", DeleteMode::Promote), &CancelToken::new()).unwrap();
        assert_eq!(
            dir.names(),
            vec!["100-100_Ccccccccccc3_draft_g.md", "100_Bbbbbbbbbbb2_draft_c.md"]
        );
    }

    #[test]
    fn promote_renames_before_deleting() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_p.md", "---\ntitle: P\n---\n"),
            ("100-100_Bbbbbbbbbbb2_draft_c.md", "---\ntitle: C\n---\n"),
        ]);
        svc.delete(&request("100", DeleteMode::Promote), &CancelToken::new()).unwrap();
        let log = dir.log.borrow();
        let first_delete = log.iter().position(|l| l.starts_with("delete")).unwrap();
        let last_rename = log.iter().rposition(|l| l.starts_with("rename")).unwrap();
        assert!(last_rename < first_delete, "renames must precede deletes: {log:?}");
    }

    #[test]
    fn promote_fails_without_enough_slots() {
        // Parent holds one child; every root number except the parent's
        // own is already taken.
        let mut files: Vec<(String, String)> = (1..=MAX_NUMBER)
            .filter(|n| *n != 500)
            .map(|n| (format!("{n:03}_N{n:08}ab1_draft.md"), "---\ntitle: X\n---\n".to_string()))
            .collect();
        files.push(("500_Parent500ab1_draft.md".into(), "---\ntitle: P\n---\n".into()));
        files.push(("500-100_Child500aab1_draft.md".into(), "---\ntitle: C\n---\n".into()));
        files.push(("500-200_Child500bab1_draft.md".into(), "---\ntitle: D\n---\n".into()));
        let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
        let (mut svc, _, _, _) = service_with(&refs);
        let err = svc.delete(&request("500", DeleteMode::Promote), &CancelToken::new()).unwrap_err();
        match err {
            ServiceError::InsufficientGaps { needed, available } => {
                assert_eq!(needed, 2);
                assert_eq!(available, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn dry_run_plans_without_touching_disk() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_p.md", "---\ntitle: P\n---\n"),
            ("100-100_Bbbbbbbbbbb2_draft_c.md", "---\ntitle: C\n---\n"),
        ]);
        let req = DeleteRequest {
            selector: "100".into(),
            mode: DeleteMode::Promote,
            apply: false,
        };
        let plan = svc.delete(&req, &CancelToken::new()).unwrap();
        assert_eq!(plan.renames.len(), 1);
        assert_eq!(plan.deletes, vec!["100_Aaaaaaaaaaa1_draft_p.md"]);
        assert_eq!(dir.names().len(), 2);
        assert!(dir.log.borrow().is_empty());
    }

    #[test]
    fn deleting_a_missing_node_fails() {
        let (mut svc, _, _, _) = service_with(&[]);
        assert!(matches!(
            svc.delete(&request("100", DeleteMode::Default), &CancelToken::new()),
            Err(ServiceError::NodeNotFound(_))
        ));
    }
}
