//! Subtree renumbering.

use lm_fname::{Mp, compact_numbers, file_name};
use lm_outline::Outline;

use crate::error::ServiceError;
use crate::plan::{CompactPlan, RenamePair, apply_renames};
use crate::{CancelToken, OutlineService, resolve_node};

#[derive(Debug, Clone, Default)]
pub struct CompactRequest {
    /// Node whose children are renumbered; `None` compacts from the root.
    pub selector: Option<String>,
    pub apply: bool,
}

impl OutlineService {
    /// Renumber a subtree's children to consistent tier-aligned spacing.
    pub fn compact(
        &mut self,
        req: &CompactRequest,
        cancel: &CancelToken,
    ) -> Result<CompactPlan, ServiceError> {
        cancel.check()?;
        self.with_lock(|s| s.compact_locked(req, cancel))
    }

    fn compact_locked(
        &mut self,
        req: &CompactRequest,
        cancel: &CancelToken,
    ) -> Result<CompactPlan, ServiceError> {
        let (outline, _) = self.load_outline()?;
        let start = match req.selector.as_deref() {
            None | Some("") => Mp::root(),
            Some(sel) => resolve_node(&outline, sel)?.mp.clone(),
        };

        let mut plan = CompactPlan::default();
        plan_compact(&outline, &start, &start, &mut plan.renames)?;

        if !req.apply {
            return Ok(plan);
        }
        apply_renames(self.dir.as_ref(), &plan.renames, cancel)?;
        Ok(plan)
    }
}

/// Walk the tree renumbering level by level. Children are located by
/// their on-disk parent position while new filenames are generated under
/// the renumbered one; both have to travel together because an ancestor's
/// renumbering changes the destination prefix before any file moves.
fn plan_compact(
    outline: &Outline,
    disk_parent: &Mp,
    new_parent: &Mp,
    renames: &mut Vec<RenamePair>,
) -> Result<(), ServiceError> {
    let children = outline.children_of(disk_parent);
    let numbers = compact_numbers(children.len())?;
    for (child, number) in children.into_iter().zip(numbers) {
        let new_child = new_parent.child(number);
        for f in &child.files {
            let to = file_name(&new_child, &f.sid, f.doc_type.as_deref(), f.slug.as_deref());
            if to != f.name {
                renames.push(RenamePair::new(f.name.clone(), to));
            }
        }
        plan_compact(outline, &child.mp, &new_child, renames)?;
    }
    Ok(())
}
