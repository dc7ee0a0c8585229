//! Subtree relocation.

use lm_fname::Mp;

use crate::add::choose_number;
use crate::error::ServiceError;
use crate::plan::{RenamePair, apply_renames, rebased_renames};
use crate::{CancelToken, OutlineService, resolve_node};

#[derive(Debug, Clone)]
pub struct MoveRequest {
    pub source: String,
    /// Selector of the new parent; empty means the root.
    pub target: String,
    pub before: Option<String>,
    pub after: Option<String>,
    pub apply: bool,
}

#[derive(Debug, Clone)]
pub struct MovePlan {
    /// The source node's position after the move.
    pub new_mp: Mp,
    pub renames: Vec<RenamePair>,
}

impl OutlineService {
    /// Move a node (and its whole subtree) under a new parent.
    pub fn move_node(
        &mut self,
        req: &MoveRequest,
        cancel: &CancelToken,
    ) -> Result<MovePlan, ServiceError> {
        cancel.check()?;
        self.with_lock(|s| s.move_locked(req, cancel))
    }

    fn move_locked(
        &mut self,
        req: &MoveRequest,
        cancel: &CancelToken,
    ) -> Result<MovePlan, ServiceError> {
        let (outline, _) = self.load_outline()?;
        let source = resolve_node(&outline, &req.source)?;
        let target_mp = if req.target.is_empty() {
            Mp::root()
        } else {
            resolve_node(&outline, &req.target)?.mp.clone()
        };

        if target_mp == source.mp || target_mp.is_descendant_of(&source.mp) {
            return Err(ServiceError::CycleDetected {
                moved: source.mp.to_string(),
                target: req.target.clone(),
            });
        }

        // Reordering under the same parent vacates the source's own slot.
        let exclude = (source.mp.parent() == target_mp).then(|| {
            source.mp.last().expect("resolved nodes are never the root")
        });
        let number = choose_number(
            &outline,
            &target_mp,
            exclude,
            req.before.as_deref(),
            req.after.as_deref(),
        )?;
        let new_mp = target_mp.child(number);

        let below = outline.descendants_of(&source.mp);
        let subtree = source
            .files
            .iter()
            .chain(below.iter().flat_map(|n| n.files.iter()))
            .cloned();
        let plan = MovePlan {
            new_mp: new_mp.clone(),
            renames: rebased_renames(subtree, &source.mp, &new_mp),
        };

        if !req.apply {
            return Ok(plan);
        }
        apply_renames(self.dir.as_ref(), &plan.renames, cancel)?;
        Ok(plan)
    }
}
