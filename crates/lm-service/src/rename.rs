//! Retitling: frontmatter rewrite plus the draft's slug rename.

use lm_fname::{DRAFT, file_name};

use crate::error::ServiceError;
use crate::plan::{RenamePair, RenamePlan, apply_renames};
use crate::{CancelToken, OutlineService, resolve_node};

#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub selector: String,
    pub new_title: String,
    pub apply: bool,
}

impl OutlineService {
    /// Change a node's title. Only the draft file is touched: its content
    /// is rewritten in place first, then the file is renamed to carry the
    /// new slug. A rename failure therefore leaves at worst a slug-drift
    /// finding, which `repair` fixes.
    pub fn rename(
        &mut self,
        req: &RenameRequest,
        cancel: &CancelToken,
    ) -> Result<RenamePlan, ServiceError> {
        cancel.check()?;
        if req.new_title.trim().is_empty() {
            return Err(ServiceError::EmptyTitle);
        }
        self.with_lock(|s| s.rename_locked(req, cancel))
    }

    fn rename_locked(
        &mut self,
        req: &RenameRequest,
        cancel: &CancelToken,
    ) -> Result<RenamePlan, ServiceError> {
        let (outline, _) = self.load_outline()?;
        let node = resolve_node(&outline, &req.selector)?;
        let draft = node.files.iter().find(|f| f.is_draft()).ok_or_else(|| {
            ServiceError::read(
                format!("draft of node {}", node.mp),
                std::io::Error::new(std::io::ErrorKind::NotFound, "node has no draft document"),
            )
        })?;

        let content = self
            .dir
            .read(&draft.name)
            .map_err(|e| ServiceError::read(&draft.name, e))?;
        let old_title = lm_fm::get_title(&content)?;

        let new_slug = lm_ident::slug(&req.new_title);
        let new_name = file_name(&node.mp, &node.sid, Some(DRAFT), Some(&new_slug));
        let renames = if new_name != draft.name {
            vec![RenamePair::new(draft.name.clone(), new_name)]
        } else {
            Vec::new()
        };
        let plan = RenamePlan { old_title, new_title: req.new_title.clone(), renames };

        if !req.apply {
            return Ok(plan);
        }

        cancel.check()?;
        let updated = lm_fm::set_title(&content, &req.new_title)?;
        self.dir
            .write(&draft.name, &updated)
            .map_err(|e| ServiceError::write(&draft.name, e))?;
        apply_renames(self.dir.as_ref(), &plan.renames, cancel)?;
        Ok(plan)
    }
}
