//! Additional per-node document types.

use lm_fname::{file_name, is_valid_doc_type};

use crate::error::ServiceError;
use crate::{CancelToken, OutlineService, resolve_node};

#[derive(Debug, Clone)]
pub struct TypeRequest {
    pub selector: String,
    pub doc_type: String,
    pub apply: bool,
}

/// The file a type operation creates or removes.
#[derive(Debug, Clone)]
pub struct TypeChange {
    pub filename: String,
}

impl OutlineService {
    /// List a node's document types. Lock-free read.
    pub fn list_types(
        &self,
        selector: &str,
        cancel: &CancelToken,
    ) -> Result<Vec<String>, ServiceError> {
        cancel.check()?;
        let (outline, _) = self.load_outline()?;
        let node = resolve_node(&outline, selector)?;
        Ok(node.doc_types().into_iter().map(String::from).collect())
    }

    /// Create an empty document of a new type on a node.
    pub fn add_type(
        &mut self,
        req: &TypeRequest,
        cancel: &CancelToken,
    ) -> Result<TypeChange, ServiceError> {
        cancel.check()?;
        if !is_valid_doc_type(&req.doc_type) {
            return Err(ServiceError::InvalidDocType(req.doc_type.clone()));
        }
        self.with_lock(|s| {
            let (outline, _) = s.load_outline()?;
            let node = resolve_node(&outline, &req.selector)?;
            let name = file_name(&node.mp, &node.sid, Some(&req.doc_type), None);
            if node.has_doc_type(&req.doc_type) {
                return Err(ServiceError::write(
                    &name,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        "document type already present",
                    ),
                ));
            }
            let change = TypeChange { filename: name.clone() };
            if !req.apply {
                return Ok(change);
            }
            cancel.check()?;
            s.dir.write(&name, "").map_err(|e| ServiceError::write(&name, e))?;
            Ok(change)
        })
    }

    /// Delete a node's document of the given type.
    pub fn remove_type(
        &mut self,
        req: &TypeRequest,
        cancel: &CancelToken,
    ) -> Result<TypeChange, ServiceError> {
        cancel.check()?;
        if !is_valid_doc_type(&req.doc_type) {
            return Err(ServiceError::InvalidDocType(req.doc_type.clone()));
        }
        self.with_lock(|s| {
            let (outline, _) = s.load_outline()?;
            let node = resolve_node(&outline, &req.selector)?;
            let file = node
                .files
                .iter()
                .find(|f| f.doc_type.as_deref() == Some(req.doc_type.as_str()))
                .ok_or_else(|| ServiceError::Delete {
                    name: file_name(&node.mp, &node.sid, Some(&req.doc_type), None),
                    source: std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "document type not present",
                    ),
                    deleted: Default::default(),
                })?;
            let change = TypeChange { filename: file.name.clone() };
            if !req.apply {
                return Ok(change);
            }
            cancel.check()?;
            s.dir.delete(&file.name).map_err(|e| ServiceError::Delete {
                name: file.name.clone(),
                source: e,
                deleted: Default::default(),
            })?;
            Ok(change)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    fn request(selector: &str, doc_type: &str) -> TypeRequest {
        TypeRequest { selector: selector.into(), doc_type: doc_type.into(), apply: true }
    }

    #[test]
    fn list_types_in_filename_order() {
        let (svc, _, lock, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
            ("100_Aaaaaaaaaaa1_notes.md", ""),
            ("100_Aaaaaaaaaaa1_outline.md", ""),
        ]);
        let types = svc.list_types("100", &CancelToken::new()).unwrap();
        assert_eq!(types, ["draft", "notes", "outline"]);
        assert_eq!(lock.acquired.get(), 0);
    }

    #[test]
    fn add_type_creates_an_empty_file() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
            ("100_Aaaaaaaaaaa1_notes.md", ""),
        ]);
        let change = svc.add_type(&request("100", "synopsis"), &CancelToken::new()).unwrap();
        assert_eq!(change.filename, "100_Aaaaaaaaaaa1_synopsis.md");
        assert_eq!(dir.contents("100_Aaaaaaaaaaa1_synopsis.md").as_deref(), Some(""));
    }

    #[test]
    fn add_type_validates_the_identifier() {
        let (mut svc, _, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
        ]);
        for bad in ["", "Draft", "2nd", "with-dash", "with_underscore"] {
            assert!(matches!(
                svc.add_type(&request("100", bad), &CancelToken::new()),
                Err(ServiceError::InvalidDocType(_))
            ));
        }
    }

    #[test]
    fn add_type_refuses_duplicates() {
        let (mut svc, _, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
            ("100_Aaaaaaaaaaa1_notes.md", ""),
        ]);
        assert!(matches!(
            svc.add_type(&request("100", "notes"), &CancelToken::new()),
            Err(ServiceError::Write { .. })
        ));
    }

    #[test]
    fn remove_type_deletes_the_file() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
            ("100_Aaaaaaaaaaa1_synopsis.md", "text"),
        ]);
        let change = svc.remove_type(&request("100", "synopsis"), &CancelToken::new()).unwrap();
        assert_eq!(change.filename, "100_Aaaaaaaaaaa1_synopsis.md");
        assert_eq!(dir.names(), vec!["100_Aaaaaaaaaaa1_draft_one.md"]);
    }

    #[test]
    fn remove_type_requires_the_type_to_exist() {
        let (mut svc, _, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
        ]);
        assert!(matches!(
            svc.remove_type(&request("100", "synopsis"), &CancelToken::new()),
            Err(ServiceError::Delete { .. })
        ));
    }

    #[test]
    fn remove_type_finds_the_draft_by_its_full_name() {
        // The draft file carries a slug; removal must use the on-disk name.
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
            ("100_Aaaaaaaaaaa1_notes.md", ""),
        ]);
        svc.remove_type(&request("100", "draft"), &CancelToken::new()).unwrap();
        assert_eq!(dir.names(), vec!["100_Aaaaaaaaaaa1_notes.md"]);
    }

    #[test]
    fn type_mutations_take_the_lock() {
        let (mut svc, _, lock, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
        ]);
        lock.busy.set(true);
        assert!(matches!(
            svc.add_type(&request("100", "synopsis"), &CancelToken::new()),
            Err(ServiceError::AlreadyLocked)
        ));
        assert!(matches!(
            svc.remove_type(&request("100", "draft"), &CancelToken::new()),
            Err(ServiceError::AlreadyLocked)
        ));
    }

    #[test]
    fn add_type_dry_run_plans_only() {
        let (mut svc, dir, _, _) = service_with(&[
            ("100_Aaaaaaaaaaa1_draft_one.md", "---\ntitle: One\n---\n"),
        ]);
        let req = TypeRequest { apply: false, ..request("100", "synopsis") };
        let change = svc.add_type(&req, &CancelToken::new()).unwrap();
        assert_eq!(change.filename, "100_Aaaaaaaaaaa1_synopsis.md");
        assert!(dir.log.borrow().is_empty());
    }
}
