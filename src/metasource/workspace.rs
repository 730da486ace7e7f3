//! Notifications to the workspace that hosts generated projects.

use std::{fmt, path::Path};

use crate::metasource::project::DecompiledProject;

/// Identifies a generated project for the lifetime of a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProjectId(pub u32);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Project#{}", self.0)
    }
}

/// Identifies a generated document within its project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentId {
    /// Owning project
    pub project: ProjectId,
    /// Index of the document in the project
    pub index: u32,
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/Document#{}", self.project, self.index)
    }
}

/// Receives changes to the set of generated projects.
///
/// Calls happen while the provider is borrowed mutably, one at a time.
pub trait MetadataWorkspace: Send + Sync {
    /// A project and all its documents were registered.
    fn on_project_added(&self, project: &DecompiledProject);

    /// A project was removed after all its documents were closed.
    fn on_project_removed(&self, project: ProjectId);

    /// A document was closed; further reads go to the file at `path`.
    fn on_document_closed(&self, document: DocumentId, path: &Path);
}

/// A workspace that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWorkspace;

impl MetadataWorkspace for NullWorkspace {
    fn on_project_added(&self, _project: &DecompiledProject) {}

    fn on_project_removed(&self, _project: ProjectId) {}

    fn on_document_closed(&self, _document: DocumentId, _path: &Path) {}
}
