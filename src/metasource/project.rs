//! Generated projects.
//!
//! A [`DecompiledProject`] is created the first time an assembly is navigated into and
//! lives until it is cleaned up. It owns the temporary directory its documents are
//! written to and the set of relative paths of those documents.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf, MAIN_SEPARATOR},
};

use quick_xml::{
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};

use crate::{
    metadata::identity::{AssemblyIdentity, AssemblyVersion},
    metasource::{
        key::AssemblyKey,
        workspace::{DocumentId, ProjectId},
    },
    naming::clean_up_file_name,
    Error, Result,
};

/// A project of generated source files for one assembly.
#[derive(Debug, Clone)]
pub struct DecompiledProject {
    id: ProjectId,
    key: AssemblyKey,
    identity: AssemblyIdentity,
    directory: PathBuf,
    signatures_only: bool,
    documents: BTreeMap<String, DocumentId>,
    next_document: u32,
}

impl DecompiledProject {
    /// Creates an empty project rooted at `directory`.
    #[must_use]
    pub fn new(
        id: ProjectId,
        key: AssemblyKey,
        identity: AssemblyIdentity,
        directory: PathBuf,
        signatures_only: bool,
    ) -> Self {
        DecompiledProject {
            id,
            key,
            identity,
            directory,
            signatures_only,
            documents: BTreeMap::new(),
            next_document: 0,
        }
    }

    /// The project id.
    #[must_use]
    pub fn id(&self) -> ProjectId {
        self.id
    }

    /// The key of the assembly the project was generated from.
    #[must_use]
    pub fn key(&self) -> &AssemblyKey {
        &self.key
    }

    /// Name of the assembly, also used as the project name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Version of the assembly.
    #[must_use]
    pub fn version(&self) -> AssemblyVersion {
        self.identity.version
    }

    /// The temporary directory that holds the documents.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Returns `true` if the documents only contain signatures.
    #[must_use]
    pub fn is_signatures_only(&self) -> bool {
        self.signatures_only
    }

    /// Relative paths and ids of all documents, sorted by path.
    pub fn documents(&self) -> impl Iterator<Item = (&str, DocumentId)> {
        self.documents
            .iter()
            .map(|(path, document)| (path.as_str(), *document))
    }

    /// Number of documents.
    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Absolute path of a document.
    #[must_use]
    pub fn absolute_path(&self, relative_path: &str) -> PathBuf {
        self.directory.join(relative_path)
    }

    /// Adds a document and returns its id; adding a path twice returns the first id.
    pub fn add_document(&mut self, relative_path: &str) -> DocumentId {
        if let Some(existing) = self.find_document(relative_path) {
            return existing;
        }

        let document = DocumentId {
            project: self.id,
            index: self.next_document,
        };
        self.next_document += 1;
        self.documents.insert(relative_path.to_string(), document);
        document
    }

    /// Looks up a document by relative path, ignoring case.
    #[must_use]
    pub fn find_document(&self, relative_path: &str) -> Option<DocumentId> {
        self.documents.get(relative_path).copied().or_else(|| {
            self.documents
                .iter()
                .find(|(path, _)| path.eq_ignore_ascii_case(relative_path))
                .map(|(_, document)| *document)
        })
    }

    /// Finds the document of a type: first by its expected relative path, then by
    /// file name alone.
    ///
    /// The second step covers a namespace directory layout that differs from the one
    /// `expected` was computed with.
    #[must_use]
    pub fn find_primary(&self, expected: &str) -> Option<&str> {
        if let Some((path, _)) = self
            .documents
            .iter()
            .find(|(path, _)| path.eq_ignore_ascii_case(expected))
        {
            return Some(path);
        }

        let file_name = file_name_of(expected);
        self.documents
            .keys()
            .find(|path| file_name_of(path).eq_ignore_ascii_case(file_name))
            .map(String::as_str)
    }

    /// The in-memory `AssemblyInfo` document, declaring the assembly version.
    #[must_use]
    pub fn assembly_info_text(&self) -> String {
        format!(
            "[assembly: System.Reflection.AssemblyVersion(\"{}\")]",
            self.identity.version
        )
    }

    /// Relative path of the generated project file.
    #[must_use]
    pub fn project_file_path(&self) -> String {
        clean_up_file_name(&self.identity.name, ".csproj")
    }
}

fn file_name_of(relative_path: &str) -> &str {
    relative_path
        .rsplit([MAIN_SEPARATOR, '/'])
        .next()
        .unwrap_or(relative_path)
}

/// Renders an SDK-style project file for a decompiled assembly.
///
/// Assembly attributes come from the generated `Properties/AssemblyInfo.cs`, so the SDK
/// must not generate its own.
///
/// # Errors
/// Returns [`Error::Error`] if the XML can not be written.
pub fn project_file(identity: &AssemblyIdentity, references: &[AssemblyIdentity]) -> Result<String> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    write_event(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
    write_event(
        &mut writer,
        Event::Start(BytesStart::new("Project").with_attributes([("Sdk", "Microsoft.NET.Sdk")])),
    )?;

    write_event(&mut writer, Event::Start(BytesStart::new("PropertyGroup")))?;
    let version = identity.version.to_string();
    for (name, value) in [
        ("AssemblyName", identity.name.as_str()),
        ("Version", version.as_str()),
        ("OutputType", "Library"),
        ("GenerateAssemblyInfo", "False"),
        ("LangVersion", "latest"),
        ("AllowUnsafeBlocks", "True"),
    ] {
        write_property(&mut writer, name, value)?;
    }
    write_event(&mut writer, Event::End(BytesEnd::new("PropertyGroup")))?;

    if !references.is_empty() {
        write_event(&mut writer, Event::Start(BytesStart::new("ItemGroup")))?;
        for reference in references {
            write_event(
                &mut writer,
                Event::Empty(
                    BytesStart::new("Reference").with_attributes([("Include", reference.name.as_str())]),
                ),
            )?;
        }
        write_event(&mut writer, Event::End(BytesEnd::new("ItemGroup")))?;
    }

    write_event(&mut writer, Event::End(BytesEnd::new("Project")))?;

    String::from_utf8(writer.into_inner())
        .map_err(|error| Error::Error(format!("Project file is not UTF-8: {error}")))
}

fn write_property(writer: &mut Writer<Vec<u8>>, name: &str, value: &str) -> Result<()> {
    write_event(writer, Event::Start(BytesStart::new(name)))?;
    write_event(writer, Event::Text(BytesText::new(value)))?;
    write_event(writer, Event::End(BytesEnd::new(name)))
}

fn write_event(writer: &mut Writer<Vec<u8>>, event: Event<'_>) -> Result<()> {
    writer
        .write_event(event)
        .map_err(|error| Error::Error(format!("Failed to write project file: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uguid::Guid;

    fn project() -> DecompiledProject {
        DecompiledProject::new(
            ProjectId(1),
            AssemblyKey::new("/lib/Foo.dll", Guid::ZERO),
            AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 2, 3, 4)),
            PathBuf::from("/tmp/foo"),
            false,
        )
    }

    fn path(parts: &[&str]) -> String {
        parts.join(&MAIN_SEPARATOR.to_string())
    }

    #[test]
    fn test_documents() {
        let mut project = project();
        let widget = project.add_document(&path(&["Namespace", "A", "Widget.cs"]));
        let info = project.add_document(&path(&["Properties", "AssemblyInfo.cs"]));
        assert_ne!(widget, info);
        assert_eq!(widget.project, ProjectId(1));
        assert_eq!(project.add_document(&path(&["Namespace", "A", "Widget.cs"])), widget);
        assert_eq!(project.document_count(), 2);
        assert_eq!(
            project.find_document(&path(&["namespace", "a", "widget.cs"])),
            Some(widget)
        );
        assert_eq!(
            project.absolute_path("Widget.cs"),
            PathBuf::from("/tmp/foo").join("Widget.cs")
        );
    }

    #[test]
    fn test_find_primary() {
        let mut project = project();
        project.add_document(&path(&["Namespace", "A", "Widget.cs"]));

        let exact = path(&["Namespace", "A", "Widget.cs"]);
        assert_eq!(project.find_primary(&exact), Some(exact.as_str()));
        assert_eq!(
            project.find_primary(&path(&["Namespace.A", "widget.cs"])),
            Some(exact.as_str())
        );
        assert_eq!(project.find_primary(&path(&["Namespace.A", "Helper.cs"])), None);
    }

    #[test]
    fn test_assembly_info_and_project_file_path() {
        let project = project();
        assert_eq!(
            project.assembly_info_text(),
            "[assembly: System.Reflection.AssemblyVersion(\"1.2.3.4\")]"
        );
        assert_eq!(project.project_file_path(), "Foo.csproj");
    }

    #[test]
    fn test_project_file() {
        let identity = AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 2, 3, 4));
        let references = [AssemblyIdentity::new("System.Runtime", AssemblyVersion::new(8, 0, 0, 0))];
        let xml = project_file(&identity, &references).unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"utf-8\"?>"));
        assert!(xml.contains("<Project Sdk=\"Microsoft.NET.Sdk\">"));
        assert!(xml.contains("<AssemblyName>Foo</AssemblyName>"));
        assert!(xml.contains("<Version>1.2.3.4</Version>"));
        assert!(xml.contains("<GenerateAssemblyInfo>False</GenerateAssemblyInfo>"));
        assert!(xml.contains("<Reference Include=\"System.Runtime\"/>"));
        assert!(xml.trim_end().ends_with("</Project>"));
    }
}
