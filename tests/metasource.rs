//! Integration tests for navigating into metadata as generated source.
//!
//! Assemblies are built in code and served by a reader keyed by file name. The
//! compilation points at small placeholder files, so image loading goes through the
//! real resolver and the generated projects are written to a temporary directory.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use dotsource::{metasource::AssemblyKey, prelude::*};
use tempfile::TempDir;
use uguid::guid;

struct TestCompilation {
    references: Vec<(AssemblySymbol, PathBuf)>,
}

impl Compilation for TestCompilation {
    fn referenced_assemblies(&self) -> Vec<AssemblySymbol> {
        self.references
            .iter()
            .map(|(assembly, _)| assembly.clone())
            .collect()
    }

    fn metadata_reference(&self, assembly: &AssemblySymbol) -> Option<MetadataReference> {
        self.references
            .iter()
            .find(|(candidate, _)| candidate == assembly)
            .map(|(_, path)| MetadataReference::from_file(path.clone()))
    }
}

struct TestReader {
    modules: HashMap<String, ModuleRc>,
}

impl ModuleReader for TestReader {
    fn read(&self, image: &BinaryImage) -> Result<ModuleRc> {
        image
            .file_name()
            .and_then(|name| self.modules.get(name))
            .cloned()
            .ok_or_else(|| Error::Error(format!("Unknown image {:?}", image.path())))
    }
}

#[derive(Default)]
struct RecordingWorkspace {
    events: Mutex<Vec<String>>,
}

impl RecordingWorkspace {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl MetadataWorkspace for RecordingWorkspace {
    fn on_project_added(&self, project: &dotsource::metasource::DecompiledProject) {
        self.events.lock().unwrap().push(format!(
            "added {} ({} documents)",
            project.name(),
            project.document_count()
        ));
    }

    fn on_project_removed(&self, project: ProjectId) {
        self.events.lock().unwrap().push(format!("removed {project}"));
    }

    fn on_document_closed(&self, document: DocumentId, _path: &Path) {
        self.events.lock().unwrap().push(format!("closed {document}"));
    }
}

struct Fixture {
    _root: TempDir,
    temp_root: PathBuf,
    assembly: AssemblySymbol,
    context: SourceContext,
    reader: Arc<TestReader>,
}

impl Fixture {
    fn provider(&self) -> MetadataAsSourceProvider {
        MetadataAsSourceProvider::new(&self.temp_root, self.reader.clone())
    }

    fn request(&self, symbol: &str) -> SymbolRequest {
        SymbolRequest::new(symbol.parse().unwrap(), self.assembly.clone())
    }
}

/// `Foo.dll` with `Namespace.A.Widget`, whose `Run` method uses a private nested
/// `Helper`, and a second type `Namespace.A.Gadget`.
fn foo_module(reference_assembly: bool) -> Module {
    let mut builder = ModuleBuilder::new(
        "Foo.dll",
        AssemblyIdentity::new("Foo", AssemblyVersion::new(1, 0, 0, 0)),
    )
    .with_mvid(guid!("6b29fc40-ca47-1067-b31d-00dd010662da"));

    let widget = builder.add_type("Namespace.A", "Widget").token();
    let helper = builder
        .add_nested_type(widget, "Helper")
        .accessibility(Accessibility::Private)
        .token();
    builder
        .type_builder(widget)
        .method(MethodBuilder::new("Run").local(TypeSignature::class(helper)));
    builder.add_type("Namespace.A", "Gadget");
    builder.add_assembly_reference(AssemblyIdentity::new(
        "System.Runtime",
        AssemblyVersion::new(8, 0, 0, 0),
    ));
    if reference_assembly {
        builder.add_assembly_attribute(CustomAttribute::external(
            "System.Runtime",
            "System.Runtime.CompilerServices",
            "ReferenceAssemblyAttribute",
        ));
    }
    builder.build()
}

fn fixture_with(module: Module, is_reference_assembly: bool) -> Fixture {
    let root = tempfile::tempdir().unwrap();
    let lib = root.path().join("lib");
    fs::create_dir_all(&lib).unwrap();
    let image_path = lib.join("Foo.dll");
    fs::write(&image_path, b"MZ placeholder").unwrap();

    let assembly = AssemblySymbol {
        identity: module.identity(),
        is_reference_assembly,
    };
    let compilation = TestCompilation {
        references: vec![(assembly.clone(), image_path)],
    };
    let reader = TestReader {
        modules: HashMap::from([("Foo.dll".to_string(), Arc::new(module))]),
    };

    Fixture {
        temp_root: root.path().join("metadata"),
        _root: root,
        assembly,
        context: SourceContext::new(Arc::new(compilation), SourceLanguage::CSharp),
        reader: Arc::new(reader),
    }
}

/// Makes `namespace.name` claim a nested type that has no definition, so decompiling
/// it fails.
fn break_nesting(module: &Module, namespace: &str, name: &str) {
    let mut definition = TypeDefinition::clone(&module.find_type(namespace, name).unwrap());
    definition.nested_types.push(Token::new(0x0200_0fff));
    module.types.insert(definition.token, Arc::new(definition));
}

fn fixture() -> Fixture {
    fixture_with(foo_module(false), false)
}

fn widget_path() -> String {
    ["Namespace", "A", "Widget.cs"].join(std::path::MAIN_SEPARATOR_STR)
}

#[test]
fn test_navigate_to_decompiled_type() {
    let fixture = fixture();
    let mut provider = fixture.provider();

    let file = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget+Helper"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap()
        .unwrap();

    assert!(file.file_path.starts_with(&fixture.temp_root));
    assert!(file.file_path.ends_with(widget_path()));
    assert_eq!(file.document_name, "Widget [Decompiled]");
    assert_eq!(file.document_tooltip, "Namespace.A.Widget");

    let text = fs::read_to_string(&file.file_path).unwrap();
    assert!(text.contains("public class Widget"));
    assert!(text.contains("private class Helper"));
    assert!(fs::metadata(&file.file_path).unwrap().permissions().readonly());

    let line = text.lines().nth(file.location.line).unwrap();
    assert!(line[file.location.column..].starts_with("Helper"));

    let project_directory = file.file_path.ancestors().nth(3).unwrap();
    assert!(!project_directory.join("Foo.csproj").exists());
    assert_eq!(provider.decompilation_count(), 1);
    assert_eq!(provider.project_count(), 1);
}

#[test]
fn test_member_location() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let cancellation = CancellationToken::none();

    let widget = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Widget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();
    let run = provider
        .get_or_create_file(&fixture.request("M:Namespace.A.Widget.Run"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();

    assert_eq!(widget.file_path, run.file_path);
    assert!(run.location.line > widget.location.line);

    let text = fs::read_to_string(&run.file_path).unwrap();
    let line = text.lines().nth(run.location.line).unwrap();
    assert!(line[run.location.column..].starts_with("Run"));
}

#[test]
fn test_project_is_reused() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let cancellation = CancellationToken::none();

    let widget = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Widget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();
    let gadget = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Gadget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();

    assert_eq!(provider.decompilation_count(), 1);
    assert_eq!(provider.project_count(), 1);
    assert_eq!(widget.file_path.parent(), gadget.file_path.parent());
    assert!(gadget.file_path.exists());

    let record = provider.files().get(&widget.file_path).unwrap();
    let project = provider.project(record.key()).unwrap();
    // Widget, Gadget, AssemblyInfo and the project file
    assert_eq!(project.document_count(), 4);
    assert!(!project.is_signatures_only());

    let info = project.absolute_path(&["Properties", "AssemblyInfo.cs"].join(std::path::MAIN_SEPARATOR_STR));
    assert!(provider.files().contains(&info));
    assert!(!info.exists());
    assert!(provider.files().ensure_on_disk(&info).unwrap());
    assert!(fs::read_to_string(&info)
        .unwrap()
        .contains("[assembly: System.Reflection.AssemblyVersion(\"1.0.0.0\")]"));

    let csproj = project.absolute_path(&project.project_file_path());
    assert!(provider.files().ensure_on_disk(&csproj).unwrap());
    let xml = fs::read_to_string(&csproj).unwrap();
    assert!(xml.contains("<AssemblyName>Foo</AssemblyName>"));
    assert!(xml.contains("<Reference Include=\"System.Runtime\"/>"));
}

#[test]
fn test_cleanup_project() {
    let fixture = fixture();
    let workspace = Arc::new(RecordingWorkspace::default());
    let mut provider = fixture.provider().with_workspace(workspace.clone());
    let cancellation = CancellationToken::none();

    let file = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Widget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();
    let key = provider.files().get(&file.file_path).unwrap().key().clone();
    let directory = provider.project(&key).unwrap().directory().to_path_buf();
    assert!(directory.exists());

    assert!(provider.cleanup_project(&key));
    assert!(!provider.cleanup_project(&key));
    assert!(provider.files().is_empty());
    assert_eq!(provider.project_count(), 0);
    assert!(!directory.exists());

    let events = workspace.events();
    assert_eq!(events[0], "added Foo (4 documents)");
    assert_eq!(events.iter().filter(|event| event.starts_with("closed")).count(), 4);
    assert_eq!(events.last().unwrap(), "removed Project#1");

    let again = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Widget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();
    assert_eq!(provider.decompilation_count(), 2);
    assert!(again.file_path.exists());
}

#[test]
fn test_cleanup_generated_files() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap();

    provider.cleanup_generated_files();
    assert_eq!(provider.project_count(), 0);
    assert!(provider.files().is_empty());
}

#[test]
fn test_signatures_only_request() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let cancellation = CancellationToken::none();

    let widget = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget").signatures_only(),
            &fixture.context,
            &cancellation,
        )
        .unwrap()
        .unwrap();
    assert_eq!(widget.document_name, "Widget [from metadata]");
    assert_eq!(provider.decompilation_count(), 0);
    assert!(fs::read_to_string(&widget.file_path)
        .unwrap()
        .contains("class Widget"));

    let gadget = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Gadget").signatures_only(),
            &fixture.context,
            &cancellation,
        )
        .unwrap()
        .unwrap();
    assert_eq!(widget.file_path.parent(), gadget.file_path.parent());

    let record = provider.files().get(&gadget.file_path).unwrap();
    let project = provider.project(record.key()).unwrap();
    assert!(project.is_signatures_only());
    // Widget, Gadget and AssemblyInfo
    assert_eq!(project.document_count(), 3);
    assert_eq!(provider.decompilation_count(), 0);

    let info = project.absolute_path(&["Properties", "AssemblyInfo.cs"].join(std::path::MAIN_SEPARATOR_STR));
    let record = provider.files().get(&info).unwrap();
    assert!(record.is_signatures_only());
    assert_eq!(
        record.text(),
        "[assembly: System.Reflection.AssemblyVersion(\"1.0.0.0\")]"
    );
    assert!(provider.files().ensure_on_disk(&info).unwrap());
}

#[test]
fn test_reference_assembly_without_implementation() {
    let fixture = fixture_with(foo_module(true), true);
    let mut provider = fixture.provider();

    let file = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap()
        .unwrap();

    assert_eq!(file.document_name, "Widget [from metadata]");
    assert_eq!(provider.decompilation_count(), 0);
}

#[test]
fn test_decompilation_disabled() {
    let fixture = fixture();
    let mut provider = fixture
        .provider()
        .with_options(MetadataAsSourceOptions::default().with_decompilation(false));

    let file = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(file.document_name, "Widget [from metadata]");
}

#[test]
fn test_visual_basic_gets_stubs() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let context = SourceContext::new(fixture.context.compilation.clone(), SourceLanguage::VisualBasic);

    let file = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Widget"), &context, &CancellationToken::none())
        .unwrap()
        .unwrap();
    assert_eq!(file.document_name, "Widget [from metadata]");
    assert_eq!(provider.decompilation_count(), 0);
}

#[test]
fn test_unknown_assembly() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let stranger = AssemblySymbol {
        identity: AssemblyIdentity::new("Bar", AssemblyVersion::new(1, 0, 0, 0)),
        is_reference_assembly: false,
    };

    let result = provider
        .get_or_create_file(
            &SymbolRequest::new("T:Bar.Thing".parse().unwrap(), stranger),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap();
    assert!(result.is_none());
    assert_eq!(provider.project_count(), 0);
}

#[test]
fn test_cancelled_before_registration() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let cancellation = CancellationToken::new();
    cancellation.cancel();

    let result = provider.get_or_create_file(
        &fixture.request("T:Namespace.A.Widget"),
        &fixture.context,
        &cancellation,
    );
    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(provider.project_count(), 0);
    assert!(provider.files().is_empty());

    let file = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap();
    assert!(file.is_some());
}

#[test]
fn test_should_collapse_on_first_open() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let cancellation = CancellationToken::none();
    let options = BlockStructureOptions::default();

    let decompiled = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Widget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();
    assert!(!provider.should_collapse_on_first_open(&decompiled.file_path, &options));

    let collapse_all = BlockStructureOptions {
        collapse_metadata_implementations_when_first_opened: true,
        ..BlockStructureOptions::default()
    };
    assert!(provider.should_collapse_on_first_open(&decompiled.file_path, &collapse_all));
    assert!(!provider.should_collapse_on_first_open(Path::new("/not/generated.cs"), &collapse_all));

    provider.cleanup_generated_files();
    let stub = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget").signatures_only(),
            &fixture.context,
            &cancellation,
        )
        .unwrap()
        .unwrap();
    assert!(provider.should_collapse_on_first_open(&stub.file_path, &options));
}

#[test]
fn test_assembly_key_identifies_project() {
    let fixture = fixture();
    let mut provider = fixture.provider();
    let file = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap()
        .unwrap();

    let record = provider.files().get(&file.file_path).unwrap();
    let key = AssemblyKey::new(
        record.key().file_path(),
        guid!("6b29fc40-ca47-1067-b31d-00dd010662da"),
    );
    assert_eq!(&key, record.key());
    assert!(file.file_path.starts_with(fixture.temp_root.join(key.directory_name())));
}

#[test]
fn test_failed_decompilation_of_other_type_degrades_to_stub() {
    let module = foo_module(false);
    break_nesting(&module, "Namespace.A", "Gadget");
    let fixture = fixture_with(module, false);
    let mut provider = fixture.provider();

    let file = provider
        .get_or_create_file(
            &fixture.request("T:Namespace.A.Widget"),
            &fixture.context,
            &CancellationToken::none(),
        )
        .unwrap()
        .unwrap();

    assert_eq!(file.document_name, "Widget [from metadata]");
    assert_eq!(provider.decompilation_count(), 1);
    let text = fs::read_to_string(&file.file_path).unwrap();
    assert!(text.contains("class Widget"));
    assert!(text.contains("class Helper"));
}

#[test]
fn test_failed_decompilation_of_requested_type_degrades_to_stub() {
    let module = foo_module(false);
    break_nesting(&module, "Namespace.A", "Widget");
    let fixture = fixture_with(module, false);
    let mut provider = fixture.provider();
    let cancellation = CancellationToken::none();

    let file = provider
        .get_or_create_file(&fixture.request("M:Namespace.A.Widget.Run"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();

    assert_eq!(file.document_name, "Widget [from metadata]");
    assert_eq!(provider.decompilation_count(), 1);
    let text = fs::read_to_string(&file.file_path).unwrap();
    assert!(text.contains("class Widget"));
    assert!(text.contains("class Helper"));
    let line = text.lines().nth(file.location.line).unwrap();
    assert!(line[file.location.column..].starts_with("Run"));

    let record = provider.files().get(&file.file_path).unwrap();
    let project = provider.project(record.key()).unwrap();
    assert!(project.is_signatures_only());
    assert!(project
        .find_document(&["Properties", "AssemblyInfo.cs"].join(std::path::MAIN_SEPARATOR_STR))
        .is_some());

    // Later requests grow the stub project instead of decompiling again.
    let gadget = provider
        .get_or_create_file(&fixture.request("T:Namespace.A.Gadget"), &fixture.context, &cancellation)
        .unwrap()
        .unwrap();
    assert_eq!(gadget.document_name, "Gadget [from metadata]");
    assert_eq!(provider.decompilation_count(), 1);
}
