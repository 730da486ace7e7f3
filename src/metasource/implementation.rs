//! Finding implementation assemblies for reference assemblies.
//!
//! Reference assemblies only carry signatures, so navigating into them would show empty
//! bodies. An SDK install places the matching implementation assemblies in a shared
//! framework directory, and NuGet packages ship them under `lib/` next to `ref/`:
//!
//! ```text
//! <dotnet>/packs/Microsoft.NETCore.App.Ref/8.0.0/ref/net8.0/System.Runtime.dll
//! <dotnet>/shared/Microsoft.NETCore.App/8.0.0/System.Runtime.dll
//!
//! <package>/ref/netstandard2.0/Foo.dll
//! <package>/lib/netstandard2.0/Foo.dll
//! ```
//!
//! Implementation assemblies often forward types to other assemblies, which is why the
//! lookup also follows type forwards to the assembly that defines the requested type.

use std::{
    collections::HashSet,
    ffi::OsStr,
    fs,
    path::{Component, Path, PathBuf},
};

use quick_xml::{events::Event, Reader};

use crate::{
    file::{BinaryImage, PrefetchMode},
    metadata::{module::ModuleReader, symbol::SymbolKey},
};

/// Maximum number of forwarding hops followed before giving up.
const MAX_FORWARDS: usize = 8;

/// Locates implementation assemblies.
pub trait ImplementationAssemblyLookup: Send + Sync {
    /// Returns the implementation assembly for the reference assembly at `reference_path`.
    fn try_find_implementation_assembly_path(&self, reference_path: &Path) -> Option<PathBuf>;

    /// Follows the type forwards of the top-level type of `symbol`, starting at
    /// `implementation_path`, to the assembly that defines it.
    ///
    /// Returns `None` if a forward leads to an assembly that can not be found or read.
    fn follow_type_forwards(
        &self,
        symbol: &SymbolKey,
        implementation_path: &Path,
        reader: &dyn ModuleReader,
    ) -> Option<PathBuf>;
}

/// Looks up implementation assemblies in .NET SDK installs and NuGet package layouts.
#[derive(Debug, Default, Clone, Copy)]
pub struct SdkImplementationAssemblyLookup;

impl SdkImplementationAssemblyLookup {
    /// Creates the lookup.
    #[must_use]
    pub fn new() -> Self {
        SdkImplementationAssemblyLookup
    }

    /// `packs/<Pack>.Ref/<version>/ref/<tfm>/X.dll` to `shared/<Framework>/<version>/X.dll`.
    fn find_in_sdk(reference_path: &Path) -> Option<PathBuf> {
        let file_name = reference_path.file_name()?;
        let components: Vec<&OsStr> = reference_path
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .collect();
        let packs = components.iter().position(|part| *part == "packs")?;
        let pack = components.get(packs + 1)?.to_str()?;
        let version = components.get(packs + 2)?.to_str()?;

        let mut root = PathBuf::new();
        for component in reference_path.components() {
            if matches!(component, Component::Normal(part) if part == "packs") {
                break;
            }
            root.push(component);
        }

        let pack_directory = root.join("packs").join(pack).join(version);
        let framework = read_framework_name(&pack_directory.join("data").join("FrameworkList.xml"))
            .or_else(|| pack.strip_suffix(".Ref").map(str::to_string))?;

        let shared = root.join("shared").join(framework);
        let exact = shared.join(version).join(file_name);
        if exact.is_file() {
            return Some(exact);
        }

        let major = version.split('.').next()?;
        let mut candidates: Vec<(Vec<u32>, PathBuf)> = fs::read_dir(&shared)
            .ok()?
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if name.split('.').next() != Some(major) {
                    return None;
                }
                let candidate = entry.path().join(file_name);
                candidate.is_file().then(|| (version_key(&name), candidate))
            })
            .collect();
        candidates.sort();
        candidates.pop().map(|(_, path)| path)
    }

    /// `ref/<tfm>/X.dll` to `lib/<tfm>/X.dll` inside a package.
    fn find_in_package(reference_path: &Path) -> Option<PathBuf> {
        let file_name = reference_path.file_name()?;
        let framework_directory = reference_path.parent()?;
        let framework = framework_directory.file_name()?;
        let ref_directory = framework_directory.parent()?;
        if ref_directory.file_name()? != "ref" {
            return None;
        }

        let candidate = ref_directory
            .parent()?
            .join("lib")
            .join(framework)
            .join(file_name);
        candidate.is_file().then_some(candidate)
    }
}

impl ImplementationAssemblyLookup for SdkImplementationAssemblyLookup {
    fn try_find_implementation_assembly_path(&self, reference_path: &Path) -> Option<PathBuf> {
        let found = Self::find_in_package(reference_path).or_else(|| Self::find_in_sdk(reference_path));
        match &found {
            Some(path) => log::debug!(
                "Implementation of '{}' found at '{}'",
                reference_path.display(),
                path.display()
            ),
            None => log::debug!("No implementation for '{}'", reference_path.display()),
        }
        found
    }

    fn follow_type_forwards(
        &self,
        symbol: &SymbolKey,
        implementation_path: &Path,
        reader: &dyn ModuleReader,
    ) -> Option<PathBuf> {
        let top_level = symbol.top_level_type();
        let name = top_level.type_name();

        let mut visited = HashSet::new();
        let mut current = implementation_path.to_path_buf();
        while visited.len() < MAX_FORWARDS {
            if !visited.insert(current.clone()) {
                log::warn!("Type forward cycle at '{}'", current.display());
                return None;
            }

            let module = BinaryImage::from_file(&current, PrefetchMode::Metadata)
                .and_then(|image| reader.read(&image));
            let module = match module {
                Ok(module) => module,
                Err(error) => {
                    log::warn!("Failed to read '{}': {error}", current.display());
                    return None;
                }
            };

            if module.find_type(&top_level.namespace, &name).is_some() {
                return Some(current);
            }
            let Some(forwarded) = module.forwarded_type(&top_level.namespace, &name) else {
                return Some(current);
            };

            let next = current
                .parent()?
                .join(format!("{}.dll", forwarded.destination.name));
            if !next.is_file() {
                log::warn!(
                    "Forward of '{top_level}' points to missing '{}'",
                    next.display()
                );
                return None;
            }
            log::debug!("'{top_level}' is forwarded to '{}'", next.display());
            current = next;
        }

        log::warn!("Too many type forwards for '{top_level}'");
        None
    }
}

/// Reads the `FrameworkName` attribute of a targeting pack's `FrameworkList.xml`.
fn read_framework_name(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let mut reader = Reader::from_str(&text);
    loop {
        match reader.read_event() {
            Ok(Event::Start(element) | Event::Empty(element))
                if element.name().as_ref() == b"FileList" =>
            {
                return element
                    .attributes()
                    .flatten()
                    .find(|attribute| attribute.key.as_ref() == b"FrameworkName")
                    .and_then(|attribute| attribute.unescape_value().ok())
                    .map(|value| value.into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

fn version_key(version: &str) -> Vec<u32> {
    version
        .split(['.', '-'])
        .map_while(|part| part.parse().ok())
        .collect()
}
