//! Source Repository
//!
//! In-memory, read-only view of an OCSF source tree. Every JSON file is
//! classified by its path into one or more [`Location`]s:
//!
//! ```text
//! objects/**/<name>.json                 -> object
//! events/<category>/**/<name>.json       -> class
//! events/<name>.json                     -> event (base_event)
//! profiles/**/<name>.json                -> profile
//! includes/**/*.json                     -> file
//! dictionary.json                        -> dictionary (per attribute), type (per type)
//! categories.json                        -> category (per category)
//! version.json                           -> file
//! extensions/<ext>/extension.json        -> extension
//! extensions/<ext>/<any of the above>    -> same kind, owned by <ext>
//! ```

pub mod definition;
pub mod loader;
pub mod location;

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;

use crate::checksum::Checksum;
use crate::error::{CompileError, Result};

pub use definition::Definition;
pub use loader::load_from_directory;
pub use location::{Location, LocationKind, Section};

pub const DICTIONARY_FILE: &str = "dictionary.json";
pub const CATEGORIES_FILE: &str = "categories.json";
pub const VERSION_FILE: &str = "version.json";
pub const EXTENSION_FILE: &str = "extension.json";

/// Read-only source definitions, keyed by location
#[derive(Debug, Default)]
pub struct Repository {
    definitions: BTreeMap<Location, Arc<Definition>>,
    /// Location -> repository-relative file it was read from
    sources: HashMap<Location, PathBuf>,
    /// Single-definition file -> its location
    by_path: HashMap<PathBuf, Location>,
    fingerprint: Option<Checksum>,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a repository from disk
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        load_from_directory(dir.as_ref())
    }

    /// Classify one parsed file and add the definitions it hosts
    ///
    /// `path` is relative to the repository root.
    pub fn insert_file(&mut self, path: impl AsRef<Path>, value: Value) -> Result<()> {
        let path = path.as_ref();
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CompileError::invalid(
                    path,
                    format!("expected a JSON object, found {}", json_type(&other)),
                ))
            }
        };

        let (extension, rest) = split_extension(path)?;
        let parts: Vec<String> = rest
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let stem = rest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let named = |kind: LocationKind, map: &serde_json::Map<String, Value>| {
            let name = map
                .get("name")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| stem.clone());
            Location::new(kind, name)
        };

        let parts: Vec<&str> = parts.iter().map(String::as_str).collect();
        match parts.as_slice() {
            [DICTIONARY_FILE] => self.insert_dictionary(path, extension.as_deref(), map),
            [CATEGORIES_FILE] => self.insert_categories(path, extension.as_deref(), map),
            [EXTENSION_FILE] => match extension {
                Some(ext) => {
                    let location = Location::extension(ext.clone());
                    self.insert_single(path, location, Definition::from_map(map))
                }
                None => Err(CompileError::invalid(
                    path,
                    "extension.json outside of an extension directory",
                )),
            },
            [VERSION_FILE] => {
                if let Some(version) = map.get("version").and_then(Value::as_str) {
                    semver::Version::parse(version).map_err(|e| {
                        CompileError::invalid(path, format!("invalid version {:?}: {}", version, e))
                    })?;
                }
                let location = with_extension(Location::file(rest), extension);
                self.insert_single(path, location, Definition::from_map(map))
            }
            ["objects", .., _] => {
                let location = with_extension(named(LocationKind::Object, &map), extension);
                self.insert_single(path, location, Definition::from_map(map))
            }
            ["events", _] => {
                let location = with_extension(named(LocationKind::Event, &map), extension);
                self.insert_single(path, location, Definition::from_map(map))
            }
            ["events", _, .., _] => {
                let location = with_extension(named(LocationKind::Class, &map), extension);
                self.insert_single(path, location, Definition::from_map(map))
            }
            ["profiles", .., _] => {
                let location = with_extension(named(LocationKind::Profile, &map), extension);
                self.insert_single(path, location, Definition::from_map(map))
            }
            ["includes", .., _] => {
                let location = with_extension(Location::file(rest), extension);
                self.insert_single(path, location, Definition::from_map(map))
            }
            _ => Err(CompileError::invalid(path, "unrecognized repository path")),
        }
    }

    fn insert_single(&mut self, path: &Path, location: Location, definition: Definition) -> Result<()> {
        self.insert(path, location.clone(), definition)?;
        self.by_path.insert(path.to_path_buf(), location);
        Ok(())
    }

    fn insert(&mut self, path: &Path, location: Location, definition: Definition) -> Result<()> {
        if let Some(existing) = self.sources.get(&location) {
            return Err(CompileError::invalid(
                path,
                format!("{} is already defined by {}", location, existing.display()),
            ));
        }
        self.sources.insert(location.clone(), path.to_path_buf());
        self.definitions.insert(location, Arc::new(definition));
        Ok(())
    }

    fn insert_dictionary(
        &mut self,
        path: &Path,
        extension: Option<&str>,
        mut map: serde_json::Map<String, Value>,
    ) -> Result<()> {
        if let Some(Value::Object(attributes)) = map.remove("attributes") {
            for (name, attribute) in attributes {
                let location = scoped(Location::dictionary(name), extension);
                self.insert_entry(path, location, attribute)?;
            }
        }
        let types = map
            .remove("types")
            .and_then(|t| match t {
                Value::Object(mut t) => t.remove("attributes"),
                _ => None,
            });
        if let Some(Value::Object(types)) = types {
            for (name, ty) in types {
                let location = scoped(Location::dictionary_type(name), extension);
                self.insert_entry(path, location, ty)?;
            }
        }
        Ok(())
    }

    fn insert_categories(
        &mut self,
        path: &Path,
        extension: Option<&str>,
        mut map: serde_json::Map<String, Value>,
    ) -> Result<()> {
        if let Some(Value::Object(categories)) = map.remove("attributes") {
            for (name, category) in categories {
                let location = scoped(Location::category(name.clone()), extension);
                let mut definition = entry_definition(path, &location, category)?;
                if !definition.contains("name") {
                    definition.set("name", name);
                }
                self.insert(path, location, definition)?;
            }
        }
        Ok(())
    }

    fn insert_entry(&mut self, path: &Path, location: Location, value: Value) -> Result<()> {
        let definition = entry_definition(path, &location, value)?;
        self.insert(path, location, definition)
    }

    pub(crate) fn set_fingerprint(&mut self, fingerprint: Checksum) {
        self.fingerprint = Some(fingerprint);
    }

    // ===== Queries =====

    pub fn get(&self, location: &Location) -> Option<&Arc<Definition>> {
        self.definitions.get(location)
    }

    pub fn contains(&self, location: &Location) -> bool {
        self.definitions.contains_key(location)
    }

    /// Every location, in location order
    pub fn locations(&self) -> impl Iterator<Item = &Location> + '_ {
        self.definitions.keys()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// File a location was read from
    pub fn source_path(&self, location: &Location) -> Option<&Path> {
        self.sources.get(location).map(PathBuf::as_path)
    }

    /// Location hosted by a single-definition file
    pub fn location_for_path(&self, path: &Path) -> Option<&Location> {
        self.by_path.get(path)
    }

    /// Extension directory names
    pub fn extensions(&self) -> BTreeSet<&str> {
        self.definitions
            .keys()
            .filter(|l| l.kind == LocationKind::Extension)
            .map(|l| l.name.as_str())
            .collect()
    }

    /// Profile names across core and extensions
    pub fn profiles(&self) -> BTreeSet<&str> {
        self.definitions
            .keys()
            .filter(|l| l.kind == LocationKind::Profile)
            .map(|l| l.name.as_str())
            .collect()
    }

    /// SHA-256 over every file, when loaded from disk
    pub fn fingerprint(&self) -> Option<&Checksum> {
        self.fingerprint.as_ref()
    }
}

/// Split `extensions/<ext>/<rest>` into `(Some(ext), rest)`
fn split_extension(path: &Path) -> Result<(Option<String>, PathBuf)> {
    match location::extensionless(path) {
        Some(rest) => {
            let ext = path
                .components()
                .nth(1)
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .ok_or_else(|| CompileError::invalid(path, "missing extension directory"))?;
            Ok((Some(ext), rest))
        }
        None => Ok((None, path.to_path_buf())),
    }
}

fn with_extension(location: Location, extension: Option<String>) -> Location {
    match extension {
        Some(ext) => location.in_extension(ext),
        None => location,
    }
}

fn scoped(location: Location, extension: Option<&str>) -> Location {
    with_extension(location, extension.map(str::to_string))
}

fn entry_definition(path: &Path, location: &Location, value: Value) -> Result<Definition> {
    Definition::from_value(value)
        .ok_or_else(|| CompileError::invalid(path, format!("{} is not a JSON object", location)))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
