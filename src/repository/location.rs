//! Addresses for definitions
//!
//! A [`Location`] names a definition by kind, name and owning extension.
//! Locations are not tied one-to-one to files: `dictionary.json` hosts one
//! location per attribute, and an extension's class lives at a different
//! location once it has been copied into core.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Kind of definition a location addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// A whole source file (include fragments, version.json)
    File,
    Object,
    /// An event class under `events/<category>/`
    Class,
    /// A top-level event such as `base_event`
    Event,
    Category,
    Profile,
    Extension,
    /// One attribute of a dictionary
    Dictionary,
    /// One type entry of a dictionary
    Type,
    /// An entry of the rendered schema
    Schema(Section),
}

/// Sections of the rendered schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Section {
    Version,
    BaseEvent,
    Classes,
    Objects,
    Categories,
    Profiles,
    Extensions,
    Attributes,
    Types,
}

impl LocationKind {
    /// Kinds whose names are namespaced when copied out of an extension
    pub fn is_prefixable(&self) -> bool {
        matches!(
            self,
            LocationKind::Object | LocationKind::Class | LocationKind::Event | LocationKind::Profile
        )
    }
}

impl fmt::Display for LocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationKind::File => write!(f, "file"),
            LocationKind::Object => write!(f, "object"),
            LocationKind::Class => write!(f, "class"),
            LocationKind::Event => write!(f, "event"),
            LocationKind::Category => write!(f, "category"),
            LocationKind::Profile => write!(f, "profile"),
            LocationKind::Extension => write!(f, "extension"),
            LocationKind::Dictionary => write!(f, "dictionary"),
            LocationKind::Type => write!(f, "type"),
            LocationKind::Schema(section) => write!(f, "schema.{}", section),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Version => "version",
            Section::BaseEvent => "base_event",
            Section::Classes => "classes",
            Section::Objects => "objects",
            Section::Categories => "categories",
            Section::Profiles => "profiles",
            Section::Extensions => "extensions",
            Section::Attributes => "attributes",
            Section::Types => "types",
        };
        write!(f, "{}", name)
    }
}

/// Address of a definition
///
/// Equality, hashing and ordering are by `(kind, name, extension)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Location {
    pub kind: LocationKind,
    pub name: String,
    /// Directory name of the owning extension, `None` for core
    pub extension: Option<String>,
}

impl Location {
    pub fn new(kind: LocationKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            extension: None,
        }
    }

    /// A source file, addressed by its repository-relative path
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new(LocationKind::File, posix(path.as_ref()))
    }

    pub fn object(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Object, name)
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Class, name)
    }

    pub fn event(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Event, name)
    }

    pub fn category(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Category, name)
    }

    pub fn profile(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Profile, name)
    }

    pub fn extension(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Extension, name)
    }

    pub fn dictionary(attribute: impl Into<String>) -> Self {
        Self::new(LocationKind::Dictionary, attribute)
    }

    pub fn dictionary_type(name: impl Into<String>) -> Self {
        Self::new(LocationKind::Type, name)
    }

    pub fn schema(section: Section, key: impl Into<String>) -> Self {
        Self::new(LocationKind::Schema(section), key)
    }

    /// Same address, owned by an extension
    pub fn in_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Same kind and name, in core
    pub fn core(&self) -> Self {
        Self::new(self.kind, self.name.clone())
    }

    pub fn is_core(&self) -> bool {
        self.extension.is_none()
    }

    pub fn section(&self) -> Option<Section> {
        match self.kind {
            LocationKind::Schema(section) => Some(section),
            _ => None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.extension {
            Some(ext) => write!(f, "{}:{} ({})", self.kind, self.name, ext),
            None => write!(f, "{}:{}", self.kind, self.name),
        }
    }
}

/// Render a relative path with forward slashes
pub(crate) fn posix(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Strip a leading `extensions/<ext>/` from a repository-relative path
pub(crate) fn extensionless(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "extensions" => {
            components.next()?;
            Some(components.as_path().to_path_buf())
        }
        _ => None,
    }
}
