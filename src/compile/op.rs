//! Operations and their outcomes
//!
//! An [`Op`] is plain data: a target location and an [`OpKind`] carrying the
//! parameters the planner computed. Nothing is resolved until the op is
//! applied, which makes plans inspectable and orderable before any edit
//! happens.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::planners::{
    annotation, category, datetime, dictionary, extends, extension, identifiers, include,
    observable, profile, schema, types,
};
use crate::config::CompilationOptions;
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, Location};

/// Which part of the subject an include merges into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncludeScope {
    /// Root `$include`: every field
    Definition,
    /// `$include` inside `attributes`: the attributes map only
    Attributes,
}

/// One pending edit at one location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Op {
    pub target: Location,
    #[serde(flatten)]
    pub kind: OpKind,
}

/// Kind-specific parameters of an [`Op`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum OpKind {
    TagProfile {
        profile: String,
    },
    Annotate,
    ExtensionMerge {
        source: Location,
    },
    ExtensionCopy {
        source: Location,
        /// Declared name of the owning extension
        src_extension: String,
        /// Prefixed key, when extension names are namespaced
        key: Option<String>,
    },
    Include {
        source: Location,
        scope: IncludeScope,
    },
    ProfileRemove {
        profile: String,
    },
    Extend {
        source: Location,
    },
    SetCategory {
        category: String,
    },
    DictionaryFill {
        attribute: String,
        source: Location,
    },
    AssignCategoryId {
        category_uid: i64,
        label: String,
        description: Option<String>,
    },
    AssignClassId {
        class_uid: i64,
        label: String,
        description: Option<String>,
        /// Another class already composed to the same uid
        conflict: Option<Location>,
    },
    AssignTypeId {
        class_uid: i64,
        label: String,
    },
    AssignObservable {
        assignments: BTreeMap<String, i64>,
    },
    PrefixTypes {
        renames: BTreeMap<String, String>,
    },
    SetObjectType {
        /// Object key -> caption, for every object type the target references
        objects: BTreeMap<String, Option<String>>,
    },
    DateTimeSibling,
    CopyToSchema {
        source: Location,
    },
}

/// Outcome of applying one op
#[derive(Debug, Clone, PartialEq)]
pub enum MergeResult {
    Applied {
        definition: Arc<Definition>,
        /// Dotted paths of the fields that changed
        changes: Vec<String>,
    },
    /// The edit was vacuous against the current state
    NoOp,
    Failed(String),
}

impl MergeResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, MergeResult::Applied { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, MergeResult::Failed(_))
    }
}

impl fmt::Display for MergeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeResult::Applied { changes, .. } => write!(f, "applied [{}]", changes.join(", ")),
            MergeResult::NoOp => write!(f, "no-op"),
            MergeResult::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

/// Result of an edit function: changed paths, or why it failed
pub(crate) type Edit = std::result::Result<Vec<String>, String>;

impl Op {
    pub fn new(target: Location, kind: OpKind) -> Self {
        Self { target, kind }
    }

    /// Locations this op reads besides its target
    pub fn prerequisites(&self) -> Vec<&Location> {
        match &self.kind {
            OpKind::ExtensionMerge { source }
            | OpKind::ExtensionCopy { source, .. }
            | OpKind::Include { source, .. }
            | OpKind::Extend { source }
            | OpKind::DictionaryFill { source, .. }
            | OpKind::CopyToSchema { source } => vec![source],
            _ => Vec::new(),
        }
    }

    /// Extension location whose content lands at the target
    fn lineage(&self) -> Option<&Location> {
        match &self.kind {
            OpKind::ExtensionMerge { source } | OpKind::ExtensionCopy { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the target may not exist yet
    fn creates_target(&self) -> bool {
        matches!(
            self.kind,
            OpKind::ExtensionCopy { .. } | OpKind::CopyToSchema { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self.kind {
            OpKind::TagProfile { .. } => "tag_profile",
            OpKind::Annotate => "annotate",
            OpKind::ExtensionMerge { .. } => "extension_merge",
            OpKind::ExtensionCopy { .. } => "extension_copy",
            OpKind::Include { .. } => "include",
            OpKind::ProfileRemove { .. } => "profile_remove",
            OpKind::Extend { .. } => "extend",
            OpKind::SetCategory { .. } => "set_category",
            OpKind::DictionaryFill { .. } => "dictionary_fill",
            OpKind::AssignCategoryId { .. } => "assign_category_id",
            OpKind::AssignClassId { .. } => "assign_class_id",
            OpKind::AssignTypeId { .. } => "assign_type_id",
            OpKind::AssignObservable { .. } => "assign_observable",
            OpKind::PrefixTypes { .. } => "prefix_types",
            OpKind::SetObjectType { .. } => "set_object_type",
            OpKind::DateTimeSibling => "datetime_sibling",
            OpKind::CopyToSchema { .. } => "copy_to_schema",
        }
    }

    /// Compute this op's outcome against the current state without writing it
    pub fn apply(&self, proto: &ProtoSchema, options: &CompilationOptions) -> MergeResult {
        let current = proto.get(&self.target).cloned();
        if current.is_none() && !self.creates_target() {
            return MergeResult::Failed(format!("target {} not found", self.target));
        }

        let mut definition = current
            .as_deref()
            .cloned()
            .unwrap_or_default();

        let edit = self.edit(&mut definition, proto, options);
        match edit {
            Err(reason) => MergeResult::Failed(reason),
            Ok(changes) => {
                let unchanged = match current.as_deref() {
                    Some(current) => changes.is_empty() || current == &definition,
                    None => false,
                };
                if unchanged {
                    MergeResult::NoOp
                } else {
                    MergeResult::Applied {
                        definition: Arc::new(definition),
                        changes,
                    }
                }
            }
        }
    }

    fn edit(&self, definition: &mut Definition, proto: &ProtoSchema, options: &CompilationOptions) -> Edit {
        match &self.kind {
            OpKind::TagProfile { profile } => profile::tag(definition, profile),
            OpKind::Annotate => annotation::annotate(definition),
            OpKind::ExtensionMerge { source } => extension::merge(definition, &*resolve(proto, source)?),
            OpKind::ExtensionCopy {
                source,
                src_extension,
                key,
            } => extension::copy(definition, &*resolve(proto, source)?, src_extension, key.as_deref()),
            OpKind::Include { source, scope } => include::include(definition, &*resolve(proto, source)?, *scope),
            OpKind::ProfileRemove { profile } => profile::remove(definition, profile, options),
            OpKind::Extend { source } => extends::extend(definition, &*resolve(proto, source)?),
            OpKind::SetCategory { category } => category::set(definition, category, proto),
            OpKind::DictionaryFill { attribute, source } => {
                dictionary::fill(definition, attribute, &*resolve(proto, source)?)
            }
            OpKind::AssignCategoryId {
                category_uid,
                label,
                description,
            } => identifiers::assign_category(definition, *category_uid, label, description.as_deref()),
            OpKind::AssignClassId {
                class_uid,
                label,
                description,
                conflict,
            } => {
                if let Some(other) = conflict {
                    return Err(format!("class_uid {} is already assigned to {}", class_uid, other));
                }
                identifiers::assign_class(definition, *class_uid, label, description.as_deref())
            }
            OpKind::AssignTypeId { class_uid, label } => identifiers::assign_type(definition, *class_uid, label),
            OpKind::AssignObservable { assignments } => observable::assign(definition, assignments),
            OpKind::PrefixTypes { renames } => types::prefix(definition, self.target.kind, renames),
            OpKind::SetObjectType { objects } => types::set_object_types(definition, self.target.kind, objects),
            OpKind::DateTimeSibling => datetime::add_siblings(definition),
            OpKind::CopyToSchema { source } => schema::copy(definition, &*resolve(proto, source)?),
        }
    }
}

fn resolve(proto: &ProtoSchema, location: &Location) -> std::result::Result<Arc<Definition>, String> {
    proto.resolve(location).map_err(|e| e.to_string())
}

/// Apply an op and write its outcome into the working set
///
/// An op whose prerequisite (or target) already failed fails without
/// running, so failures propagate along dependencies.
pub(crate) fn execute(op: &Op, proto: &mut ProtoSchema, options: &CompilationOptions) -> MergeResult {
    let blocked = op
        .prerequisites()
        .into_iter()
        .chain(std::iter::once(&op.target))
        .find(|l| proto.failure(l).is_some())
        .cloned();

    let result = match blocked {
        Some(location) if location == op.target => {
            MergeResult::Failed(format!("{} already failed", location))
        }
        Some(location) => MergeResult::Failed(format!("prerequisite {} failed", location)),
        None => op.apply(proto, options),
    };

    match &result {
        MergeResult::Applied { definition, changes } => {
            debug!("{}: {} changed", op, changes.len());
            proto.write(op.target.clone(), definition.clone());
            if let Some(origin) = op.lineage() {
                proto.record_lineage(op.target.clone(), origin.clone());
            }
        }
        MergeResult::NoOp => {
            if let Some(origin) = op.lineage() {
                proto.record_lineage(op.target.clone(), origin.clone());
            }
        }
        MergeResult::Failed(reason) => {
            debug!("{} failed: {}", op, reason);
            proto.mark_failed(op.target.clone(), reason.clone());
        }
    }
    result
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label(), self.target)?;
        match &self.kind {
            OpKind::TagProfile { profile } | OpKind::ProfileRemove { profile } => write!(f, " [{}]", profile),
            OpKind::SetCategory { category } => write!(f, " [{}]", category),
            OpKind::DictionaryFill { attribute, source } => write!(f, ".{} <- {}", attribute, source),
            OpKind::AssignCategoryId { category_uid: uid, .. }
            | OpKind::AssignClassId { class_uid: uid, .. }
            | OpKind::AssignTypeId { class_uid: uid, .. } => write!(f, " = {}", uid),
            _ => match self.prerequisites().first() {
                Some(source) => write!(f, " <- {}", source),
                None => Ok(()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{Repository, Section};
    use serde_json::json;

    fn proto() -> ProtoSchema {
        let mut repo = Repository::new();
        repo.insert_file(
            "events/network/http_activity.json",
            json!({"name": "http_activity", "extends": "network", "attributes": {"status_code": {"requirement": "optional"}}}),
        )
        .unwrap();
        repo.insert_file(
            "events/network/network.json",
            json!({"name": "network", "description": "Network events", "attributes": {"src_endpoint": {}}}),
        )
        .unwrap();
        ProtoSchema::new(Arc::new(repo))
    }

    fn extend_op() -> Op {
        Op::new(
            Location::class("http_activity"),
            OpKind::Extend {
                source: Location::class("network"),
            },
        )
    }

    #[test]
    fn test_apply_does_not_write() {
        let proto = proto();
        let result = extend_op().apply(&proto, &CompilationOptions::default());
        assert!(result.is_applied());
        assert!(proto.edited().next().is_none());
    }

    #[test]
    fn test_execute_writes_and_second_run_is_noop() {
        let mut proto = proto();
        let options = CompilationOptions::default();
        let op = extend_op();

        match execute(&op, &mut proto, &options) {
            MergeResult::Applied { definition, changes } => {
                assert_eq!(definition.description(), Some("Network events"));
                assert!(changes.contains(&"attributes.src_endpoint".to_string()));
            }
            other => panic!("Expected Applied, got {:?}", other),
        }
        assert_eq!(execute(&op, &mut proto, &options), MergeResult::NoOp);
    }

    #[test]
    fn test_sourced_ops_read_the_source_definition() {
        let proto = proto();
        let options = CompilationOptions::default();
        let target = Location::class("http_activity");
        let network = Location::class("network");

        let include = Op::new(
            target.clone(),
            OpKind::Include {
                source: network.clone(),
                scope: IncludeScope::Attributes,
            },
        );
        match include.apply(&proto, &options) {
            MergeResult::Applied { changes, .. } => assert_eq!(changes, vec!["attributes.src_endpoint"]),
            other => panic!("Expected Applied, got {:?}", other),
        }

        let copy = Op::new(
            Location::schema(Section::Classes, "network"),
            OpKind::CopyToSchema { source: network },
        );
        assert!(copy.apply(&proto, &options).is_applied());

        let dangling = Op::new(
            target,
            OpKind::Extend {
                source: Location::class("ftp_activity"),
            },
        );
        assert!(dangling.apply(&proto, &options).is_failed());
    }

    #[test]
    fn test_missing_target_fails() {
        let proto = proto();
        let op = Op::new(Location::class("ftp_activity"), OpKind::Annotate);
        assert!(op.apply(&proto, &CompilationOptions::default()).is_failed());
    }

    #[test]
    fn test_failure_propagates_to_dependents() {
        let mut proto = proto();
        let options = CompilationOptions::default();
        let conflict = Op::new(
            Location::class("network"),
            OpKind::AssignClassId {
                class_uid: 4001,
                label: "Network".to_string(),
                description: None,
                conflict: Some(Location::class("dns_activity")),
            },
        );
        assert!(execute(&conflict, &mut proto, &options).is_failed());
        match execute(&extend_op(), &mut proto, &options) {
            MergeResult::Failed(reason) => assert!(reason.contains("prerequisite class:network")),
            other => panic!("Expected Failed, got {:?}", other),
        }
        assert!(proto.failure(&Location::class("http_activity")).is_some());
    }

    #[test]
    fn test_display() {
        assert_eq!(extend_op().to_string(), "extend class:http_activity <- class:network");
        let op = Op::new(
            Location::class("http_activity"),
            OpKind::ProfileRemove {
                profile: "cloud".to_string(),
            },
        );
        assert_eq!(op.to_string(), "profile_remove class:http_activity [cloud]");
    }

    #[test]
    fn test_ops_serialize_for_inspection() {
        let value = serde_json::to_value(extend_op()).unwrap();
        assert_eq!(value["op"], "extend");
        assert_eq!(value["target"]["name"], "http_activity");
        assert_eq!(value["source"]["kind"], "class");
    }
}
