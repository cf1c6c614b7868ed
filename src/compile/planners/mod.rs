//! Concrete planners
//!
//! Each module holds one planner family: the planner that emits ops and the
//! edit functions those ops run when applied.

pub mod annotation;
pub mod category;
pub mod datetime;
pub mod dictionary;
pub mod extends;
pub mod extension;
pub mod identifiers;
pub mod include;
pub mod observable;
pub mod profile;
pub mod schema;
pub mod types;

use std::sync::Arc;

use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, Location, LocationKind};

/// Kinds whose definitions carry attributes of their own
pub(crate) const ATTRIBUTE_KINDS: &[LocationKind] = &[
    LocationKind::Object,
    LocationKind::Class,
    LocationKind::Event,
    LocationKind::Profile,
];

/// Kinds that participate in inheritance
pub(crate) const RECORD_KINDS: &[LocationKind] =
    &[LocationKind::Object, LocationKind::Class, LocationKind::Event];

/// Core definitions of the given kinds, in location order
pub(crate) fn core_definitions(proto: &ProtoSchema, kinds: &[LocationKind]) -> Vec<(Location, Arc<Definition>)> {
    proto
        .core_locations(kinds)
        .into_iter()
        .filter_map(|l| proto.get(&l).cloned().map(|d| (l, d)))
        .collect()
}

/// Kinds an `extends` on a definition of `kind` may point at
pub(crate) fn family(kind: LocationKind) -> &'static [LocationKind] {
    match kind {
        LocationKind::Class | LocationKind::Event => &[LocationKind::Class, LocationKind::Event],
        _ => &[LocationKind::Object],
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use serde_json::Value;

    use crate::compile::op::{execute, Op};
    use crate::config::CompilationOptions;
    use crate::protoschema::ProtoSchema;
    use crate::repository::Repository;

    /// Working state over an in-memory repository
    pub fn proto(files: Vec<(&str, Value)>) -> ProtoSchema {
        let mut repo = Repository::new();
        for (path, value) in files {
            repo.insert_file(path, value).unwrap();
        }
        ProtoSchema::new(Arc::new(repo))
    }

    /// Apply ops in order, writing their results
    pub fn run(proto: &mut ProtoSchema, ops: &[Op], options: &CompilationOptions) {
        for op in ops {
            execute(op, proto, options);
        }
    }
}
