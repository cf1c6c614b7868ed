//! Planners and phases

use std::fmt;

use serde::Serialize;

use super::op::Op;
use super::planners::{
    annotation::AnnotationPlanner, category::CategoryPlanner, datetime::DateTimePlanner,
    dictionary::DictionaryPlanner, extends::ExtendsPlanner, extension::ExtensionPlanner,
    identifiers::{CategoryIdPlanner, ClassIdPlanner, TypeIdPlanner},
    include::IncludePlanner,
    observable::ObservablePlanner,
    profile::{ProfileRemovePlanner, ProfileTagPlanner},
    schema::SchemaPlanner,
    types::{ObjectTypePlanner, PrefixTypesPlanner},
};
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;

/// Pure analysis producing candidate ops
///
/// A planner reads the schema and options and never writes. The ops it
/// returns may turn into no-ops by the time they are applied.
pub trait Planner: Send + Sync {
    fn name(&self) -> &'static str;

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>>;
}

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Extensions, includes, profiles and inheritance
    Structure,
    /// Categories and dictionary lookups
    Dictionary,
    /// Numeric identifiers, observables and type rewriting
    Identifiers,
    /// Copy into the rendered schema
    Schema,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Structure, Phase::Dictionary, Phase::Identifiers, Phase::Schema];

    /// Planners of this phase, in the order they run
    pub fn planners(&self) -> Vec<Box<dyn Planner>> {
        match self {
            Phase::Structure => vec![
                Box::new(ProfileTagPlanner),
                Box::new(AnnotationPlanner),
                Box::new(ExtensionPlanner),
                Box::new(IncludePlanner),
                Box::new(ProfileRemovePlanner),
                Box::new(ExtendsPlanner),
            ],
            Phase::Dictionary => vec![Box::new(CategoryPlanner), Box::new(DictionaryPlanner)],
            Phase::Identifiers => vec![
                Box::new(CategoryIdPlanner),
                Box::new(ClassIdPlanner),
                Box::new(TypeIdPlanner),
                Box::new(ObservablePlanner),
                Box::new(PrefixTypesPlanner),
                Box::new(ObjectTypePlanner),
                Box::new(DateTimePlanner),
            ],
            Phase::Schema => vec![Box::new(SchemaPlanner)],
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Structure => "structure",
            Phase::Dictionary => "dictionary",
            Phase::Identifiers => "identifiers",
            Phase::Schema => "schema",
        };
        write!(f, "{}", name)
    }
}
