//! Attribute type rewriting
//!
//! Two passes over the `type` of every attribute (and every dictionary
//! entry): types naming an object copied from an extension are rewritten to
//! the object's prefixed key, then types naming any object become `object_t`
//! with the object recorded beside them.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::core_definitions;
use super::dictionary::attribute_type;
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, LocationKind};

const OBJECT_T: &str = "object_t";

/// Kinds whose attribute types are rewritten; a dictionary entry is its own attribute
const TYPED_KINDS: &[LocationKind] = &[
    LocationKind::Object,
    LocationKind::Class,
    LocationKind::Event,
    LocationKind::Profile,
    LocationKind::Dictionary,
];

/// Attribute name and type pairs of a definition
fn typed_attributes(definition: &Definition, kind: LocationKind) -> Vec<(String, String)> {
    if kind == LocationKind::Dictionary {
        return definition
            .get_str("type")
            .map(|t| vec![(String::new(), t.to_string())])
            .unwrap_or_default();
    }
    definition
        .attribute_names()
        .into_iter()
        .filter_map(|name| {
            let ty = attribute_type(definition.attribute(name)?)?;
            Some((name.to_string(), ty.to_string()))
        })
        .collect()
}

/// Mutable access to the map holding `type` for one typed attribute
fn typed_slot<'a>(definition: &'a mut Definition, kind: LocationKind, name: &str) -> Option<&'a mut Map<String, Value>> {
    if kind == LocationKind::Dictionary {
        Some(definition.as_map_mut())
    } else {
        definition.attribute_mut(name)
    }
}

fn change_path(kind: LocationKind, name: &str, field: &str) -> String {
    if kind == LocationKind::Dictionary {
        field.to_string()
    } else {
        format!("attributes.{}.{}", name, field)
    }
}

pub struct PrefixTypesPlanner;

impl Planner for PrefixTypesPlanner {
    fn name(&self) -> &'static str {
        "prefix_types"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        if !options.prefix_extensions {
            return Ok(Vec::new());
        }

        // plain object name -> (extension, prefixed key)
        let mut prefixed: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
        for (location, definition) in core_definitions(proto, &[LocationKind::Object]) {
            let (Some(extension), Some(key)) = (definition.src_extension(), definition.key()) else {
                continue;
            };
            let name = definition.name().unwrap_or(location.name.as_str());
            if key != name {
                prefixed
                    .entry(name.to_string())
                    .or_default()
                    .push((extension.to_string(), key.to_string()));
            }
        }
        if prefixed.is_empty() {
            return Ok(Vec::new());
        }

        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, TYPED_KINDS) {
            let renames: BTreeMap<String, String> = typed_attributes(&definition, location.kind)
                .into_iter()
                .filter_map(|(_, ty)| {
                    let candidates = prefixed.get(&ty)?;
                    let (_, key) = candidates
                        .iter()
                        .find(|(ext, _)| Some(ext.as_str()) == definition.src_extension())
                        .or_else(|| candidates.first())?;
                    Some((ty, key.clone()))
                })
                .collect();
            if !renames.is_empty() {
                ops.push(Op::new(location, OpKind::PrefixTypes { renames }));
            }
        }
        Ok(ops)
    }
}

pub struct ObjectTypePlanner;

impl Planner for ObjectTypePlanner {
    fn name(&self) -> &'static str {
        "object_type"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        if !options.set_object_types {
            return Ok(Vec::new());
        }

        let objects: BTreeMap<String, Option<String>> = core_definitions(proto, &[LocationKind::Object])
            .into_iter()
            .map(|(location, definition)| {
                let key = definition.key().unwrap_or(location.name.as_str()).to_string();
                (key, definition.caption().map(str::to_string))
            })
            .collect();

        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, TYPED_KINDS) {
            let referenced: BTreeSet<String> = typed_attributes(&definition, location.kind)
                .into_iter()
                .map(|(_, ty)| ty)
                .filter(|ty| !ty.ends_with("_t"))
                .collect();
            if referenced.is_empty() {
                continue;
            }
            let known = referenced
                .into_iter()
                .filter_map(|ty| objects.get(&ty).map(|caption| (ty, caption.clone())))
                .collect();
            ops.push(Op::new(location, OpKind::SetObjectType { objects: known }));
        }
        Ok(ops)
    }
}

/// Rewrite types to prefixed object keys
pub(crate) fn prefix(definition: &mut Definition, kind: LocationKind, renames: &BTreeMap<String, String>) -> Edit {
    let mut changes = Vec::new();
    for (name, ty) in typed_attributes(definition, kind) {
        let Some(renamed) = renames.get(&ty) else {
            continue;
        };
        if let Some(slot) = typed_slot(definition, kind, &name) {
            slot.insert("type".to_string(), Value::String(renamed.clone()));
            changes.push(change_path(kind, &name, "type"));
        }
    }
    Ok(changes)
}

/// Rewrite object-typed attributes to `object_t`
///
/// Fails on a non-primitive type that names no known object.
pub(crate) fn set_object_types(
    definition: &mut Definition,
    kind: LocationKind,
    objects: &BTreeMap<String, Option<String>>,
) -> Edit {
    let mut changes = Vec::new();
    for (name, ty) in typed_attributes(definition, kind) {
        if ty.ends_with("_t") {
            continue;
        }
        let Some(caption) = objects.get(&ty) else {
            return Err(format!("unknown object type {:?}", ty));
        };
        let Some(slot) = typed_slot(definition, kind, &name) else {
            continue;
        };
        slot.insert("type".to_string(), Value::String(OBJECT_T.to_string()));
        slot.insert("object_type".to_string(), Value::String(ty.clone()));
        if let Some(caption) = caption {
            slot.insert("object_name".to_string(), Value::String(caption.clone()));
        }
        changes.push(change_path(kind, &name, "type"));
    }
    Ok(changes)
}
