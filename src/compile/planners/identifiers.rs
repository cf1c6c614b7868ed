//! Numeric identifiers of event classes
//!
//! ```text
//! class_uid = extension_uid * 100000 + category_uid * 1000 + uid
//! type_uid  = class_uid * 100 + activity_id
//! ```
//!
//! Each identifier attribute ends up with an enum holding exactly the
//! member that applies to the class, and the matching `*_name` attribute's
//! description names it. `base_event` has no uid of its own and is given
//! class_uid 0.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::warn;

use super::core_definitions;
use super::extension::declared_names;
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, Location, LocationKind};

const CLASSES: &[LocationKind] = &[LocationKind::Class];
const EVENTS: &[LocationKind] = &[LocationKind::Class, LocationKind::Event];
const BASE_EVENT: &str = "base_event";

pub struct CategoryIdPlanner;

impl Planner for CategoryIdPlanner {
    fn name(&self) -> &'static str {
        "category_id"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, CLASSES) {
            let Some(category) = definition.category().and_then(|c| category(proto, c)) else {
                continue;
            };
            let Some(category_uid) = category.uid() else {
                continue;
            };
            let label = category.caption().or(category.name()).unwrap_or_default();
            ops.push(Op::new(
                location,
                OpKind::AssignCategoryId {
                    category_uid,
                    label: label.to_string(),
                    description: category.description().map(str::to_string),
                },
            ));
        }
        Ok(ops)
    }
}

pub struct ClassIdPlanner;

impl Planner for ClassIdPlanner {
    fn name(&self) -> &'static str {
        "class_id"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let extensions = extension_uids(proto);
        let mut assigned: BTreeMap<i64, Location> = BTreeMap::new();
        let mut ops = Vec::new();

        for (location, definition) in core_definitions(proto, EVENTS) {
            let class_uid = match definition.uid() {
                Some(uid) => {
                    let extension_uid = match definition.src_extension() {
                        Some(name) => extensions.get(name).copied().unwrap_or_else(|| {
                            warn!("{}: extension {:?} has no uid", location, name);
                            0
                        }),
                        None => 0,
                    };
                    let category_uid = definition
                        .category()
                        .and_then(|c| category(proto, c))
                        .and_then(|c| c.uid())
                        .unwrap_or(0);
                    match compose_class_uid(extension_uid, category_uid, uid) {
                        Some(class_uid) => class_uid,
                        None => {
                            warn!(
                                "{}: class_uid of extension {} category {} uid {} overflows",
                                location, extension_uid, category_uid, uid
                            );
                            continue;
                        }
                    }
                }
                None if location.name == BASE_EVENT => 0,
                None => continue,
            };

            let conflict = match assigned.get(&class_uid) {
                Some(first) => Some(first.clone()),
                None => {
                    assigned.insert(class_uid, location.clone());
                    None
                }
            };
            let label = definition.caption().or(definition.name()).unwrap_or(location.name.as_str());
            ops.push(Op::new(
                location.clone(),
                OpKind::AssignClassId {
                    class_uid,
                    label: label.to_string(),
                    description: definition.description().map(str::to_string),
                    conflict,
                },
            ));
        }
        Ok(ops)
    }
}

pub struct TypeIdPlanner;

impl Planner for TypeIdPlanner {
    fn name(&self) -> &'static str {
        "type_id"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, EVENTS) {
            let Some(class_uid) = definition.uid() else {
                continue;
            };
            if activities(&definition).is_empty() {
                continue;
            }
            let label = definition.caption().or(definition.name()).unwrap_or(location.name.as_str());
            ops.push(Op::new(
                location.clone(),
                OpKind::AssignTypeId {
                    class_uid,
                    label: label.to_string(),
                },
            ));
        }
        Ok(ops)
    }
}

fn compose_class_uid(extension_uid: i64, category_uid: i64, uid: i64) -> Option<i64> {
    extension_uid
        .checked_mul(100_000)?
        .checked_add(category_uid.checked_mul(1000)?)?
        .checked_add(uid)
}

fn category(proto: &ProtoSchema, name: &str) -> Option<std::sync::Arc<Definition>> {
    let location = proto.find_by_name(&[LocationKind::Category], name, None)?;
    proto.get(&location).cloned()
}

/// Declared extension name (and directory) -> extension uid
fn extension_uids(proto: &ProtoSchema) -> BTreeMap<String, i64> {
    let mut uids = BTreeMap::new();
    for (directory, declared) in declared_names(proto) {
        let uid = proto
            .get(&Location::extension(directory.clone()))
            .and_then(|d| d.uid());
        if let Some(uid) = uid {
            uids.insert(declared, uid);
            uids.insert(directory, uid);
        }
    }
    uids
}

/// `activity_id` enum members as `(id, caption, description)`
fn activities(definition: &Definition) -> Vec<(i64, String, Option<String>)> {
    let Some(members) = definition
        .attribute("activity_id")
        .and_then(|a| a.get("enum"))
        .and_then(Value::as_object)
    else {
        return Vec::new();
    };
    members
        .iter()
        .filter_map(|(id, member)| {
            let id = id.parse::<i64>().ok()?;
            let caption = member.get("caption").and_then(Value::as_str).unwrap_or_default();
            let description = member.get("description").and_then(Value::as_str).map(str::to_string);
            Some((id, caption.to_string(), description))
        })
        .collect()
}

fn member(caption: &str, description: Option<&str>) -> Value {
    let mut member = Map::new();
    member.insert("caption".to_string(), json!(caption));
    if let Some(description) = description {
        member.insert("description".to_string(), json!(description));
    }
    Value::Object(member)
}

/// Replace an attribute's enum, creating the attribute if needed
fn set_enum(definition: &mut Definition, attribute: &str, members: Map<String, Value>, changes: &mut Vec<String>) {
    let members = Value::Object(members);
    match definition.attribute_mut(attribute) {
        Some(existing) => {
            if existing.get("enum") != Some(&members) {
                existing.insert("enum".to_string(), members);
                changes.push(format!("attributes.{}.enum", attribute));
            }
        }
        None => {
            let mut created = Map::new();
            created.insert("enum".to_string(), members);
            definition.insert_attribute(attribute, created);
            changes.push(format!("attributes.{}", attribute));
        }
    }
}

/// Append `: <code>{label}</code>.` to a sibling's description, once
fn label_sibling(definition: &mut Definition, attribute: &str, label: &str, changes: &mut Vec<String>) {
    let Some(sibling) = definition.attribute_mut(attribute) else {
        return;
    };
    let Some(description) = sibling.get("description").and_then(Value::as_str) else {
        return;
    };
    let suffix = format!(": <code>{}</code>.", label);
    if description.ends_with(&suffix) {
        return;
    }
    let base = description.strip_suffix('.').unwrap_or(description);
    let labelled = format!("{}{}", base, suffix);
    sibling.insert("description".to_string(), Value::String(labelled));
    changes.push(format!("attributes.{}.description", attribute));
}

pub(crate) fn assign_category(
    definition: &mut Definition,
    category_uid: i64,
    label: &str,
    description: Option<&str>,
) -> Edit {
    let mut changes = Vec::new();
    let mut members = Map::new();
    members.insert(category_uid.to_string(), member(label, description));
    set_enum(definition, "category_uid", members, &mut changes);
    label_sibling(definition, "category_name", label, &mut changes);
    Ok(changes)
}

pub(crate) fn assign_class(
    definition: &mut Definition,
    class_uid: i64,
    label: &str,
    description: Option<&str>,
) -> Edit {
    let mut changes = Vec::new();
    if definition.uid() != Some(class_uid) {
        definition.set("uid", class_uid);
        changes.push("uid".to_string());
    }
    let mut members = Map::new();
    members.insert(class_uid.to_string(), member(label, description));
    set_enum(definition, "class_uid", members, &mut changes);
    label_sibling(definition, "class_name", label, &mut changes);
    Ok(changes)
}

pub(crate) fn assign_type(definition: &mut Definition, class_uid: i64, label: &str) -> Edit {
    let activities = activities(definition);
    if activities.is_empty() {
        return Ok(Vec::new());
    }

    let mut members = Map::new();
    for (id, caption, description) in activities {
        let type_uid = class_uid
            .checked_mul(100)
            .and_then(|v| v.checked_add(id))
            .ok_or_else(|| format!("type_uid of class_uid {} activity {} overflows", class_uid, id))?;
        let caption = format!("{}: {}", label, caption);
        members.insert(type_uid.to_string(), member(&caption, description.as_deref()));
    }
    let mut changes = Vec::new();
    set_enum(definition, "type_uid", members, &mut changes);
    Ok(changes)
}
