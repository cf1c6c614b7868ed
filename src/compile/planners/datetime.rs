//! `datetime` profile siblings
//!
//! With the `datetime` profile active every `timestamp_t` attribute gets a
//! `<name>_dt` companion of type `datetime_t`.

use serde_json::Value;

use super::dictionary::attribute_type;
use super::{core_definitions, ATTRIBUTE_KINDS};
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::definition::PROFILE_KEY;
use crate::repository::Definition;

const DATETIME_PROFILE: &str = "datetime";

/// Names of the siblings a definition is missing
fn missing_siblings(definition: &Definition) -> Vec<(String, String)> {
    definition
        .attribute_names()
        .into_iter()
        .filter(|name| {
            definition
                .attribute(name)
                .and_then(attribute_type)
                .is_some_and(|t| t == "timestamp_t")
        })
        .map(|name| (name.to_string(), format!("{}_dt", name)))
        .filter(|(_, sibling)| definition.attribute(sibling).is_none())
        .collect()
}

pub struct DateTimePlanner;

impl Planner for DateTimePlanner {
    fn name(&self) -> &'static str {
        "datetime"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        if !options.is_profile_enabled(DATETIME_PROFILE) {
            return Ok(Vec::new());
        }
        let ops = core_definitions(proto, ATTRIBUTE_KINDS)
            .into_iter()
            .filter(|(_, definition)| !missing_siblings(definition).is_empty())
            .map(|(location, _)| Op::new(location, OpKind::DateTimeSibling))
            .collect();
        Ok(ops)
    }
}

pub(crate) fn add_siblings(definition: &mut Definition) -> Edit {
    let mut changes = Vec::new();
    for (name, sibling) in missing_siblings(definition) {
        let Some(mut attribute) = definition.attribute(&name).cloned() else {
            continue;
        };
        attribute.insert("type".to_string(), Value::from("datetime_t"));
        attribute.insert(PROFILE_KEY.to_string(), Value::from(DATETIME_PROFILE));
        attribute.insert("requirement".to_string(), Value::from("optional"));
        definition.insert_attribute(sibling.clone(), attribute);
        changes.push(format!("attributes.{}", sibling));
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use crate::repository::Location;
    use serde_json::json;

    fn repo() -> ProtoSchema {
        proto(vec![(
            "events/base_event.json",
            json!({
                "name": "base_event",
                "attributes": {
                    "time": {"caption": "Event Time", "type": "timestamp_t", "requirement": "required"},
                    "message": {"type": "string_t"}
                }
            }),
        )])
    }

    #[test]
    fn test_adds_datetime_sibling() {
        let mut proto = repo();
        let options = CompilationOptions::default();
        let ops = DateTimePlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        run(&mut proto, &ops, &options);

        let base = proto.resolve(&Location::event("base_event")).unwrap();
        assert_eq!(base.attribute_names(), vec!["time", "message", "time_dt"]);
        assert_eq!(
            base.attribute("time_dt").unwrap(),
            json!({"caption": "Event Time", "type": "datetime_t", "requirement": "optional", "profile": "datetime"})
                .as_object()
                .unwrap()
        );
        assert!(DateTimePlanner.analyze(&proto, &options).unwrap().is_empty());
    }

    #[test]
    fn test_skipped_when_profile_inactive() {
        let proto = repo();
        let options = CompilationOptions {
            ignored_profiles: [DATETIME_PROFILE.to_string()].into(),
            ..Default::default()
        };
        assert!(DateTimePlanner.analyze(&proto, &options).unwrap().is_empty());
    }
}
