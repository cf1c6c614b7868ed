//! Observable type ids
//!
//! Dictionary attributes and types may declare an `observable` id. Every
//! attribute named like an observable dictionary attribute, or typed with an
//! observable type, is tagged with that id. A name match wins over a type
//! match.

use std::collections::BTreeMap;

use serde_json::Value;

use super::dictionary::attribute_type;
use super::{core_definitions, ATTRIBUTE_KINDS};
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, LocationKind};

const OBSERVABLE_KEY: &str = "observable";

/// Observable ids by dictionary attribute name and by type name
#[derive(Debug, Default)]
struct Registry {
    attributes: BTreeMap<String, i64>,
    types: BTreeMap<String, i64>,
}

impl Registry {
    fn build(proto: &ProtoSchema) -> Self {
        let mut registry = Registry::default();
        for (location, definition) in core_definitions(proto, &[LocationKind::Dictionary, LocationKind::Type]) {
            let Some(id) = definition.get(OBSERVABLE_KEY).and_then(Value::as_i64) else {
                continue;
            };
            let table = match location.kind {
                LocationKind::Dictionary => &mut registry.attributes,
                _ => &mut registry.types,
            };
            table.insert(location.name, id);
        }
        registry
    }

    fn lookup(&self, name: &str, attribute: &serde_json::Map<String, Value>) -> Option<i64> {
        self.attributes
            .get(name)
            .or_else(|| attribute_type(attribute).and_then(|t| self.types.get(t)))
            .copied()
    }

    fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.types.is_empty()
    }
}

pub struct ObservablePlanner;

impl Planner for ObservablePlanner {
    fn name(&self) -> &'static str {
        "observable"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        if !options.set_observable {
            return Ok(Vec::new());
        }
        let registry = Registry::build(proto);
        if registry.is_empty() {
            return Ok(Vec::new());
        }

        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, ATTRIBUTE_KINDS) {
            let assignments: BTreeMap<String, i64> = definition
                .attribute_names()
                .into_iter()
                .filter_map(|name| {
                    let attribute = definition.attribute(name)?;
                    let id = registry.lookup(name, attribute)?;
                    let current = attribute.get(OBSERVABLE_KEY).and_then(Value::as_i64);
                    (current != Some(id)).then(|| (name.to_string(), id))
                })
                .collect();
            if !assignments.is_empty() {
                ops.push(Op::new(location, OpKind::AssignObservable { assignments }));
            }
        }
        Ok(ops)
    }
}

pub(crate) fn assign(definition: &mut Definition, assignments: &BTreeMap<String, i64>) -> Edit {
    let mut changes = Vec::new();
    for (name, id) in assignments {
        let Some(attribute) = definition.attribute_mut(name) else {
            continue;
        };
        if attribute.get(OBSERVABLE_KEY).and_then(Value::as_i64) != Some(*id) {
            attribute.insert(OBSERVABLE_KEY.to_string(), Value::from(*id));
            changes.push(format!("attributes.{}.{}", name, OBSERVABLE_KEY));
        }
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
        proto(vec![
            (
                "dictionary.json",
                json!({
                    "attributes": {
                        "hostname": {"type": "hostname_t", "observable": 1},
                        "src_ip": {"type": "ip_t"}
                    },
                    "types": {"attributes": {
                        "hostname_t": {"observable": 7},
                        "ip_t": {"observable": 2}
                    }}
                }),
            ),
            (
                "objects/device.json",
                json!({
                    "name": "device",
                    "attributes": {
                        "hostname": {"type": "hostname_t"},
                        "ip": {"type": "ip_t"},
                        "name": {"type": "string_t"}
                    }
                }),
            ),
        ])
    }

    #[test]
    fn test_name_match_wins_over_type() {
        let mut proto = repo();
        let options = CompilationOptions {
            set_observable: true,
            ..Default::default()
        };
        let ops = ObservablePlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        run(&mut proto, &ops, &options);

        let device = proto.resolve(&Location::object("device")).unwrap();
        assert_eq!(device.attribute("hostname").unwrap()["observable"], json!(1));
        assert_eq!(device.attribute("ip").unwrap()["observable"], json!(2));
        assert!(device.attribute("name").unwrap().get("observable").is_none());
    }

    #[test]
    fn test_disabled_by_default() {
        let proto = repo();
        assert!(ObservablePlanner
            .analyze(&proto, &CompilationOptions::default())
            .unwrap()
            .is_empty());
    }
}
