//! Dictionary fill
//!
//! Attributes declared on records usually carry little more than a
//! requirement. Everything else (caption, type, enum members) comes from the
//! dictionary entry of the same name, without overriding local values.

use serde_json::Value;

use super::{core_definitions, ATTRIBUTE_KINDS};
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::merge::{merge, MergeOptions};
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, Location};

pub struct DictionaryPlanner;

impl Planner for DictionaryPlanner {
    fn name(&self) -> &'static str {
        "dictionary"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, ATTRIBUTE_KINDS) {
            for name in definition.attribute_names() {
                let source = Location::dictionary(name);
                let Some(entry) = proto.get(&source) else {
                    continue;
                };
                let Some(attribute) = definition.attribute(name) else {
                    continue;
                };
                let mut filled = attribute.clone();
                if merge(&mut filled, entry.as_map(), MergeOptions::fill()).is_empty() {
                    continue;
                }
                ops.push(Op::new(
                    location.clone(),
                    OpKind::DictionaryFill {
                        attribute: name.to_string(),
                        source,
                    },
                ));
            }
        }
        Ok(ops)
    }
}

/// Fill one attribute's gaps from its dictionary entry
pub(crate) fn fill(definition: &mut Definition, attribute: &str, entry: &Definition) -> Edit {
    let Some(target) = definition.attribute_mut(attribute) else {
        return Err(format!("no attribute {:?}", attribute));
    };
    let changes = merge(target, entry.as_map(), MergeOptions::fill());
    Ok(changes
        .into_iter()
        .map(|c| format!("attributes.{}.{}", attribute, c))
        .collect())
}

/// Declared `type` of an attribute
pub(crate) fn attribute_type<'a>(attribute: &'a serde_json::Map<String, Value>) -> Option<&'a str> {
    attribute.get("type").and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use serde_json::json;

    #[test]
    fn test_fills_each_attribute_from_dictionary() {
        let mut proto = proto(vec![
            (
                "dictionary.json",
                json!({
                    "attributes": {
                        "status_code": {"caption": "Status Code", "type": "string_t", "requirement": "optional"},
                        "time": {"caption": "Time", "type": "timestamp_t"}
                    },
                    "types": {"attributes": {"string_t": {"caption": "String"}}}
                }),
            ),
            (
                "events/network/http_activity.json",
                json!({
                    "name": "http_activity",
                    "attributes": {
                        "status_code": {"requirement": "recommended"},
                        "time": {"caption": "Time", "type": "timestamp_t"},
                        "undocumented": {}
                    }
                }),
            ),
        ]);
        let options = CompilationOptions::default();
        let ops = DictionaryPlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].to_string(),
            "dictionary_fill class:http_activity.status_code <- dictionary:status_code"
        );

        run(&mut proto, &ops, &options);
        let http = proto.resolve(&Location::class("http_activity")).unwrap();
        let status = http.attribute("status_code").unwrap();
        assert_eq!(status["requirement"], json!("recommended"));
        assert_eq!(status["caption"], json!("Status Code"));
        assert_eq!(attribute_type(status), Some("string_t"));
    }
}
