//! Annotation expansion
//!
//! Include fragments and profiles may carry an `annotations` object whose
//! fields apply to every attribute they define (for example a `group`).

use serde_json::Value;

use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::merge::{merge, MergeOptions};
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, LocationKind};

const ANNOTATIONS_KEY: &str = "annotations";

pub struct AnnotationPlanner;

impl Planner for AnnotationPlanner {
    fn name(&self) -> &'static str {
        "annotation"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let ops = proto
            .locations()
            .filter(|l| matches!(l.kind, LocationKind::File | LocationKind::Profile))
            .filter(|l| {
                proto.get(l).is_some_and(|d| {
                    d.get(ANNOTATIONS_KEY).is_some_and(Value::is_object) && !d.attribute_names().is_empty()
                })
            })
            .map(|l| Op::new(l.clone(), OpKind::Annotate))
            .collect();
        Ok(ops)
    }
}

/// Write the definition's annotations onto each of its attributes
pub(crate) fn annotate(definition: &mut Definition) -> Edit {
    let Some(annotations) = definition.get(ANNOTATIONS_KEY).and_then(Value::as_object).cloned() else {
        return Ok(Vec::new());
    };

    let mut changes = Vec::new();
    if let Some(attributes) = definition.attributes_mut() {
        for (name, attribute) in attributes.iter_mut() {
            if name.starts_with('$') {
                continue;
            }
            let Value::Object(attribute) = attribute else {
                continue;
            };
            for change in merge(attribute, &annotations, MergeOptions::overwrite()) {
                changes.push(format!("attributes.{}.{}", name, change));
            }
        }
    }
    Ok(changes)
}
