//! Category assignment from the event directory layout

use std::path::{Component, Path};

use super::core_definitions;
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::location::extensionless;
use crate::repository::{Definition, LocationKind};

pub struct CategoryPlanner;

impl Planner for CategoryPlanner {
    fn name(&self) -> &'static str {
        "category"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, &[LocationKind::Class]) {
            if definition.category().is_some() {
                continue;
            }
            let Some(category) = proto.source_path(&location).and_then(category_directory) else {
                continue;
            };
            ops.push(Op::new(location, OpKind::SetCategory { category }));
        }
        Ok(ops)
    }
}

/// `<category>` of an `events/<category>/...` path, inside or outside an extension
fn category_directory(path: &Path) -> Option<String> {
    let path = extensionless(path).unwrap_or_else(|| path.to_path_buf());
    let mut components = path.components();
    match (components.next(), components.next(), components.next()) {
        (Some(Component::Normal(events)), Some(Component::Normal(category)), Some(_)) if events == "events" => {
            Some(category.to_string_lossy().into_owned())
        }
        _ => None,
    }
}

/// Set the category, provided one by that name exists
pub(crate) fn set(definition: &mut Definition, category: &str, proto: &ProtoSchema) -> Edit {
    if definition.category().is_some() {
        return Ok(Vec::new());
    }
    if proto.find_by_name(&[LocationKind::Category], category, None).is_none() {
        return Err(format!("unknown category {:?}", category));
    }
    definition.set("category", category);
    Ok(vec!["category".to_string()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::op::execute;
    use crate::compile::planners::testing::{proto, run};
    use crate::repository::Location;
    use serde_json::json;

    #[test]
    fn test_category_from_directory() {
        let mut proto = proto(vec![
            (
                "categories.json",
                json!({"attributes": {"network": {"uid": 4, "caption": "Network Activity"}}}),
            ),
            ("events/network/http_activity.json", json!({"name": "http_activity"})),
            (
                "events/network/dns_activity.json",
                json!({"name": "dns_activity", "category": "network"}),
            ),
        ]);
        let options = CompilationOptions::default();
        let ops = CategoryPlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        run(&mut proto, &ops, &options);
        let http = proto.resolve(&Location::class("http_activity")).unwrap();
        assert_eq!(http.category(), Some("network"));
    }

    #[test]
    fn test_unknown_category_fails() {
        let mut proto = proto(vec![("events/mystery/thing.json", json!({"name": "thing"}))]);
        let options = CompilationOptions::default();
        let ops = CategoryPlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        assert!(execute(&ops[0], &mut proto, &options).is_failed());
    }

    #[test]
    fn test_category_directory() {
        assert_eq!(
            category_directory(Path::new("extensions/win/events/system/registry.json")),
            Some("system".to_string())
        );
        assert_eq!(category_directory(Path::new("events/base_event.json")), None);
    }
}
