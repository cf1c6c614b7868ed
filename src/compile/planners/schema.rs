//! Copy compiled definitions into the rendered schema

use super::extension::declared_names;
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::definition::{INCLUDE_KEY, KEY_KEY};
use crate::repository::{Definition, Location, LocationKind, Section, VERSION_FILE};

const BASE_EVENT: &str = "base_event";

pub struct SchemaPlanner;

impl Planner for SchemaPlanner {
    fn name(&self) -> &'static str {
        "schema"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        let declared = declared_names(proto);
        let mut ops = Vec::new();
        let mut render = |section: Section, key: &str, source: &Location| {
            ops.push(Op::new(
                Location::schema(section, key),
                OpKind::CopyToSchema { source: source.clone() },
            ));
        };

        for location in proto.locations() {
            if !location.is_core() {
                continue;
            }
            let Some(definition) = proto.get(location) else {
                continue;
            };
            let key = definition.key().unwrap_or(location.name.as_str());

            match location.kind {
                LocationKind::Object if !key.starts_with('_') => render(Section::Objects, key, location),
                LocationKind::Class if definition.uid().is_some() => render(Section::Classes, key, location),
                LocationKind::Event if location.name == BASE_EVENT => {
                    render(Section::BaseEvent, BASE_EVENT, location);
                    render(Section::Classes, BASE_EVENT, location);
                }
                LocationKind::Category => render(Section::Categories, &location.name, location),
                LocationKind::Profile => render(Section::Profiles, key, location),
                LocationKind::Extension => {
                    let name = declared.get(&location.name).map(String::as_str).unwrap_or(key);
                    if options.is_extension_enabled(&location.name, Some(name)) {
                        render(Section::Extensions, name, location);
                    }
                }
                LocationKind::Dictionary => render(Section::Attributes, &location.name, location),
                LocationKind::Type => render(Section::Types, &location.name, location),
                LocationKind::File if location.name == VERSION_FILE => render(Section::Version, "version", location),
                _ => {}
            }
        }
        Ok(ops)
    }
}

/// Replace the target with the source, minus compiler directives
pub(crate) fn copy(definition: &mut Definition, source: &Definition) -> Edit {
    let mut rendered = source.clone();
    rendered.remove(INCLUDE_KEY);
    rendered.remove(KEY_KEY);
    if let Some(attributes) = rendered.attributes_mut() {
        attributes.shift_remove(INCLUDE_KEY);
    }

    let changes = rendered
        .as_map()
        .iter()
        .filter(|(k, v)| definition.as_map().get(k.as_str()) != Some(*v))
        .map(|(k, _)| k.clone())
        .chain(
            definition
                .as_map()
                .keys()
                .filter(|k| !rendered.as_map().contains_key(k.as_str()))
                .cloned(),
        )
        .collect::<Vec<_>>();
    *definition = rendered;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use serde_json::json;

    fn has_directives(definition: &Definition) -> bool {
        definition.contains(INCLUDE_KEY)
            || definition.contains(KEY_KEY)
            || definition.attributes().is_some_and(|a| a.contains_key(INCLUDE_KEY))
    }

    #[test]
    fn test_renderable_definitions() {
        let proto = proto(vec![
            ("version.json", json!({"version": "1.3.0"})),
            ("objects/_entity.json", json!({"name": "_entity"})),
            ("objects/file.json", json!({"name": "file"})),
            ("events/base_event.json", json!({"name": "base_event"})),
            ("events/network/network.json", json!({"name": "network"})),
            ("events/network/http_activity.json", json!({"name": "http_activity", "uid": 4002})),
            ("extensions/windows/extension.json", json!({"name": "win", "uid": 2})),
        ]);
        let ops = SchemaPlanner.analyze(&proto, &CompilationOptions::default()).unwrap();
        let targets: Vec<_> = ops.iter().map(|op| op.target.to_string()).collect();
        assert_eq!(
            targets,
            vec![
                "schema.version:version",
                "schema.objects:file",
                "schema.classes:http_activity",
                "schema.base_event:base_event",
                "schema.classes:base_event",
                "schema.extensions:win",
            ]
        );
    }

    #[test]
    fn test_copy_strips_directives() {
        let mut proto = proto(vec![(
            "objects/win/reg_key.json",
            json!({
                "name": "reg_key",
                "key": "win/reg_key",
                "$include": "includes/thing.json",
                "attributes": {"$include": ["profiles/host.json"], "path": {}}
            }),
        )]);
        let options = CompilationOptions::default();
        let ops = SchemaPlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops[0].target, Location::schema(Section::Objects, "win/reg_key"));
        run(&mut proto, &ops, &options);

        let rendered = proto.resolve(&ops[0].target).unwrap();
        assert!(!has_directives(&rendered));
        assert_eq!(rendered.name(), Some("reg_key"));
        assert_eq!(rendered.attribute_names(), vec!["path"]);
    }

    #[test]
    fn test_empty_entry_is_still_rendered() {
        let mut proto = proto(vec![("dictionary.json", json!({"attributes": {"raw_data": {}}}))]);
        let options = CompilationOptions::default();
        let ops = SchemaPlanner.analyze(&proto, &options).unwrap();
        run(&mut proto, &ops, &options);
        assert!(proto.contains(&Location::schema(Section::Attributes, "raw_data")));
        assert_eq!(
            proto.resolve(&Location::schema(Section::Attributes, "raw_data")).unwrap().as_map(),
            json!({}).as_object().unwrap()
        );
    }
}
