//! Extension application
//!
//! Each enabled extension contributes its definitions to core. A definition
//! whose core counterpart already exists is a patch and merges over it with
//! the extension winning. Anything else is copied into core, namespaced as
//! `<extension>/<name>` when prefixing is on.

use std::collections::BTreeMap;

use tracing::debug;

use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::merge::{merge as merge_maps, MergeOptions};
use crate::protoschema::ProtoSchema;
use crate::repository::definition::{KEY_KEY, SRC_EXTENSION_KEY};
use crate::repository::{Definition, Location, LocationKind};

const EXTENSION_KINDS: &[LocationKind] = &[
    LocationKind::Object,
    LocationKind::Class,
    LocationKind::Event,
    LocationKind::Profile,
    LocationKind::Category,
    LocationKind::Dictionary,
    LocationKind::Type,
];

pub struct ExtensionPlanner;

impl Planner for ExtensionPlanner {
    fn name(&self) -> &'static str {
        "extension"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        let declared = declared_names(proto);
        let mut ops = Vec::new();

        for location in proto.locations() {
            let Some(directory) = location.extension.as_deref() else {
                continue;
            };
            if !EXTENSION_KINDS.contains(&location.kind) {
                continue;
            }
            let Some(extension) = declared.get(directory) else {
                debug!("{} has no extension.json, skipping", location);
                continue;
            };
            if !options.is_extension_enabled(directory, Some(extension)) {
                continue;
            }

            let core = location.core();
            if proto.contains(&core) {
                ops.push(Op::new(
                    core,
                    OpKind::ExtensionMerge {
                        source: location.clone(),
                    },
                ));
                continue;
            }

            let key = (options.prefix_extensions && location.kind.is_prefixable())
                .then(|| format!("{}/{}", extension, location.name));
            let target = match &key {
                Some(key) => Location::new(location.kind, key.clone()),
                None => core,
            };
            ops.push(Op::new(
                target,
                OpKind::ExtensionCopy {
                    source: location.clone(),
                    src_extension: extension.clone(),
                    key,
                },
            ));
        }
        Ok(ops)
    }
}

/// Extension directory -> declared extension name
pub(crate) fn declared_names(proto: &ProtoSchema) -> BTreeMap<String, String> {
    proto
        .locations()
        .filter(|l| l.kind == LocationKind::Extension)
        .filter_map(|l| {
            let definition = proto.get(l)?;
            let name = definition.name().unwrap_or(l.name.as_str());
            Some((l.name.clone(), name.to_string()))
        })
        .collect()
}

/// Patch a core definition; the extension wins on conflicts
pub(crate) fn merge(definition: &mut Definition, source: &Definition) -> Edit {
    let own_name = definition.name().map(str::to_string);
    let patch_marker = source.extends().is_some() && source.extends() == own_name.as_deref();
    let ignored: &[&str] = if patch_marker { &["extends"] } else { &[] };

    Ok(merge_maps(
        definition.as_map_mut(),
        source.as_map(),
        MergeOptions::overwrite().ignoring(ignored),
    ))
}

/// Replace the target with a copy of the extension's definition
pub(crate) fn copy(definition: &mut Definition, source: &Definition, src_extension: &str, key: Option<&str>) -> Edit {
    let mut copied = source.clone();
    copied.set(SRC_EXTENSION_KEY, src_extension);
    if let Some(key) = key {
        copied.set(KEY_KEY, key);
    }

    let changes = copied
        .as_map()
        .iter()
        .filter(|(k, v)| definition.as_map().get(k.as_str()) != Some(v))
        .map(|(k, _)| k.clone())
        .collect();
    *definition = copied;
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use serde_json::json;

    fn repo() -> ProtoSchema {
        proto(vec![
            (
                "objects/file.json",
                json!({"name": "file", "caption": "File", "attributes": {"name": {}}}),
            ),
            (
                "extensions/windows/extension.json",
                json!({"name": "win", "uid": 2, "caption": "Windows"}),
            ),
            (
                "extensions/windows/objects/file.json",
                json!({"extends": "file", "caption": "Windows File", "attributes": {"alternate_data_streams": {}}}),
            ),
            (
                "extensions/windows/objects/reg_key.json",
                json!({"name": "reg_key", "caption": "Registry Key", "extends": "object"}),
            ),
            (
                "extensions/windows/dictionary.json",
                json!({"attributes": {"reg_key": {"type": "reg_key"}}}),
            ),
        ])
    }

    #[test]
    fn test_patch_merges_and_new_definitions_copy() {
        let mut proto = repo();
        let options = CompilationOptions::default();
        let ops = ExtensionPlanner.analyze(&proto, &options).unwrap();
        let summary: Vec<_> = ops.iter().map(ToString::to_string).collect();
        assert_eq!(
            summary,
            vec![
                "extension_merge object:file <- object:file (windows)",
                "extension_copy object:win/reg_key <- object:reg_key (windows)",
                "extension_copy dictionary:reg_key <- dictionary:reg_key (windows)",
            ]
        );

        run(&mut proto, &ops, &options);
        let file = proto.resolve(&Location::object("file")).unwrap();
        assert_eq!(file.caption(), Some("Windows File"));
        assert_eq!(file.extends(), None);
        assert_eq!(file.attribute_names(), vec!["name", "alternate_data_streams"]);

        let reg_key = proto.resolve(&Location::object("win/reg_key")).unwrap();
        assert_eq!(reg_key.name(), Some("reg_key"));
        assert_eq!(reg_key.key(), Some("win/reg_key"));
        assert_eq!(reg_key.src_extension(), Some("win"));
        assert_eq!(
            proto.source_path(&Location::object("win/reg_key")),
            Some(std::path::Path::new("extensions/windows/objects/reg_key.json"))
        );
    }

    #[test]
    fn test_unprefixed_copy_keeps_plain_name() {
        let proto = repo();
        let options = CompilationOptions {
            prefix_extensions: false,
            ..Default::default()
        };
        let ops = ExtensionPlanner.analyze(&proto, &options).unwrap();
        assert!(ops.iter().any(|op| op.target == Location::object("reg_key")
            && matches!(&op.kind, OpKind::ExtensionCopy { key: None, .. })));
    }

    #[test]
    fn test_disabled_extension_is_skipped() {
        let proto = repo();
        for options in [
            CompilationOptions {
                ignored_extensions: ["win".to_string()].into(),
                ..Default::default()
            },
            CompilationOptions {
                enabled_extensions: Some(["linux".to_string()].into()),
                ..Default::default()
            },
        ] {
            assert!(ExtensionPlanner.analyze(&proto, &options).unwrap().is_empty());
        }
    }
}
