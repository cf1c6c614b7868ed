//! `$include` resolution
//!
//! A root-level `$include` fills the whole definition from the referenced
//! file; one inside `attributes` fills only the attributes map. Either way
//! the subject's own values win.

use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{core_definitions, ATTRIBUTE_KINDS};
use crate::compile::op::{Edit, IncludeScope, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::merge::{merge, MergeOptions};
use crate::protoschema::ProtoSchema;
use crate::repository::definition::{profile_ref_name, ATTRIBUTES_KEY, INCLUDE_KEY};
use crate::repository::location::extensionless;
use crate::repository::{Definition, Location, LocationKind};

pub struct IncludePlanner;

impl Planner for IncludePlanner {
    fn name(&self) -> &'static str {
        "include"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, ATTRIBUTE_KINDS) {
            let mut found = Vec::new();
            for (references, scope) in [
                (definition.includes(), IncludeScope::Definition),
                (definition.attribute_includes(), IncludeScope::Attributes),
            ] {
                for reference in references {
                    match find_dependency(proto, &location, reference) {
                        Some(source) => found.push((source, scope)),
                        None => warn!("{}: include {:?} not found, skipping", location, reference),
                    }
                }
            }

            // Fill keeps the first value written, so the highest ranked
            // profile goes first.
            found.sort_by_key(|(source, _)| match source.kind {
                LocationKind::Profile => (true, Reverse(options.profile_rank(profile_ref_name(&source.name)))),
                _ => (false, Reverse(0)),
            });

            for (source, scope) in found {
                ops.push(Op::new(location.clone(), OpKind::Include { source, scope }));
            }
        }
        Ok(ops)
    }
}

/// Locate an include target relative to the including file
///
/// The reference is tried against the file's directory and each of its
/// ancestors, with and without a `.json` suffix, and for extension files
/// also against the same path outside the extension.
fn find_dependency(proto: &ProtoSchema, subject: &Location, reference: &str) -> Option<Location> {
    let repository = proto.repository();
    let source = proto.source_path(subject)?;

    let mut files = vec![PathBuf::from(reference)];
    if Path::new(reference).extension().map_or(true, |e| e != "json") {
        files.push(PathBuf::from(format!("{}.json", reference)));
    }

    let mut bases: Vec<PathBuf> = Vec::new();
    if let Some(parent) = source.parent() {
        bases.push(parent.to_path_buf());
    }
    if let Some(parent) = extensionless(source).as_deref().and_then(Path::parent) {
        bases.push(parent.to_path_buf());
    }

    for base in &bases {
        for dir in base.ancestors() {
            for file in &files {
                if let Some(location) = repository.location_for_path(&dir.join(file)) {
                    return Some(location.clone());
                }
            }
        }
    }
    None
}

/// Fill the subject from an included definition
pub(crate) fn include(definition: &mut Definition, source: &Definition, scope: IncludeScope) -> Edit {
    let options = match scope {
        IncludeScope::Definition => MergeOptions::fill().ignoring(&[INCLUDE_KEY]),
        IncludeScope::Attributes => MergeOptions::fill().only(&[ATTRIBUTES_KEY]),
    };
    Ok(merge(definition.as_map_mut(), source.as_map(), options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use serde_json::json;

    #[test]
    fn test_attribute_include_fills_without_overriding() {
        let mut proto = proto(vec![
            (
                "events/network/http_activity.json",
                json!({
                    "name": "http_activity",
                    "caption": "HTTP Activity",
                    "attributes": {
                        "$include": ["profiles/cloud.json"],
                        "api": {"requirement": "required"}
                    }
                }),
            ),
            (
                "profiles/cloud.json",
                json!({
                    "name": "cloud",
                    "caption": "Cloud",
                    "attributes": {
                        "api": {"requirement": "optional", "profile": "cloud"},
                        "cloud": {"requirement": "required", "profile": "cloud"}
                    }
                }),
            ),
        ]);
        let options = CompilationOptions::default();
        let ops = IncludePlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].to_string(), "include class:http_activity <- profile:cloud");

        run(&mut proto, &ops, &options);
        let class = proto.resolve(&Location::class("http_activity")).unwrap();
        assert_eq!(class.caption(), Some("HTTP Activity"));
        assert_eq!(class.attribute("api").unwrap()["requirement"], json!("required"));
        assert_eq!(class.attribute("cloud").unwrap()["requirement"], json!("required"));
    }

    #[test]
    fn test_include_unions_lists() {
        let source = Definition::from_value(json!({"profiles": ["cloud", "host"], "attributes": {}})).unwrap();
        let mut subject = Definition::from_value(json!({"name": "http_activity", "profiles": ["host"]})).unwrap();

        let changes = include(&mut subject, &source, IncludeScope::Definition).unwrap();
        assert_eq!(changes, vec!["profiles", "attributes"]);
        assert_eq!(subject.get("profiles"), Some(&json!(["host", "cloud"])));

        let mut subject = Definition::from_value(json!({"name": "http_activity", "profiles": ["host"]})).unwrap();
        include(&mut subject, &source, IncludeScope::Attributes).unwrap();
        assert_eq!(subject.get("profiles"), Some(&json!(["host"])));
    }

    #[test]
    fn test_root_include_resolves_relative_without_suffix() {
        let mut proto = proto(vec![
            (
                "objects/file.json",
                json!({"name": "file", "$include": "includes/common", "attributes": {}}),
            ),
            (
                "includes/common.json",
                json!({"description": "Shared description", "attributes": {"uid": {}}}),
            ),
        ]);
        let options = CompilationOptions::default();
        let ops = IncludePlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        run(&mut proto, &ops, &options);

        let file = proto.resolve(&Location::object("file")).unwrap();
        assert_eq!(file.description(), Some("Shared description"));
        assert_eq!(file.attribute_names(), vec!["uid"]);
    }

    #[test]
    fn test_missing_include_is_skipped() {
        let proto = proto(vec![(
            "objects/file.json",
            json!({"name": "file", "$include": "includes/missing.json"}),
        )]);
        assert!(IncludePlanner
            .analyze(&proto, &CompilationOptions::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_profile_order_decides_precedence() {
        let files = vec![
            (
                "objects/device.json",
                json!({"name": "device", "attributes": {"$include": ["profiles/host.json", "profiles/cloud.json"]}}),
            ),
            (
                "profiles/host.json",
                json!({"name": "host", "attributes": {"region": {"caption": "Host Region"}}}),
            ),
            (
                "profiles/cloud.json",
                json!({"name": "cloud", "attributes": {"region": {"caption": "Cloud Region"}}}),
            ),
        ];
        let mut proto = proto(files);
        let options = CompilationOptions {
            profile_order: vec!["cloud".to_string(), "host".to_string()],
            ..Default::default()
        };
        let ops = IncludePlanner.analyze(&proto, &options).unwrap();
        run(&mut proto, &ops, &options);

        let device = proto.resolve(&Location::object("device")).unwrap();
        assert_eq!(device.attribute("region").unwrap()["caption"], json!("Host Region"));
    }
}
