//! Profile tagging and removal
//!
//! Attributes defined by a profile are tagged with the profile's name before
//! anything includes them. Once includes have run, attributes whose every tag
//! names an inactive profile are removed.

use std::collections::BTreeSet;

use serde_json::Value;

use super::{core_definitions, RECORD_KINDS};
use crate::compile::op::{Edit, Op, OpKind};
use crate::compile::planner::Planner;
use crate::config::CompilationOptions;
use crate::error::Result;
use crate::merge::{merge, MergeOptions};
use crate::protoschema::ProtoSchema;
use crate::repository::definition::{profile_ref_name, profile_tags, PROFILE_KEY};
use crate::repository::{Definition, LocationKind};

pub struct ProfileTagPlanner;

impl Planner for ProfileTagPlanner {
    fn name(&self) -> &'static str {
        "profile_tag"
    }

    fn analyze(&self, proto: &ProtoSchema, _options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for location in proto.locations() {
            if location.kind != LocationKind::Profile {
                continue;
            }
            let Some(definition) = proto.get(location) else {
                continue;
            };
            let profile = definition.name().unwrap_or(location.name.as_str());
            let untagged = definition
                .attribute_names()
                .into_iter()
                .filter_map(|n| definition.attribute(n))
                .any(|a| !profile_tags(a).contains(&profile));
            if untagged {
                ops.push(Op::new(
                    location.clone(),
                    OpKind::TagProfile {
                        profile: profile.to_string(),
                    },
                ));
            }
        }
        Ok(ops)
    }
}

pub struct ProfileRemovePlanner;

impl Planner for ProfileRemovePlanner {
    fn name(&self) -> &'static str {
        "profile_remove"
    }

    fn analyze(&self, proto: &ProtoSchema, options: &CompilationOptions) -> Result<Vec<Op>> {
        let mut ops = Vec::new();
        for (location, definition) in core_definitions(proto, RECORD_KINDS) {
            let mut referenced: BTreeSet<&str> = definition
                .profiles()
                .into_iter()
                .map(profile_ref_name)
                .collect();
            for name in definition.attribute_names() {
                if let Some(attribute) = definition.attribute(name) {
                    referenced.extend(profile_tags(attribute));
                }
            }

            for profile in referenced {
                if !options.is_profile_enabled(profile) {
                    ops.push(Op::new(
                        location.clone(),
                        OpKind::ProfileRemove {
                            profile: profile.to_string(),
                        },
                    ));
                }
            }
        }
        Ok(ops)
    }
}

/// Tag every attribute with `profile`
pub(crate) fn tag(definition: &mut Definition, profile: &str) -> Edit {
    let tag = [(PROFILE_KEY.to_string(), Value::String(profile.to_string()))]
        .into_iter()
        .collect();
    let mut changes = Vec::new();
    if let Some(attributes) = definition.attributes_mut() {
        for (name, attribute) in attributes.iter_mut() {
            let Value::Object(attribute) = attribute else {
                continue;
            };
            for change in merge(attribute, &tag, MergeOptions::fill()) {
                changes.push(format!("attributes.{}.{}", name, change));
            }
        }
    }
    Ok(changes)
}

/// Drop attributes tagged with `profile` whose tags are all inactive
pub(crate) fn remove(definition: &mut Definition, profile: &str, options: &CompilationOptions) -> Edit {
    let Some(attributes) = definition.attributes_mut() else {
        return Ok(Vec::new());
    };

    let doomed: Vec<String> = attributes
        .iter()
        .filter_map(|(name, attribute)| {
            let tags = profile_tags(attribute.as_object()?);
            let remove = tags.contains(&profile) && tags.iter().all(|t| !options.is_profile_enabled(t));
            remove.then(|| name.clone())
        })
        .collect();

    let mut changes = Vec::with_capacity(doomed.len());
    for name in doomed {
        attributes.shift_remove(&name);
        changes.push(format!("attributes.{}", name));
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::planners::testing::{proto, run};
    use crate::repository::Location;
    use serde_json::json;

    fn options_without(profile: &str) -> CompilationOptions {
        CompilationOptions {
            ignored_profiles: [profile.to_string()].into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_tags_profile_attributes() {
        let mut proto = proto(vec![(
            "profiles/cloud.json",
            json!({"name": "cloud", "attributes": {"cloud": {}, "api": {"profile": "cloud"}}}),
        )]);
        let options = CompilationOptions::default();
        let ops = ProfileTagPlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        run(&mut proto, &ops, &options);

        let cloud = proto.resolve(&Location::profile("cloud")).unwrap();
        assert_eq!(cloud.attribute("cloud").unwrap()["profile"], json!("cloud"));
        assert_eq!(cloud.attribute("api").unwrap()["profile"], json!("cloud"));
        assert!(ProfileTagPlanner.analyze(&proto, &options).unwrap().is_empty());
    }

    #[test]
    fn test_removes_only_inactive_attributes() {
        let mut proto = proto(vec![(
            "events/network/http_activity.json",
            json!({
                "name": "http_activity",
                "profiles": ["cloud", "host"],
                "attributes": {
                    "cloud": {"profile": "cloud"},
                    "shared": {"profile": ["cloud", "host"]},
                    "device": {"profile": "host"},
                    "status_code": {}
                }
            }),
        )]);
        let options = options_without("cloud");
        let ops = ProfileRemovePlanner.analyze(&proto, &options).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(
            ops[0].kind,
            OpKind::ProfileRemove {
                profile: "cloud".to_string()
            }
        );

        run(&mut proto, &ops, &options);
        let class = proto.resolve(&Location::class("http_activity")).unwrap();
        assert_eq!(class.attribute_names(), vec!["shared", "device", "status_code"]);
    }

    #[test]
    fn test_removal_ignores_declaration_order() {
        let options = options_without("cloud");
        for tags in [json!(["cloud", "host"]), json!(["host", "cloud"])] {
            let mut definition = Definition::from_value(json!({"attributes": {"a": {"profile": tags}}})).unwrap();
            assert!(remove(&mut definition, "cloud", &options).unwrap().is_empty());
        }
    }

    #[test]
    fn test_nothing_planned_when_all_profiles_active() {
        let proto = proto(vec![(
            "objects/device.json",
            json!({"name": "device", "profiles": ["cloud"], "attributes": {"region": {"profile": "cloud"}}}),
        )]);
        let ops = ProfileRemovePlanner
            .analyze(&proto, &CompilationOptions::default())
            .unwrap();
        assert!(ops.is_empty());
    }
}
