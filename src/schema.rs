//! Compiled schema model

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::config::OutputFormat;
use crate::error::Result;
use crate::protoschema::ProtoSchema;
use crate::repository::{Definition, LocationKind, Section};

/// Attributes and types of the compiled dictionary
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dictionary {
    pub attributes: BTreeMap<String, Definition>,
    pub types: BTreeMap<String, Definition>,
}

/// A fully compiled OCSF schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub version: String,
    pub classes: BTreeMap<String, Definition>,
    pub objects: BTreeMap<String, Definition>,
    pub categories: BTreeMap<String, Definition>,
    pub profiles: BTreeMap<String, Definition>,
    pub extensions: BTreeMap<String, Definition>,
    pub dictionary: Dictionary,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_event: Option<Definition>,
}

impl Schema {
    /// Collect every rendered entry of a compiled working state
    pub fn render(proto: &ProtoSchema) -> Result<Self> {
        let mut schema = Schema {
            version: "0.0.0".to_string(),
            ..Schema::default()
        };

        for location in proto.locations() {
            let LocationKind::Schema(section) = location.kind else {
                continue;
            };
            let definition = (*proto.resolve(location)?).clone();
            let key = location.name.clone();
            match section {
                Section::Version => {
                    if let Some(version) = definition.get_str("version") {
                        schema.version = version.to_string();
                    }
                }
                Section::BaseEvent => schema.base_event = Some(definition),
                Section::Classes => {
                    schema.classes.insert(key, definition);
                }
                Section::Objects => {
                    schema.objects.insert(key, definition);
                }
                Section::Categories => {
                    schema.categories.insert(key, definition);
                }
                Section::Profiles => {
                    schema.profiles.insert(key, definition);
                }
                Section::Extensions => {
                    schema.extensions.insert(key, definition);
                }
                Section::Attributes => {
                    schema.dictionary.attributes.insert(key, definition);
                }
                Section::Types => {
                    schema.dictionary.types.insert(key, definition);
                }
            }
        }
        Ok(schema)
    }

    pub fn to_json(&self, format: OutputFormat) -> Result<String> {
        Ok(match format {
            OutputFormat::Pretty => serde_json::to_string_pretty(self)?,
            OutputFormat::Compact => serde_json::to_string(self)?,
        })
    }

    /// Conventional cache file name for this schema version
    pub fn cache_file_name(&self) -> String {
        format!("schema-{}.json", self.version)
    }

    /// SHA-256 of the compact JSON rendering
    pub fn checksum(&self) -> Result<Checksum> {
        Ok(Checksum::from_json(&serde_json::to_value(self)?))
    }
}
