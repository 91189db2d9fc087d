//! Extension metadata parsing for `extension.yml` entries.
//!
//! # Example YAML
//!
//! ```yaml
//! main: acme.audit.AuditExtension
//! name: Audit Log
//! version: 1.4.0
//! depends: [storage, Metrics]
//!
//! # everything else is extension-specific configuration
//! retention_days: 30
//! sinks:
//!   - file
//!   - syslog
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::value::{ConfigValue, yaml_scalar};

/// Key under which extension names are compared.
///
/// Names are case-insensitive with full Unicode case folding, so `Ärger`
/// and `ärger` name the same extension.
pub fn name_key(name: &str) -> String {
    name.to_lowercase()
}

/// Whether two extension names refer to the same extension.
pub fn same_name(a: &str, b: &str) -> bool {
    a == b || name_key(a) == name_key(b)
}

/// Metadata read from a package's metadata entry.
///
/// `main`, `name` and `version` are required; a document missing any of them
/// is rejected with [`Error::MissingField`]. The full document, required keys
/// included, is kept in [`values`](Self::values).
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionMetadata {
    /// Dotted name of the entry symbol.
    pub main: String,
    /// Unique extension name.
    pub name: String,
    /// Version string, kept verbatim.
    pub version: String,
    /// Declared dependencies, in declaration order.
    pub depends: Vec<String>,
    /// Every top-level key of the document.
    pub values: BTreeMap<String, ConfigValue>,
}

impl ExtensionMetadata {
    /// Parse a metadata document. `source` is only used for error reporting.
    pub fn from_yaml(source: &Path, content: &str) -> Result<Self> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(content).map_err(|e| Error::MalformedMetadata {
                path: source.to_path_buf(),
                message: e.to_string(),
            })?;

        let serde_yaml::Value::Mapping(mapping) = document else {
            return Err(Error::MalformedMetadata {
                path: source.to_path_buf(),
                message: "metadata document must be a mapping".to_string(),
            });
        };

        let required = |field: &str| -> Result<String> {
            mapping
                .get(field)
                .and_then(yaml_scalar)
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty())
                .ok_or_else(|| Error::MissingField {
                    path: source.to_path_buf(),
                    field: field.to_string(),
                })
        };

        let main = required("main")?;
        let name = required("name")?;
        let version = required("version")?;

        let depends = match mapping.get("depends") {
            None | Some(serde_yaml::Value::Null) => Vec::new(),
            Some(serde_yaml::Value::Sequence(items)) => items
                .iter()
                .filter_map(yaml_scalar)
                .map(|dep| dep.trim().to_string())
                .filter(|dep| !dep.is_empty())
                .collect(),
            Some(other) => match yaml_scalar(other) {
                Some(single) => vec![single.trim().to_string()],
                None => {
                    return Err(Error::MalformedMetadata {
                        path: source.to_path_buf(),
                        message: "'depends' must be a list of names".to_string(),
                    });
                }
            },
        };

        let values = match ConfigValue::from_yaml(serde_yaml::Value::Mapping(mapping)) {
            Some(ConfigValue::Map(map)) => map,
            _ => BTreeMap::new(),
        };

        Ok(Self {
            main,
            name,
            version,
            depends,
            values,
        })
    }

    /// Read and parse the metadata entry of an open archive.
    pub fn from_archive(archive: &mut dyn Archive, entry: &str) -> Result<Self> {
        let path = archive.path().to_path_buf();
        let bytes = archive
            .read_entry(entry)?
            .ok_or_else(|| Error::MissingMetadata {
                path: path.clone(),
                entry: entry.to_string(),
            })?;
        let content = String::from_utf8(bytes).map_err(|e| Error::MalformedMetadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_yaml(&path, &content)
    }

    /// Whether `depends` names `other`, compared case-insensitively.
    pub fn declares_dependency(&self, other: &str) -> bool {
        self.depends.iter().any(|dep| same_name(dep, other))
    }

    /// Look up a raw value by key.
    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }
}
