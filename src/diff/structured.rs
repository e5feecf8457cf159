use std::collections::BTreeMap;

use config::FileFormat;
use config::Format;
use config::Value;
use config::ValueKind;

use super::compute_changes;
use super::ChangeSet;
use super::ConfigDiffer;
use crate::constants::CONTENT_TYPE_JSON;
use crate::constants::CONTENT_TYPE_TOML;
use crate::constants::CONTENT_TYPE_YAML;
use crate::constants::CONTENT_TYPE_YML;
use crate::DiffError;
use crate::Result;

/// Differ for nested documents (YAML, JSON, TOML). Nested tables are flattened
/// into dotted keys and sequences into `key[i]`, so a change deep inside a
/// document is reported against its full path.
#[derive(Debug, Clone)]
pub struct StructuredDiffer {
    format: FileFormat,
    content_types: &'static [&'static str],
}

impl StructuredDiffer {
    pub fn yaml() -> Self {
        Self {
            format: FileFormat::Yaml,
            content_types: &[CONTENT_TYPE_YAML, CONTENT_TYPE_YML],
        }
    }

    pub fn json() -> Self {
        Self {
            format: FileFormat::Json,
            content_types: &[CONTENT_TYPE_JSON],
        }
    }

    pub fn toml() -> Self {
        Self {
            format: FileFormat::Toml,
            content_types: &[CONTENT_TYPE_TOML],
        }
    }

    fn flatten_document(
        &self,
        content: Option<&str>,
        content_type: &str,
    ) -> Result<BTreeMap<String, String>> {
        let mut flat = BTreeMap::new();
        let text = match content {
            Some(t) if !t.trim().is_empty() => t,
            _ => return Ok(flat),
        };

        let table = self.format.parse(None, text).map_err(|e| DiffError::Malformed {
            content_type: content_type.to_string(),
            reason: e.to_string(),
        })?;

        for (key, value) in table {
            flatten_value(&key, value, &mut flat);
        }
        Ok(flat)
    }
}

impl ConfigDiffer for StructuredDiffer {
    fn is_responsible_for(
        &self,
        content_type: &str,
    ) -> bool {
        self.content_types.iter().any(|t| t.eq_ignore_ascii_case(content_type))
    }

    fn parse(
        &self,
        old_content: Option<&str>,
        new_content: Option<&str>,
        content_type: &str,
    ) -> Result<ChangeSet> {
        let old = self.flatten_document(old_content, content_type)?;
        let new = self.flatten_document(new_content, content_type)?;
        Ok(compute_changes(&old, &new))
    }
}

fn flatten_value(
    path: &str,
    value: Value,
    out: &mut BTreeMap<String, String>,
) {
    match value.kind {
        ValueKind::Table(table) => {
            for (key, child) in table {
                flatten_value(&format!("{path}.{key}"), child, out);
            }
        }
        ValueKind::Array(items) => {
            for (idx, child) in items.into_iter().enumerate() {
                flatten_value(&format!("{path}[{idx}]"), child, out);
            }
        }
        ValueKind::Nil => {
            out.insert(path.to_string(), String::new());
        }
        kind => {
            let scalar = Value::new(None, kind).into_string().unwrap_or_default();
            out.insert(path.to_string(), scalar);
        }
    }
}
