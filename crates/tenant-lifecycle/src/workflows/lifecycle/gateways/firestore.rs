//! Minimal codec for Firestore REST documents.
//!
//! Only the typed values the lifecycle pipeline reads or writes are interpreted; every other
//! field is carried through untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

impl Document {
    /// Last path segment of the resource name, i.e. the document id.
    pub fn id(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or_default()
    }

    /// True when `field` is present and explicitly stored as `nullValue`.
    pub fn is_null(&self, field: &str) -> bool {
        self.fields
            .get(field)
            .is_some_and(|value| value.get("nullValue").is_some())
    }

    /// Raw payload of `field` under `kind`; a `nullValue` field reads as absent.
    fn typed(&self, field: &str, kind: &str) -> Option<&Value> {
        if self.is_null(field) {
            return None;
        }
        self.fields.get(field).and_then(|value| value.get(kind))
    }

    pub fn string(&self, field: &str) -> Option<String> {
        self.typed(field, "stringValue")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn timestamp(&self, field: &str) -> Option<DateTime<Utc>> {
        self.typed(field, "timestampValue")
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDocumentsResponse {
    #[serde(default)]
    pub documents: Vec<Document>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

pub fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

pub fn timestamp_value(value: DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339_opts(SecondsFormat::Micros, true) })
}

/// `{base}/projects/{project}/databases/(default)/documents`
pub fn documents_root(api_base: &str, project_id: &str) -> String {
    format!(
        "{}/projects/{}/databases/(default)/documents",
        api_base.trim_end_matches('/'),
        project_id
    )
}
