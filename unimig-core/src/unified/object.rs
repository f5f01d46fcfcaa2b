use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::UnifiedResult;

pub const ANNOTATION_FOLDER: &str = "grafana.app/folder";
pub const ANNOTATION_CREATED_BY: &str = "grafana.app/createdBy";
pub const ANNOTATION_UPDATED_BY: &str = "grafana.app/updatedBy";
pub const ANNOTATION_UPDATED_TIMESTAMP: &str = "grafana.app/updatedTimestamp";
pub const ANNOTATION_INTERNAL_ID: &str = "grafana.app/deprecatedInternalID";
pub const ANNOTATION_MESSAGE: &str = "grafana.app/message";

/// Dashboards below this schema version are served under `v0alpha1`
pub const DASHBOARD_V1_MIN_SCHEMA: i64 = 36;

/// API version tag attached to an object at the store boundary. The object
/// body is the same whatever the tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ApiVersion {
    V0Alpha1,
    V1Beta1,
    V1,
}

impl ApiVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiVersion::V0Alpha1 => "v0alpha1",
            ApiVersion::V1Beta1 => "v1beta1",
            ApiVersion::V1 => "v1",
        }
    }

    /// Tag for a dashboard body given its `schemaVersion` field; bodies
    /// without one are treated as the oldest schema.
    pub fn for_dashboard(body: &Value) -> Self {
        match body.get("schemaVersion").and_then(Value::as_i64) {
            Some(version) if version >= DASHBOARD_V1_MIN_SCHEMA => ApiVersion::V1Beta1,
            _ => ApiVersion::V0Alpha1,
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_version: String,
    #[serde(default)]
    pub generation: i64,
    pub creation_timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceObject {
    pub api_version: String,
    pub kind: String,
    pub metadata: ObjectMeta,
    pub spec: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

impl ResourceObject {
    pub fn new(group: &str, version: ApiVersion, kind: &str, namespace: &str, name: &str) -> Self {
        Self {
            api_version: format!("{}/{}", group, version),
            kind: kind.to_string(),
            metadata: ObjectMeta {
                name: name.to_string(),
                namespace: namespace.to_string(),
                ..Default::default()
            },
            spec: Value::Object(Default::default()),
            status: None,
        }
    }

    pub fn with_spec(mut self, spec: Value) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_resource_version(mut self, resource_version: i64) -> Self {
        self.metadata.resource_version = resource_version.to_string();
        self
    }

    pub fn with_generation(mut self, generation: i64) -> Self {
        self.metadata.generation = generation;
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.metadata.creation_timestamp = Some(created);
        self
    }

    pub fn annotate(mut self, key: &str, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.metadata.annotations.insert(key.to_string(), value);
        }
        self
    }

    pub fn label(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.to_string(), value.into());
        self
    }

    pub fn with_folder(self, folder_uid: Option<&str>) -> Self {
        match folder_uid {
            Some(uid) => self.annotate(ANNOTATION_FOLDER, uid),
            None => self,
        }
    }

    pub fn folder(&self) -> Option<&str> {
        self.metadata
            .annotations
            .get(ANNOTATION_FOLDER)
            .map(String::as_str)
    }

    pub fn to_bytes(&self) -> UnifiedResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}
