//! Narrow interface to the unified resource store.
//!
//! The migration engine only ever opens one bulk stream per run, sends write
//! events through it and closes it to read back a summary. Counts for
//! validation come from a separate stats query. [`memory::MemoryResourceStore`]
//! implements both for rehearsals and tests.

pub mod memory;
pub mod object;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::UnifiedResult;
use crate::registry::GroupResource;

pub use memory::{MemoryResourceStore, StoredResource};
pub use object::{ApiVersion, ObjectMeta, ResourceObject};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceKey {
    pub namespace: String,
    pub group: String,
    pub resource: String,
    pub name: String,
}

impl ResourceKey {
    pub fn new(namespace: &str, group_resource: &GroupResource, name: &str) -> Self {
        Self {
            namespace: namespace.to_string(),
            group: group_resource.group().to_string(),
            resource: group_resource.resource().to_string(),
            name: name.to_string(),
        }
    }

    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WriteAction {
    Added,
    Modified,
    Deleted,
}

/// One write event on a bulk stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRequest {
    pub key: ResourceKey,
    pub action: WriteAction,
    /// Encoded resource object, empty for deletes
    pub value: Vec<u8>,
    pub folder: String,
}

impl BulkRequest {
    pub fn write(key: ResourceKey, action: WriteAction, object: &ResourceObject) -> UnifiedResult<Self> {
        Ok(Self {
            folder: object.folder().unwrap_or_default().to_string(),
            value: object.to_bytes()?,
            key,
            action,
        })
    }

    pub fn delete(key: ResourceKey, folder: Option<&str>) -> Self {
        Self {
            key,
            action: WriteAction::Deleted,
            value: Vec::new(),
            folder: folder.unwrap_or_default().to_string(),
        }
    }
}

/// Directives sent when a bulk stream opens
#[derive(Clone, Debug, Default)]
pub struct BulkSettings {
    pub namespace: String,
    /// Collections whose content the store may replace wholesale
    pub rebuild_collections: Vec<GroupResource>,
    pub skip_validation: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    pub namespace: String,
    pub group: String,
    pub resource: String,
    pub count: i64,
    pub history: bool,
}

impl BulkSummary {
    pub fn group_resource(&self) -> GroupResource {
        GroupResource::new(self.group.clone(), self.resource.clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedItem {
    pub key: ResourceKey,
    pub action: WriteAction,
    pub error: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkResponse {
    pub processed: i64,
    pub summary: Vec<BulkSummary>,
    pub rejected: Vec<RejectedItem>,
}

impl BulkResponse {
    /// Rejections for one collection in one namespace
    pub fn rejected_for(&self, group_resource: &GroupResource, namespace: &str) -> i64 {
        self.rejected
            .iter()
            .filter(|item| {
                item.key.namespace == namespace
                    && item.key.group == group_resource.group()
                    && item.key.resource == group_resource.resource()
            })
            .count() as i64
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStats {
    pub namespace: String,
    pub group: String,
    pub resource: String,
    pub count: i64,
}

/// Send-many, receive-one write channel
#[async_trait]
pub trait BulkStream: Send {
    async fn send(&mut self, request: BulkRequest) -> UnifiedResult<()>;

    /// Ends the stream and waits for the aggregate response. Dropping a stream
    /// without closing it discards everything sent.
    async fn close(self: Box<Self>) -> UnifiedResult<BulkResponse>;
}

#[async_trait]
pub trait BulkStore: Send + Sync {
    async fn open_bulk(&self, settings: BulkSettings) -> UnifiedResult<Box<dyn BulkStream>>;
}

#[async_trait]
pub trait StatsClient: Send + Sync {
    async fn get_stats(
        &self,
        namespace: &str,
        kinds: &[GroupResource],
    ) -> UnifiedResult<Vec<ResourceStats>>;
}
