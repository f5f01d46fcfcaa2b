//! In-process unified store used for rehearsals and tests.
//!
//! A single actor task owns all collections. Bulk streams stage their writes
//! inside the actor and commit only when closed; a stream dropped before
//! close is discarded. Committing a stream replaces every collection it
//! declared for rebuild, so replaying the same data twice leaves one copy.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    BulkRequest, BulkResponse, BulkSettings, BulkStore, BulkStream, BulkSummary, RejectedItem,
    ResourceKey, ResourceStats, StatsClient, WriteAction,
};
use crate::errors::{UnifiedError, UnifiedResult};
use crate::registry::GroupResource;

/// An object as committed to the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredResource {
    pub key: ResourceKey,
    pub folder: String,
    pub value: Vec<u8>,
    /// Number of writes the object received in the commit that produced it
    pub writes: usize,
}

impl StoredResource {
    pub fn json(&self) -> UnifiedResult<Value> {
        Ok(serde_json::from_slice(&self.value)?)
    }
}

type Collection = BTreeMap<String, StoredResource>;

enum StoreCommand {
    Open {
        settings: BulkSettings,
        response: oneshot::Sender<u64>,
    },
    Write {
        stream_id: u64,
        request: BulkRequest,
    },
    Close {
        stream_id: u64,
        response: oneshot::Sender<UnifiedResult<BulkResponse>>,
    },
    Abort {
        stream_id: u64,
    },
    Stats {
        namespace: String,
        kinds: Vec<GroupResource>,
        response: oneshot::Sender<Vec<ResourceStats>>,
    },
    Get {
        key: ResourceKey,
        response: oneshot::Sender<Option<StoredResource>>,
    },
    List {
        namespace: String,
        group_resource: GroupResource,
        response: oneshot::Sender<Vec<StoredResource>>,
    },
    Shutdown {
        response: oneshot::Sender<()>,
    },
}

/// Handle to the store actor
pub struct MemoryResourceStore {
    command_tx: mpsc::Sender<StoreCommand>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl MemoryResourceStore {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel(1000);

        let task_handle = tokio::spawn(async move {
            let state = StoreState {
                collections: HashMap::new(),
                streams: HashMap::new(),
                next_stream_id: 1,
            };
            state.run(rx).await;
        });

        debug!("MemoryResourceStore spawned");

        Self {
            command_tx: tx,
            task_handle,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> StoreCommand,
    ) -> UnifiedResult<T> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(build(tx))
            .await
            .map_err(|_| UnifiedError::Transport("resource store unavailable".to_string()))?;
        rx.await.map_err(|_| UnifiedError::StreamClosed)
    }

    pub async fn get(&self, key: &ResourceKey) -> UnifiedResult<Option<StoredResource>> {
        let key = key.clone();
        self.request(|response| StoreCommand::Get { key, response })
            .await
    }

    /// Objects of one collection in one namespace, ordered by name
    pub async fn list(
        &self,
        namespace: &str,
        group_resource: &GroupResource,
    ) -> UnifiedResult<Vec<StoredResource>> {
        let namespace = namespace.to_string();
        let group_resource = group_resource.clone();
        self.request(|response| StoreCommand::List {
            namespace,
            group_resource,
            response,
        })
        .await
    }

    pub async fn shutdown(self) {
        let (tx, rx) = oneshot::channel();
        let _ = self
            .command_tx
            .send(StoreCommand::Shutdown { response: tx })
            .await;
        let _ = rx.await;
        let _ = self.task_handle.await;
    }
}

#[async_trait]
impl BulkStore for MemoryResourceStore {
    async fn open_bulk(&self, settings: BulkSettings) -> UnifiedResult<Box<dyn BulkStream>> {
        if settings.namespace.is_empty() {
            return Err(UnifiedError::InvalidStream(
                "bulk stream requires a namespace".to_string(),
            ));
        }
        if settings.rebuild_collections.is_empty() {
            return Err(UnifiedError::InvalidStream(
                "bulk stream requires at least one collection".to_string(),
            ));
        }

        let stream_id = self
            .request(|response| StoreCommand::Open { settings, response })
            .await?;

        Ok(Box::new(MemoryBulkStream {
            stream_id,
            command_tx: self.command_tx.clone(),
            closed: false,
        }))
    }
}

#[async_trait]
impl StatsClient for MemoryResourceStore {
    async fn get_stats(
        &self,
        namespace: &str,
        kinds: &[GroupResource],
    ) -> UnifiedResult<Vec<ResourceStats>> {
        let namespace = namespace.to_string();
        let kinds = kinds.to_vec();
        self.request(|response| StoreCommand::Stats {
            namespace,
            kinds,
            response,
        })
        .await
    }
}

struct MemoryBulkStream {
    stream_id: u64,
    command_tx: mpsc::Sender<StoreCommand>,
    closed: bool,
}

#[async_trait]
impl BulkStream for MemoryBulkStream {
    async fn send(&mut self, request: BulkRequest) -> UnifiedResult<()> {
        self.command_tx
            .send(StoreCommand::Write {
                stream_id: self.stream_id,
                request,
            })
            .await
            .map_err(|_| UnifiedError::StreamClosed)
    }

    async fn close(mut self: Box<Self>) -> UnifiedResult<BulkResponse> {
        self.closed = true;
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(StoreCommand::Close {
                stream_id: self.stream_id,
                response: tx,
            })
            .await
            .map_err(|_| UnifiedError::StreamClosed)?;
        rx.await.map_err(|_| UnifiedError::StreamClosed)?
    }
}

impl Drop for MemoryBulkStream {
    fn drop(&mut self) {
        if !self.closed {
            // Best effort; a full queue leaves the staged writes until shutdown
            let _ = self.command_tx.try_send(StoreCommand::Abort {
                stream_id: self.stream_id,
            });
        }
    }
}

struct OpenStream {
    settings: BulkSettings,
    staged: Vec<BulkRequest>,
    rejected: Vec<RejectedItem>,
    processed: i64,
}

impl OpenStream {
    fn check(&self, request: &BulkRequest) -> Result<(), String> {
        if request.key.namespace != self.settings.namespace {
            return Err(format!(
                "namespace '{}' does not match stream namespace '{}'",
                request.key.namespace, self.settings.namespace
            ));
        }
        if !self
            .settings
            .rebuild_collections
            .contains(&request.key.group_resource())
        {
            return Err(format!(
                "collection {}.{} was not declared for this stream",
                request.key.resource, request.key.group
            ));
        }
        if request.key.name.is_empty() {
            return Err("missing name".to_string());
        }
        if self.settings.skip_validation || request.action == WriteAction::Deleted {
            return Ok(());
        }

        let value: Value = serde_json::from_slice(&request.value)
            .map_err(|err| format!("invalid object: {}", err))?;
        let metadata = value
            .get("metadata")
            .ok_or_else(|| "object has no metadata".to_string())?;
        if metadata.get("name").and_then(Value::as_str) != Some(request.key.name.as_str()) {
            return Err("metadata.name does not match key".to_string());
        }
        if let Some(namespace) = metadata.get("namespace").and_then(Value::as_str) {
            if namespace != request.key.namespace {
                return Err("metadata.namespace does not match key".to_string());
            }
        }
        if value.get("kind").and_then(Value::as_str).unwrap_or_default().is_empty() {
            return Err("object has no kind".to_string());
        }
        Ok(())
    }
}

struct StoreState {
    collections: HashMap<(String, GroupResource), Collection>,
    streams: HashMap<u64, OpenStream>,
    next_stream_id: u64,
}

impl StoreState {
    async fn run(mut self, mut command_rx: mpsc::Receiver<StoreCommand>) {
        debug!("resource store event loop started");

        while let Some(cmd) = command_rx.recv().await {
            match cmd {
                StoreCommand::Open { settings, response } => {
                    let stream_id = self.next_stream_id;
                    self.next_stream_id += 1;
                    debug!(
                        "bulk stream {} opened for {} ({} collections)",
                        stream_id,
                        settings.namespace,
                        settings.rebuild_collections.len()
                    );
                    self.streams.insert(
                        stream_id,
                        OpenStream {
                            settings,
                            staged: Vec::new(),
                            rejected: Vec::new(),
                            processed: 0,
                        },
                    );
                    let _ = response.send(stream_id);
                }

                StoreCommand::Write { stream_id, request } => {
                    let Some(stream) = self.streams.get_mut(&stream_id) else {
                        warn!("write for unknown bulk stream {}", stream_id);
                        continue;
                    };
                    stream.processed += 1;
                    match stream.check(&request) {
                        Ok(()) => stream.staged.push(request),
                        Err(error) => stream.rejected.push(RejectedItem {
                            key: request.key,
                            action: request.action,
                            error,
                        }),
                    }
                }

                StoreCommand::Close {
                    stream_id,
                    response,
                } => {
                    let result = match self.streams.remove(&stream_id) {
                        Some(stream) => Ok(self.commit(stream)),
                        None => Err(UnifiedError::InvalidStream(format!(
                            "bulk stream {} is not open",
                            stream_id
                        ))),
                    };
                    let _ = response.send(result);
                }

                StoreCommand::Abort { stream_id } => {
                    if let Some(stream) = self.streams.remove(&stream_id) {
                        debug!(
                            "bulk stream {} dropped, discarding {} staged writes",
                            stream_id,
                            stream.staged.len()
                        );
                    }
                }

                StoreCommand::Stats {
                    namespace,
                    kinds,
                    response,
                } => {
                    let stats = kinds
                        .into_iter()
                        .map(|kind| {
                            let count = self
                                .collections
                                .get(&(namespace.clone(), kind.clone()))
                                .map(|collection| collection.len() as i64)
                                .unwrap_or(0);
                            ResourceStats {
                                namespace: namespace.clone(),
                                group: kind.group().to_string(),
                                resource: kind.resource().to_string(),
                                count,
                            }
                        })
                        .collect();
                    let _ = response.send(stats);
                }

                StoreCommand::Get { key, response } => {
                    let found = self
                        .collections
                        .get(&(key.namespace.clone(), key.group_resource()))
                        .and_then(|collection| collection.get(&key.name))
                        .cloned();
                    let _ = response.send(found);
                }

                StoreCommand::List {
                    namespace,
                    group_resource,
                    response,
                } => {
                    let items = self
                        .collections
                        .get(&(namespace, group_resource))
                        .map(|collection| collection.values().cloned().collect())
                        .unwrap_or_default();
                    let _ = response.send(items);
                }

                StoreCommand::Shutdown { response } => {
                    debug!(
                        "resource store shutting down with {} open streams",
                        self.streams.len()
                    );
                    let _ = response.send(());
                    break;
                }
            }
        }

        debug!("resource store event loop ended");
    }

    fn commit(&mut self, stream: OpenStream) -> BulkResponse {
        let namespace = stream.settings.namespace.clone();
        let mut rebuilt: HashMap<GroupResource, Collection> = stream
            .settings
            .rebuild_collections
            .iter()
            .map(|kind| (kind.clone(), Collection::new()))
            .collect();

        for request in stream.staged {
            let Some(collection) = rebuilt.get_mut(&request.key.group_resource()) else {
                continue;
            };
            match request.action {
                WriteAction::Deleted => {
                    collection.remove(&request.key.name);
                }
                WriteAction::Added | WriteAction::Modified => {
                    let writes = collection
                        .get(&request.key.name)
                        .map(|existing| existing.writes)
                        .unwrap_or(0);
                    collection.insert(
                        request.key.name.clone(),
                        StoredResource {
                            key: request.key,
                            folder: request.folder,
                            value: request.value,
                            writes: writes + 1,
                        },
                    );
                }
            }
        }

        let mut summary = Vec::with_capacity(rebuilt.len());
        for kind in &stream.settings.rebuild_collections {
            let collection = rebuilt.remove(kind).unwrap_or_default();
            summary.push(BulkSummary {
                namespace: namespace.clone(),
                group: kind.group().to_string(),
                resource: kind.resource().to_string(),
                count: collection.len() as i64,
                history: collection.values().any(|item| item.writes > 1),
            });
            self.collections
                .insert((namespace.clone(), kind.clone()), collection);
        }

        debug!(
            "bulk stream for {} committed: {} processed, {} rejected",
            namespace,
            stream.processed,
            stream.rejected.len()
        );

        BulkResponse {
            processed: stream.processed,
            summary,
            rejected: stream.rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::unified::{ApiVersion, ResourceObject};

    fn playlists() -> GroupResource {
        GroupResource::new("playlist.grafana.app", "playlists")
    }

    fn settings(namespace: &str) -> BulkSettings {
        BulkSettings {
            namespace: namespace.to_string(),
            rebuild_collections: vec![playlists()],
            skip_validation: false,
        }
    }

    fn request(namespace: &str, name: &str) -> BulkRequest {
        let object = ResourceObject::new(
            "playlist.grafana.app",
            ApiVersion::V0Alpha1,
            "Playlist",
            namespace,
            name,
        );
        BulkRequest::write(
            ResourceKey::new(namespace, &playlists(), name),
            WriteAction::Added,
            &object,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_commit_replaces_collection() {
        let store = MemoryResourceStore::spawn();

        let mut stream = store.open_bulk(settings("org-2")).await.unwrap();
        stream.send(request("org-2", "a")).await.unwrap();
        stream.send(request("org-2", "b")).await.unwrap();
        let response = stream.close().await.unwrap();
        assert_eq!(response.processed, 2);
        assert_eq!(response.summary[0].count, 2);

        let mut stream = store.open_bulk(settings("org-2")).await.unwrap();
        stream.send(request("org-2", "b")).await.unwrap();
        stream.close().await.unwrap();

        let names: Vec<String> = store
            .list("org-2", &playlists())
            .await
            .unwrap()
            .into_iter()
            .map(|item| item.key.name)
            .collect();
        assert_eq!(names, vec!["b"]);
    }

    #[tokio::test]
    async fn test_rejects_foreign_namespace_and_bad_payload() {
        let store = MemoryResourceStore::spawn();

        let mut stream = store.open_bulk(settings("org-2")).await.unwrap();
        stream.send(request("org-3", "a")).await.unwrap();
        let mut broken = request("org-2", "b");
        broken.value = b"not json".to_vec();
        stream.send(broken).await.unwrap();
        stream.send(request("org-2", "c")).await.unwrap();
        let response = stream.close().await.unwrap();

        assert_eq!(response.processed, 3);
        assert_eq!(response.rejected.len(), 2);
        assert_eq!(response.summary[0].count, 1);
        assert_eq!(response.rejected_for(&playlists(), "org-2"), 1);
    }

    #[tokio::test]
    async fn test_dropped_stream_is_discarded() {
        let store = MemoryResourceStore::spawn();

        let mut stream = store.open_bulk(settings("default")).await.unwrap();
        stream.send(request("default", "a")).await.unwrap();
        drop(stream);

        let stats = store.get_stats("default", &[playlists()]).await.unwrap();
        assert_eq!(stats[0].count, 0);
        store.shutdown().await;
    }
}
