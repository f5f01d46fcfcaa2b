use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::errors::{MigrationError, MigrationResult};
use crate::legacy::{LegacyRowSource, WriteEvent, WriteEventBroadcaster};
use crate::unified::{BulkRequest, BulkResponse, BulkStream};

/// Progress callback: running count for the current resource and a message
pub type ProgressFn = Arc<dyn Fn(i64, &str) + Send + Sync>;

/// What a migrator needs to read one organization's rows.
pub struct MigrationRun<'a> {
    pub org_id: i64,
    pub namespace: &'a str,
    pub with_history: bool,
    pub source: &'a LegacyRowSource,
    pub cancel: &'a CancellationToken,
    pub(crate) progress: Option<&'a ProgressFn>,
}

impl<'a> MigrationRun<'a> {
    pub fn new(
        org_id: i64,
        namespace: &'a str,
        source: &'a LegacyRowSource,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            org_id,
            namespace,
            with_history: false,
            source,
            cancel,
            progress: None,
        }
    }

    pub fn report(&self, count: i64, message: &str) {
        if let Some(progress) = self.progress {
            progress(count, message);
        }
    }

    /// Fails with `Cancelled` once the run's token fires; migrators call this
    /// between pages
    pub fn check_cancelled(&self) -> MigrationResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }
        Ok(())
    }
}

/// Write side of a run: forwards requests to the bulk stream and mirrors each
/// accepted send to the write-event broadcaster.
pub struct BulkSink {
    stream: Box<dyn BulkStream>,
    broadcaster: Option<WriteEventBroadcaster>,
    cancel: CancellationToken,
    sent: i64,
}

impl BulkSink {
    pub fn new(
        stream: Box<dyn BulkStream>,
        broadcaster: Option<WriteEventBroadcaster>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            broadcaster,
            cancel,
            sent: 0,
        }
    }

    pub async fn send(&mut self, request: BulkRequest) -> MigrationResult<()> {
        if self.cancel.is_cancelled() {
            return Err(MigrationError::Cancelled);
        }

        let event = self.broadcaster.as_ref().map(|_| WriteEvent {
            key: request.key.clone(),
            action: request.action,
            folder: request.folder.clone(),
        });

        self.stream.send(request).await?;
        self.sent += 1;

        if let (Some(broadcaster), Some(event)) = (&self.broadcaster, event) {
            broadcaster.publish(&event);
        }
        Ok(())
    }

    pub fn sent(&self) -> i64 {
        self.sent
    }

    pub async fn close(self) -> MigrationResult<BulkResponse> {
        Ok(self.stream.close().await?)
    }
}
