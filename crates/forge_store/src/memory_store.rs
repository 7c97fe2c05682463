//! Stage-memory persistence backend (§4.3 persistence contract): snapshots
//! a session's [`StageMemory`] to the object store under a session-scoped
//! key, so the assistant endpoint can reconstitute it after the in-process
//! workflow session has been reaped. The key itself is the "database row"
//! pointer this crate has no SQL layer to hold separately.

use forge_core::{SessionId, StageMemory};
use tracing::info;

use crate::error::{StoreError, StoreResult};

fn memory_key(session: SessionId) -> String {
    format!("sessions/{session}/stage-memory.json")
}

pub struct MemoryStore {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl MemoryStore {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    pub async fn snapshot(&self, session: SessionId, memory: &StageMemory) -> StoreResult<String> {
        let key = memory_key(session);
        let body = serde_json::to_vec(memory).map_err(|e| StoreError::Backend {
            bucket: self.bucket.clone(),
            key: key.clone(),
            message: e.to_string(),
        })?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(body.into())
            .content_type("application/json")
            .send()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.bucket.clone(), key: key.clone(), message: e.to_string() })?;
        info!(%session, %key, "snapshotted stage memory");
        Ok(key)
    }

    pub async fn reconstitute(&self, session: SessionId) -> StoreResult<StageMemory> {
        let key = memory_key(session);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false) {
                    StoreError::NotFound(key.clone())
                } else {
                    StoreError::Backend { bucket: self.bucket.clone(), key: key.clone(), message: e.to_string() }
                }
            })?;
        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Backend { bucket: self.bucket.clone(), key: key.clone(), message: e.to_string() })?;
        serde_json::from_slice(&bytes.into_bytes())
            .map_err(|e| StoreError::Backend { bucket: self.bucket.clone(), key, message: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_scoped_by_session() {
        let session = SessionId::new();
        assert!(memory_key(session).starts_with(&format!("sessions/{session}/")));
    }
}
