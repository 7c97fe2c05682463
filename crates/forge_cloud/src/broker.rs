//! Credential Broker (C6, §4.6): two-phase cross-account role setup plus
//! short-lived runtime credential issuance via STS `AssumeRole`.
//!
//! The nonce described abstractly in §4.6 is mechanically an IAM
//! `ExternalId` parameter, confirmed by the original connection flow this
//! is grounded on. Verification uses the STS minimum duration (900s);
//! runtime assumption uses the full hour.

use std::collections::HashMap;
use std::sync::Arc;

use aws_sdk_sts::Client as StsClient;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{CloudError, CloudResult};

const VERIFICATION_DURATION_SECS: i32 = 900;
const RUNTIME_DURATION_SECS: i32 = 3600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Pending,
    Verified,
}

#[derive(Debug, Clone)]
pub struct ConnectionRecord {
    pub nonce: String,
    pub status: ConnectionStatus,
    pub role_arn: Option<String>,
    pub account_id: Option<String>,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct ConnectionInit {
    pub nonce: String,
    pub console_url: String,
}

#[derive(Debug, Clone)]
pub struct AssumedCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expiration: DateTime<Utc>,
    /// The caller's verified account id (§4.6), not our own — per-caller
    /// resource naming (state bucket, image registry) must key off this,
    /// never off a process-wide account id.
    pub account_id: String,
}

/// Brokers short-lived, nonce-bound cross-account credentials. Connection
/// state (caller -> nonce/status/role) lives in an in-process table rather
/// than a database row, mirroring the session-scoped store used elsewhere
/// in this workspace.
pub struct CredentialBroker {
    sts: StsClient,
    our_account_id: String,
    region: String,
    connections: Arc<RwLock<HashMap<String, ConnectionRecord>>>,
}

impl CredentialBroker {
    pub fn new(sts: StsClient, our_account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self { sts, our_account_id: our_account_id.into(), region: region.into(), connections: Arc::new(RwLock::new(HashMap::new())) }
    }

    fn generate_nonce() -> String {
        format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
    }

    /// Starts the setup flow for `caller`: generates a nonce, records a
    /// pending connection, and returns a one-click console URL embedding
    /// our account id and the nonce as an `ExternalId` parameter.
    pub fn initiate(&self, caller: &str) -> ConnectionInit {
        let nonce = Self::generate_nonce();
        self.connections.write().insert(
            caller.to_string(),
            ConnectionRecord { nonce: nonce.clone(), status: ConnectionStatus::Pending, role_arn: None, account_id: None, verified_at: None },
        );

        let console_url = format!(
            "https://console.aws.amazon.com/cloudformation/home?region={region}#/stacks/create/review\
             ?stackName=forge-setup&param_ForgeAccountId={account}&param_ExternalId={nonce}",
            region = self.region,
            account = self.our_account_id,
        );

        ConnectionInit { nonce, console_url }
    }

    /// Verifies that the role the caller created can be assumed with the
    /// stored nonce, and if so, records the account id it belongs to.
    pub async fn verify(&self, caller: &str, role_arn: &str) -> CloudResult<String> {
        let nonce = {
            let connections = self.connections.read();
            connections.get(caller).map(|c| c.nonce.clone()).ok_or(CloudError::NotInitiated)?
        };

        let response = self
            .sts
            .assume_role()
            .role_arn(role_arn)
            .role_session_name("forge-verification")
            .external_id(&nonce)
            .duration_seconds(VERIFICATION_DURATION_SECS)
            .send()
            .await
            .map_err(|e| CloudError::VerificationFailed(e.to_string()))?;

        response.credentials().ok_or_else(|| CloudError::VerificationFailed("no credentials in response".into()))?;
        let arn = response
            .assumed_role_user()
            .and_then(|u| u.arn())
            .ok_or_else(|| CloudError::VerificationFailed("no assumed role user in response".into()))?;
        let account_id = extract_account_id(arn)?;

        let mut connections = self.connections.write();
        if let Some(record) = connections.get_mut(caller) {
            record.status = ConnectionStatus::Verified;
            record.role_arn = Some(role_arn.to_string());
            record.account_id = Some(account_id.clone());
            record.verified_at = Some(Utc::now());
        }

        Ok(account_id)
    }

    /// Assumes the caller's verified role and returns short-lived
    /// credentials valid for one hour. Credentials are never persisted.
    pub async fn assume(&self, caller: &str) -> CloudResult<AssumedCredentials> {
        let record = {
            let connections = self.connections.read();
            connections.get(caller).cloned().ok_or(CloudError::NotInitiated)?
        };
        if record.status != ConnectionStatus::Verified {
            return Err(CloudError::NotVerified);
        }
        let role_arn = record.role_arn.ok_or(CloudError::NotVerified)?;
        let account_id = record.account_id.ok_or(CloudError::NotVerified)?;

        let response = self
            .sts
            .assume_role()
            .role_arn(&role_arn)
            .role_session_name(format!("forge-session-{}", &caller[..caller.len().min(8)]))
            .external_id(&record.nonce)
            .duration_seconds(RUNTIME_DURATION_SECS)
            .send()
            .await
            .map_err(|e| CloudError::AssumeRoleFailed(e.to_string()))?;

        let credentials = response.credentials().ok_or_else(|| CloudError::AssumeRoleFailed("no credentials in response".into()))?;

        Ok(AssumedCredentials {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration: DateTime::from_timestamp(credentials.expiration().secs(), 0).unwrap_or_else(Utc::now),
            account_id,
        })
    }

    pub fn connection(&self, caller: &str) -> Option<ConnectionRecord> {
        self.connections.read().get(caller).cloned()
    }
}

/// Parses the account id out of an assumed-role ARN
/// (`arn:aws:sts::<ACCOUNT>:assumed-role/<role>/<session>`), the
/// returned principal per §4.6, rather than trusting the caller-supplied
/// role ARN or any part of the temporary credentials themselves.
fn extract_account_id(arn: &str) -> CloudResult<String> {
    arn.split(':')
        .nth(4)
        .filter(|segment| !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()))
        .map(|segment| segment.to_string())
        .ok_or_else(|| CloudError::VerificationFailed(format!("could not parse account id from arn: {arn}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nonce_is_32_bytes_hex_encoded() {
        let nonce = CredentialBroker::generate_nonce();
        assert_eq!(nonce.len(), 64);
        assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn nonces_are_unique_across_calls() {
        let a = CredentialBroker::generate_nonce();
        let b = CredentialBroker::generate_nonce();
        assert_ne!(a, b);
    }

    #[test]
    fn extracts_account_id_from_assumed_role_arn() {
        let arn = "arn:aws:sts::123456789012:assumed-role/forge-setup/forge-verification";
        assert_eq!(extract_account_id(arn).unwrap(), "123456789012");
    }

    #[test]
    fn rejects_arn_with_non_numeric_account_segment() {
        let arn = "arn:aws:sts::not-an-account:assumed-role/forge-setup/forge-verification";
        assert!(extract_account_id(arn).is_err());
    }
}
