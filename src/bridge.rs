//! Credential bridge over the external provisioning toolchain.
//!
//! Each operation marshals a fixed positional argument list, spawns exactly
//! one toolchain subprocess through the launch session, and decodes the JSON
//! reply collected from its error stream. No retries, no timeouts: every
//! failure surfaces to the immediate caller.

use crate::error::{ProvisionError, Result};
use crate::launcher::LaunchSession;
use crate::reply::Reply;
use crate::toolchain::{Toolchain, ToolchainEntry};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Apple account credentials, supplied per call and never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credentials {
    pub account_id: String,
    pub secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("account_id", &self.account_id)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// App identity handed to the app-management operations.
#[derive(Debug, Clone)]
pub struct AppMetadata {
    pub bundle_identifier: String,
    pub app_name: String,
}

/// One team attached to the account, as reported by credential validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    #[serde(rename = "teamId")]
    pub team_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Deserialize)]
struct ValidationReply {
    teams: Vec<TeamRecord>,
}

/// Typed operations over the toolchain subprocess protocol.
///
/// Calls serialize through `&mut self`; each spawns one subprocess and waits
/// for it before returning.
pub struct CredentialBridge {
    toolchain: Toolchain,
    session: LaunchSession,
}

impl CredentialBridge {
    /// Bridge for the current host's launch mode.
    #[must_use]
    pub fn new(toolchain: Toolchain) -> Self {
        Self {
            toolchain,
            session: LaunchSession::for_host(),
        }
    }

    /// Bridge over an explicit session (tests use a local shell bridge).
    #[must_use]
    pub fn with_session(toolchain: Toolchain, session: LaunchSession) -> Self {
        Self { toolchain, session }
    }

    /// Check the account credentials and list the teams they grant access
    /// to. The list may be empty; deciding whether that is fatal is team
    /// selection policy, see [`select_team_id`].
    pub async fn validate_credentials(&mut self, creds: &Credentials) -> Result<Vec<TeamRecord>> {
        let reply = self
            .run(
                ToolchainEntry::ValidateCredentials,
                vec![creds.account_id.clone(), creds.secret.clone()],
            )
            .await?;
        let value = reply.into_success()?;
        let parsed: ValidationReply = serde_json::from_value(value)?;
        Ok(parsed.teams)
    }

    /// Register the app on the developer portal.
    pub async fn create_app(
        &mut self,
        creds: &Credentials,
        metadata: &AppMetadata,
        team_id: &str,
    ) -> Result<Reply> {
        self.app_management("create", creds, metadata, team_id).await
    }

    /// Verify the app identifier exists for this team.
    pub async fn verify_app_id(
        &mut self,
        creds: &Credentials,
        metadata: &AppMetadata,
        team_id: &str,
    ) -> Result<Reply> {
        self.app_management("verify", creds, metadata, team_id).await
    }

    async fn app_management(
        &mut self,
        action: &str,
        creds: &Credentials,
        metadata: &AppMetadata,
        team_id: &str,
    ) -> Result<Reply> {
        self.run(
            ToolchainEntry::AppManagement,
            vec![
                action.to_string(),
                creds.account_id.clone(),
                creds.secret.clone(),
                team_id.to_string(),
                metadata.bundle_identifier.clone(),
                metadata.app_name.clone(),
            ],
        )
        .await
    }

    /// Produce a provisioning profile for the bundle.
    pub async fn fetch_provisioning_profile(
        &mut self,
        creds: &Credentials,
        bundle_identifier: &str,
        team_id: &str,
    ) -> Result<Reply> {
        self.run(
            ToolchainEntry::FetchProvisioningProfile,
            vec![
                creds.account_id.clone(),
                creds.secret.clone(),
                bundle_identifier.to_string(),
                team_id.to_string(),
            ],
        )
        .await
    }

    /// Produce push certificates for the bundle.
    pub async fn fetch_push_cert(
        &mut self,
        creds: &Credentials,
        bundle_identifier: &str,
        team_id: &str,
    ) -> Result<Reply> {
        self.run(
            ToolchainEntry::FetchPushCert,
            vec![
                creds.account_id.clone(),
                creds.secret.clone(),
                bundle_identifier.to_string(),
                team_id.to_string(),
            ],
        )
        .await
    }

    /// Produce a distribution certificate for the team.
    pub async fn fetch_cert(&mut self, creds: &Credentials, team_id: &str) -> Result<Reply> {
        self.run(
            ToolchainEntry::FetchCert,
            vec![
                creds.account_id.clone(),
                creds.secret.clone(),
                team_id.to_string(),
            ],
        )
        .await
    }

    /// Remove the staged scratch directory, if any. Required at process
    /// exit on the shell-bridged platform; a no-op everywhere else.
    pub async fn clean_up(&mut self) -> Result<()> {
        self.session.clean_up().await
    }

    async fn run(&mut self, entry: ToolchainEntry, args: Vec<String>) -> Result<Reply> {
        let program = self.toolchain.entry_path(entry);
        let raw = self
            .session
            .spawn_and_collect(&program, &args, self.toolchain.scripts_dir())
            .await?;
        Ok(Reply::decode(&raw))
    }
}

/// Pick the team to operate under.
///
/// Zero teams is fatal (there is nothing to proceed with), a single team is
/// auto-selected, and multiple teams defer to the injected chooser, which
/// returns a 0-based index into the list. The chooser is only consulted in
/// the multiple-team case.
pub fn select_team_id<F>(teams: &[TeamRecord], choose: F) -> Result<String>
where
    F: FnOnce(&[TeamRecord]) -> Result<usize>,
{
    match teams {
        [] => Err(ProvisionError::NoTeams),
        [only] => Ok(only.team_id.clone()),
        many => {
            let index = choose(many)?;
            many.get(index)
                .map(|team| team.team_id.clone())
                .ok_or_else(|| {
                    ProvisionError::InvalidSelection(format!(
                        "{} is out of range for {} teams",
                        index + 1,
                        many.len()
                    ))
                })
        }
    }
}
