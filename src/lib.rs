//! User settings storage and credential provisioning over the bundled
//! signing toolchain.
//!
//! Two independent pieces of glue:
//! - [`settings`]: the per-user JSON settings document under
//!   `~/.appforge/`, lazily read and created on first write.
//! - [`bridge`]: typed operations (validate, create, verify, fetch profile /
//!   push cert / cert) over an external provisioning toolchain invoked as a
//!   black-box subprocess, with its JSON replies collected from the error
//!   stream.

pub mod bridge;
pub mod error;
pub mod launcher;
#[macro_use]
pub mod prompts;
pub mod reply;
pub mod settings;
pub mod toolchain;

// Re-export common types
pub use bridge::{select_team_id, AppMetadata, CredentialBridge, Credentials, TeamRecord};
pub use error::{ProvisionError, Result};
pub use launcher::LaunchSession;
pub use reply::Reply;
pub use settings::SettingsDocument;
pub use toolchain::{Toolchain, ToolchainEntry};
