//! Location of the external provisioning toolchain.
//!
//! The toolchain is an opaque directory of entry-point scripts (one per
//! operation) that talk to the Apple Developer Portal on our behalf. This
//! module only resolves where those scripts live; invoking them is the
//! launcher's job.

use crate::error::{ProvisionError, Result};
use std::path::{Path, PathBuf};

/// Environment override for the toolchain root directory.
pub const TOOLCHAIN_DIR_VAR: &str = "APPFORGE_TOOLCHAIN_DIR";

/// The toolchain entry points, one per bridge operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolchainEntry {
    ValidateCredentials,
    AppManagement,
    FetchProvisioningProfile,
    FetchPushCert,
    FetchCert,
}

impl ToolchainEntry {
    /// Script name inside the toolchain directory.
    #[must_use]
    pub fn script_name(self) -> &'static str {
        match self {
            Self::ValidateCredentials => "validate_apple_credentials",
            Self::AppManagement => "app_management",
            Self::FetchProvisioningProfile => "fetch_new_provisioning_profile",
            Self::FetchPushCert => "fetch_push_cert",
            Self::FetchCert => "fetch_cert",
        }
    }
}

/// Resolved toolchain install.
#[derive(Debug, Clone)]
pub struct Toolchain {
    root: PathBuf,
}

impl Toolchain {
    /// Use an explicit toolchain root.
    pub fn from_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Locate the toolchain: `APPFORGE_TOOLCHAIN_DIR` if set, otherwise the
    /// per-user data directory default (where the installer drops it).
    ///
    /// Fails when the resolved directory does not exist; a missing toolchain
    /// is a setup problem, not something to discover mid-operation.
    pub fn locate() -> Result<Self> {
        let root = match std::env::var_os(TOOLCHAIN_DIR_VAR) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .ok_or(ProvisionError::MissingHome("HOME"))?
                .join("appforge")
                .join("toolchain"),
        };
        if !root.is_dir() {
            return Err(ProvisionError::ToolchainMissing(root));
        }
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the entry-point scripts. This is what gets staged
    /// into the compatibility shell on the platform that needs it.
    #[must_use]
    pub fn scripts_dir(&self) -> &Path {
        &self.root
    }

    /// Absolute path of one entry-point script.
    #[must_use]
    pub fn entry_path(&self, entry: ToolchainEntry) -> PathBuf {
        self.root.join(entry.script_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_paths_join_script_names() {
        let toolchain = Toolchain::from_root("/opt/appforge/toolchain");
        assert_eq!(
            toolchain.entry_path(ToolchainEntry::ValidateCredentials),
            Path::new("/opt/appforge/toolchain/validate_apple_credentials")
        );
        assert_eq!(
            toolchain.entry_path(ToolchainEntry::FetchPushCert),
            Path::new("/opt/appforge/toolchain/fetch_push_cert")
        );
    }
}
