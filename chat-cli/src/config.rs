//! Local state for lanchat: the user profile and the network config file.

use anyhow::{Context, Result};
use chat_client::SessionConfig;
use chat_types::MemberName;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Profile file name inside the data directory.
pub const PROFILE_FILE: &str = "profile.json";

/// Network config file name inside the data directory.
pub const CONFIG_FILE: &str = "lanchat.toml";

/// User profile stored locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Display name shown to other members.
    pub name: String,
    /// When the profile was created (Unix seconds).
    pub created_at: u64,
}

impl Profile {
    /// Create a profile, validating the name against the wire rules.
    pub fn new(name: &str) -> Result<Self> {
        let name = MemberName::new(name).context("Invalid display name")?;
        Ok(Self {
            name: name.into_string(),
            created_at: unix_now(),
        })
    }

    /// The stored name as a validated member name.
    pub fn member_name(&self) -> Result<MemberName> {
        MemberName::new(self.name.as_str()).context("Stored display name is invalid")
    }

    /// Load the profile from a directory.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(PROFILE_FILE);
        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("Profile not initialized. Run 'lanchat init --name <name>' first.")?;
        serde_json::from_str(&contents).context("Invalid profile")
    }

    /// Save the profile to a directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(PROFILE_FILE);
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save profile")?;
        set_file_permissions_0600(&path).await?;
        Ok(())
    }

    /// Check if a profile exists.
    pub async fn exists(data_dir: &Path) -> bool {
        tokio::fs::try_exists(data_dir.join(PROFILE_FILE))
            .await
            .unwrap_or(false)
    }
}

/// Resolve the network configuration.
///
/// An explicit `--config` path must exist. Otherwise `<data-dir>/lanchat.toml`
/// is used when present, and built-in defaults when not.
pub fn load_session_config(data_dir: &Path, explicit: Option<&Path>) -> Result<SessionConfig> {
    if let Some(path) = explicit {
        return SessionConfig::from_file(path).context("Failed to load configuration");
    }

    let path = data_dir.join(CONFIG_FILE);
    if path.exists() {
        tracing::info!("Loading configuration from {}", path.display());
        return SessionConfig::from_file(&path).context("Failed to load configuration");
    }

    tracing::debug!("No config file, using defaults");
    Ok(SessionConfig::default())
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Set file permissions to 0600 (owner read/write only) on Unix.
/// No-op on non-Unix platforms.
async fn set_file_permissions_0600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
            .await
            .context("Failed to set file permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
