//! Store the user's display name.

use anyhow::Result;
use std::path::Path;

use crate::config::{Profile, PROFILE_FILE};

/// Run the init command.
pub async fn run(data_dir: &Path, name: &str) -> Result<()> {
    // Check if already initialized
    if Profile::exists(data_dir).await {
        anyhow::bail!(
            "Profile already initialized. Delete {} to reinitialize.",
            data_dir.join(PROFILE_FILE).display()
        );
    }

    let profile = Profile::new(name)?;
    profile.save(data_dir).await?;

    println!("Profile initialized successfully!");
    println!();
    println!("  Name:      {}", profile.name);
    println!("  Data dir:  {}", data_dir.display());
    println!();
    println!("Next step:");
    println!("  lanchat chat");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn init_creates_profile() {
        let dir = tempdir().unwrap();
        run(dir.path(), "alice").await.unwrap();

        assert!(dir.path().join(PROFILE_FILE).exists());

        let profile = Profile::load(dir.path()).await.unwrap();
        assert_eq!(profile.name, "alice");
    }

    #[tokio::test]
    async fn init_fails_if_already_initialized() {
        let dir = tempdir().unwrap();

        // First init should succeed
        run(dir.path(), "alice").await.unwrap();

        // Second init should fail
        let result = run(dir.path(), "bob").await;
        assert!(result.is_err());

        let profile = Profile::load(dir.path()).await.unwrap();
        assert_eq!(profile.name, "alice");
    }

    #[tokio::test]
    async fn init_rejects_reserved_name() {
        let dir = tempdir().unwrap();
        let result = run(dir.path(), "SYSTEM").await;
        assert!(result.is_err());
        assert!(!dir.path().join(PROFILE_FILE).exists());
    }
}
