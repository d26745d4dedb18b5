//! Show profile and network settings.

use anyhow::Result;
use chat_client::SessionConfig;
use std::path::Path;

use crate::config::Profile;

/// Run the status command.
pub async fn run(data_dir: &Path, config: &SessionConfig) -> Result<()> {
    println!("=== lanchat status ===");
    println!();

    match Profile::load(data_dir).await {
        Ok(profile) => {
            println!("Profile:");
            println!("  Name: {}", profile.name);
            println!("  Init: {}", format_timestamp(profile.created_at));
        }
        Err(_) => {
            println!("Profile: NOT INITIALIZED");
            println!();
            println!("Run 'lanchat init --name <name>' to initialize,");
            println!("or pass --name to 'lanchat chat'.");
        }
    }

    println!();
    println!("Network:");
    println!("  Group:     {}:{}", config.group, config.port);
    println!("  Interface: {}", config.interface);
    println!("  TTL:       {}", config.ttl);
    println!("  Loopback:  {}", if config.loopback { "on" } else { "off" });
    println!();
    println!("Presence:");
    println!("  Resync:    {}", describe_interval(config.resync_interval_secs));
    println!("  Expiry:    {}", describe_expiry(config));
    println!("  Leave:     {} ms grace", config.leave_grace_ms);

    Ok(())
}

fn describe_interval(secs: u64) -> String {
    if secs == 0 {
        "off".to_string()
    } else {
        format!("every {}s", secs)
    }
}

fn describe_expiry(config: &SessionConfig) -> String {
    if config.member_ttl_ticks == 0 || config.resync_interval_secs == 0 {
        "off".to_string()
    } else {
        format!(
            "after {} missed resyncs (~{}s)",
            config.member_ttl_ticks,
            u64::from(config.member_ttl_ticks)
                .saturating_add(1)
                .saturating_mul(config.resync_interval_secs)
        )
    }
}

/// Format a Unix timestamp as a human-readable string.
fn format_timestamp(ts: u64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let diff = now.saturating_sub(ts);

    if diff < 60 {
        "just now".to_string()
    } else if diff < 3600 {
        format!("{} minutes ago", diff / 60)
    } else if diff < 86400 {
        format!("{} hours ago", diff / 3600)
    } else {
        format!("{} days ago", diff / 86400)
    }
}
