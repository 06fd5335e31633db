//! Cleanup command implementation

use anyhow::{Context, Result};

pub async fn execute() -> Result<()> {
    tracing::info!("Cleaning up all instances");

    let report = super::fleet()
        .cleanup()
        .await
        .context("Failed to enumerate namespaces")?;

    println!("\n🧹 Cleanup complete");
    println!("   Instances removed:  {}", report.instances_removed);
    println!(
        "   Bridge removed:     {}",
        if report.bridge_removed { "yes" } else { "was not present" }
    );
    println!("   Stale dirs swept:   {}", report.directories_removed);

    Ok(())
}
