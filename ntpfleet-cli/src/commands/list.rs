//! List command implementation

use anyhow::{Context, Result};

pub async fn execute() -> Result<()> {
    tracing::info!("Listing instances");

    let statuses = super::fleet()
        .list()
        .await
        .context("Failed to enumerate namespaces")?;

    println!("\n📋 NTP instances");
    println!("{:-<60}", "");

    if statuses.is_empty() {
        println!("No instances running");
        return Ok(());
    }

    for status in &statuses {
        match status.pid {
            Some(pid) => println!(
                "  {} - namespace {}, server pid {}",
                status.instance.id, status.instance.namespace, pid
            ),
            None => println!(
                "  {} - namespace {}, no server process",
                status.instance.id, status.instance.namespace
            ),
        }
    }

    println!("{:-<60}", "");
    println!("Total: {} instance(s)", statuses.len());

    Ok(())
}
