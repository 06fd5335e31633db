//! Batch command implementation

use anyhow::Result;

pub async fn execute(
    start: u32,
    end: u32,
    subnet: &str,
    offset: i64,
    stratum: u8,
    leap: u8,
) -> Result<()> {
    let params = super::server_params(subnet, offset, stratum, leap)?;

    tracing::info!(start, end, %params, "Creating batch");

    let report = super::fleet().batch(start, end, &params).await;

    println!("\n📦 Batch {start}..={end} complete");
    println!("   Succeeded: {}", report.succeeded);
    println!("   Failed:    {}", report.failed);

    // Partial failure is still a completed batch; the tally above is the
    // report and the exit stays 0
    Ok(())
}
