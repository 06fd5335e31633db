//! Delete command implementation

use anyhow::{Context, Result};
use ntpfleet_core::InstanceId;

pub async fn execute(instance: u32) -> Result<()> {
    let id = InstanceId::new(instance).context("Invalid instance id")?;

    super::fleet().delete(id).await;

    println!("✅ Instance {instance} deleted");

    Ok(())
}
