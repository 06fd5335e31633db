//! Create command implementation

use anyhow::{Context, Result};
use ntpfleet_core::{Error, InstanceId};

pub async fn execute(instance: u32, subnet: &str, offset: i64, stratum: u8, leap: u8) -> Result<()> {
    let id = InstanceId::new(instance).context("Invalid instance id")?;
    let params = super::server_params(subnet, offset, stratum, leap)?;

    tracing::info!(id = instance, %params, "Creating instance");

    let report = match super::fleet().create(id, &params).await {
        Ok(report) => report,
        Err(Error::ProcessStartFailure { namespace, log }) => {
            if log.is_empty() {
                eprintln!("(no server log was captured)");
            } else {
                eprintln!("Captured server log:");
                eprintln!("{log}");
            }
            anyhow::bail!(
                "Server process failed to start in namespace '{namespace}'; \
                 run 'ntpfleet delete -i {instance}' to reclaim its resources"
            );
        }
        Err(e) => return Err(e.into()),
    };

    println!("\n✅ Instance {} created", report.instance.id);
    println!("   Namespace: {}", report.instance.namespace);
    println!("   Address:   {}", report.address);
    println!("   Server:    pid {} ({})", report.pid, params);
    println!("   Log:       {}", report.instance.log_path.display());

    Ok(())
}
