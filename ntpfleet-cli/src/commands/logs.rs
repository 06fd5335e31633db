//! Logs command implementation

use anyhow::{Context, Result};
use ntpfleet_core::InstanceId;

pub async fn execute(instance: u32) -> Result<()> {
    let id = InstanceId::new(instance).context("Invalid instance id")?;

    let report = super::fleet().logs(id).await?;

    println!("\n📜 Instance {instance}");
    println!("{:-<60}", "");

    match report.pid {
        Some(pid) => {
            println!("Server pid: {pid}");
            if let Some(command) = &report.command {
                println!("Command:    {command}");
            }
        }
        None => println!("No server process attributed to the namespace"),
    }
    println!("Log file:   {}", report.instance.log_path.display());
    println!("{:-<60}", "");

    match report.log.as_deref() {
        Some("") => println!("(log file is empty)"),
        Some(content) => print!("{content}"),
        None => println!("(no log file yet)"),
    }

    Ok(())
}
