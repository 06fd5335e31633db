use crate::cli::Commands;
use anyhow::Result;
use ntpfleet_core::{LeapIndicator, ServerParams, SubnetBase};
use ntpfleet_netns::{Fleet, Iproute2};
use std::sync::Arc;

pub mod batch;
pub mod cleanup;
pub mod create;
pub mod delete;
pub mod list;
pub mod logs;

/// Dispatch command to appropriate handler
pub async fn dispatch(command: Commands) -> Result<()> {
    match command {
        Commands::Create {
            instance,
            subnet,
            offset,
            stratum,
            leap,
        } => create::execute(instance, &subnet, offset, stratum, leap).await,

        Commands::Batch {
            start,
            end,
            subnet,
            offset,
            stratum,
            leap,
        } => batch::execute(start, end, &subnet, offset, stratum, leap).await,

        Commands::Delete { instance } => delete::execute(instance).await,

        Commands::Logs { instance } => logs::execute(instance).await,

        Commands::List => list::execute().await,

        Commands::Cleanup => cleanup::execute().await,
    }
}

/// Fleet over the production ip(8) backend
pub(crate) fn fleet() -> Fleet {
    Fleet::new(Arc::new(Iproute2::new()))
}

/// Validate raw flag values into the immutable per-invocation parameters
pub(crate) fn server_params(
    subnet: &str,
    offset: i64,
    stratum: u8,
    leap: u8,
) -> Result<ServerParams> {
    let subnet = SubnetBase::new(subnet)?;
    let leap = LeapIndicator::try_from(leap)?;

    Ok(ServerParams {
        subnet,
        offset,
        stratum,
        leap,
    })
}
