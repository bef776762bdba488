//! `talkgate ping`: UDP ping every configured server.

use std::time::Duration;

use talkgate_core::{MumbleTransport, VoiceTransport};

use crate::cli::{GlobalOpts, PingArgs};
use crate::error::CliError;

pub async fn handle(args: &PingArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let (cfg, _) = super::load(global)?;
    let gateway = talkgate_config::to_gateway_config(&cfg, global.account.as_deref())?;

    let timeout = args
        .timeout_ms
        .map_or(gateway.timings.ping_timeout, Duration::from_millis);
    let transport = MumbleTransport::new(gateway.timings.connect_timeout, timeout);

    let width = gateway
        .accounts
        .iter()
        .map(|a| a.name.len())
        .max()
        .unwrap_or(0);
    for account in &gateway.accounts {
        match transport.ping(&account.address).await {
            Ok(reply) => println!(
                "{:<width$}  {}  v{}  {}/{} users  {} kbit/s  {}ms",
                account.name,
                account.address,
                reply.version_string(),
                reply.users,
                reply.max_users,
                reply.max_bandwidth / 1000,
                reply.round_trip.as_millis(),
            ),
            Err(e) => println!("{:<width$}  {}  unreachable: {e}", account.name, account.address),
        }
    }
    Ok(())
}
