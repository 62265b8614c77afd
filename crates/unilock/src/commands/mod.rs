//! Command dispatch: bridges CLI args -> hub operations -> output formatting.

pub mod config_cmd;
pub mod devices;
pub mod doors;
pub mod unlock;
pub mod watch;

use unilock_core::AccessHub;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a hub-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, hub: &AccessHub, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Devices(args) => devices::handle(hub, args, global).await,
        Command::Doors => doors::handle(hub, global).await,
        Command::Unlock(args) => unlock::handle(hub, args, global).await,
        Command::Watch(args) => watch::handle(hub, args, global).await,
        // Config is handled before a hub is built
        Command::Config(_) => Err(CliError::Validation {
            field: "command".into(),
            reason: "config commands do not talk to a hub".into(),
        }),
    }
}
