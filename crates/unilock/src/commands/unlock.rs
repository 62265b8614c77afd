//! Unlock command handler.

use std::time::Duration;

use tracing::debug;
use unilock_core::AccessHub;

use crate::cli::{GlobalOpts, UnlockArgs};
use crate::error::CliError;

pub async fn handle(hub: &AccessHub, args: UnlockArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let door = match (args.door_id, args.device) {
        (Some(door_id), _) => {
            hub.unlock_door(&door_id).await?;
            door_id
        }
        (None, Some(device_id)) => {
            let door_id =
                wait_for_door(hub, &device_id, Duration::from_secs(args.wait)).await?;
            hub.unlock_device(&device_id).await?;
            door_id
        }
        (None, None) => {
            return Err(CliError::Validation {
                field: "door".into(),
                reason: "give a door ID or --device".into(),
            });
        }
    };

    if !global.quiet {
        eprintln!("✓ Unlock sent for door '{door}'");
    }
    Ok(())
}

/// Discover devices, start the stream, and wait until the hub reports
/// which door `device_id` is mounted on.
async fn wait_for_door(
    hub: &AccessHub,
    device_id: &str,
    wait: Duration,
) -> Result<String, CliError> {
    hub.discover().await?;
    if hub.device(device_id).is_none() {
        return Err(CliError::NotFound {
            resource_type: "device".into(),
            identifier: device_id.into(),
            list_command: "devices".into(),
        });
    }

    hub.start();
    let mut devices = hub.watch_devices();
    debug!(device_id, wait_secs = wait.as_secs(), "waiting for door link");

    let linked = tokio::time::timeout(wait, async {
        loop {
            let door = devices
                .borrow_and_update()
                .iter()
                .find(|d| d.id == device_id)
                .and_then(|d| d.door_id.clone());
            if door.is_some() {
                return door;
            }
            if devices.changed().await.is_err() {
                return None;
            }
        }
    })
    .await
    .ok()
    .flatten();

    linked.ok_or_else(|| CliError::DoorNotLinked {
        device_id: device_id.into(),
    })
}
