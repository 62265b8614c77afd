//! Live state streaming.

use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use unilock_core::{AccessHub, FieldChange, StateChange};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(hub: &AccessHub, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    // Subscribe before anything can publish.
    let mut changes = hub.subscribe();
    let mut connection = hub.connection_state();

    hub.start();
    let added = hub.discover().await?;
    if !global.quiet {
        eprintln!("Watching {added} devices. Press Ctrl-C to stop.");
    }

    let color = output::should_color(&global.color);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            Ok(()) = connection.changed() => {
                let state = *connection.borrow_and_update();
                if !global.quiet {
                    eprintln!("stream {state}");
                }
            }
            change = changes.recv() => match change {
                Ok(StateChange::Snapshot(_)) if !args.snapshots => {}
                Ok(change) => {
                    let line = match global.output {
                        OutputFormat::Table => describe(&change, color),
                        OutputFormat::Json | OutputFormat::JsonCompact => {
                            output::render_json(&change, true)?
                        }
                    };
                    output::print_output(&line, global.quiet);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "output fell behind, changes dropped");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    Ok(())
}

/// One human-readable line per change.
fn describe(change: &StateChange, color: bool) -> String {
    match change {
        StateChange::Registered(d) => format!("+ {} {} ({})", d.id, d.name, d.kind),
        StateChange::Field { device_id, change } => {
            let value = match change {
                FieldChange::Lock(state) => output::lock_label(Some(*state), color),
                FieldChange::DoorContact(state)
                | FieldChange::RequestToExit(state)
                | FieldChange::RequestToEnter(state)
                | FieldChange::Relay(state) => {
                    output::contact_label(Some(*state), color)
                }
            };
            format!("{device_id} {} -> {value}", change.field())
        }
        StateChange::DoorLinked {
            device_id,
            door_id,
            door_name,
        } => match (door_id, door_name) {
            (Some(id), Some(name)) => format!("{device_id} door {name} ({id})"),
            (Some(id), None) => format!("{device_id} door {id}"),
            _ => format!("{device_id} door unlinked"),
        },
        StateChange::Snapshot(d) => format!(
            "= {} lock={} door={}",
            d.id,
            output::lock_label(d.state.lock, color),
            output::contact_label(d.state.door, color)
        ),
        StateChange::Removed { device_id } => format!("- {device_id}"),
    }
}

#[cfg(test)]
mod tests {
    use unilock_core::{ContactState, LockState};

    use super::*;

    #[test]
    fn field_changes_read_naturally() {
        let line = describe(
            &StateChange::Field {
                device_id: "hub-1".into(),
                change: FieldChange::Lock(LockState::Unlocked),
            },
            false,
        );
        assert_eq!(line, "hub-1 lock -> unlocked");

        let line = describe(
            &StateChange::Field {
                device_id: "reader-1".into(),
                change: FieldChange::DoorContact(ContactState::Open),
            },
            false,
        );
        assert_eq!(line, "reader-1 door -> open");
    }

    #[test]
    fn door_links_name_the_door() {
        let line = describe(
            &StateChange::DoorLinked {
                device_id: "hub-1".into(),
                door_id: Some("door-9".into()),
                door_name: Some("Front".into()),
            },
            false,
        );
        assert_eq!(line, "hub-1 door Front (door-9)");
    }
}
