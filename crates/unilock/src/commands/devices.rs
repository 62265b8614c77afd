//! Device command handlers.

use std::sync::Arc;

use tabled::Tabled;
use unilock_core::{AccessHub, ContactState, DeviceRecord};

use crate::cli::{DevicesArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Lock")]
    lock: String,
    #[tabled(rename = "Door")]
    door: String,
    #[tabled(rename = "Door ID")]
    door_id: String,
}

impl DeviceRow {
    fn new(d: &Arc<DeviceRecord>, color: bool) -> Self {
        Self {
            id: d.id.clone(),
            name: d.name.clone(),
            kind: d.kind.to_string(),
            lock: output::lock_label(d.state.lock, color),
            door: output::contact_label(d.state.door, color),
            door_id: d.door_id.clone().unwrap_or_else(|| "-".into()),
        }
    }
}

fn detail(d: &Arc<DeviceRecord>, color: bool) -> String {
    let contact = |state: Option<ContactState>| output::contact_label(state, color);
    [
        format!("ID:        {}", d.id),
        format!("UUID:      {}", d.uuid),
        format!("Name:      {}", d.name),
        format!("Kind:      {}", d.kind),
        format!("Type:      {}", d.vendor_type),
        format!("Lock:      {}", output::lock_label(d.state.lock, color)),
        format!("Door:      {}", contact(d.state.door)),
        format!("Relay:     {}", contact(d.state.relay)),
        format!("REX:       {}", contact(d.state.request_to_exit)),
        format!("REN:       {}", contact(d.state.request_to_enter)),
        format!(
            "Door link: {}",
            match (&d.door_id, &d.door_name) {
                (Some(id), Some(name)) => format!("{name} ({id})"),
                (Some(id), None) => id.clone(),
                _ => "-".into(),
            }
        ),
    ]
    .join("\n")
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(
    hub: &AccessHub,
    args: DevicesArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    hub.discover().await?;
    let color = output::should_color(&global.color);

    let out = match args.id {
        None => {
            let snapshot = hub.devices_snapshot();
            output::render_list(&global.output, snapshot.as_slice(), |d| {
                DeviceRow::new(d, color)
            })?
        }
        Some(id) => {
            let device = hub.device(&id).ok_or_else(|| CliError::NotFound {
                resource_type: "device".into(),
                identifier: id,
                list_command: "devices".into(),
            })?;
            output::render_single(&global.output, &device, |d| detail(d, color))?
        }
    };

    output::print_output(&out, global.quiet);
    Ok(())
}
