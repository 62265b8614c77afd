//! Door listing.

use unilock_core::AccessHub;

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(hub: &AccessHub, global: &GlobalOpts) -> Result<(), CliError> {
    let doors = hub.list_doors().await?;
    // The payload is passed through as-is; tables fall back to pretty JSON.
    let compact = matches!(global.output, OutputFormat::JsonCompact);
    let out = output::render_json(&doors, compact)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
