//! Render command - print every declared resource in install order

use std::path::Path;

use crate::display;
use crate::error::Result;
use crate::inputs;

pub fn run(
    environment: &str,
    config: Option<&Path>,
    bootstrap: Option<&Path>,
    show_secrets: bool,
) -> Result<()> {
    let stack = inputs::load_stack(environment, config, bootstrap)?;
    let order = stack.graph.install_order()?;

    if show_secrets {
        tracing::warn!("rendering Secret data in clear text");
    }

    print!("{}", display::yaml_documents(order, show_secrets)?);
    Ok(())
}
