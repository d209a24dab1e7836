use anyhow::Result;
use aula_gate::cli::{actions, actions::Action, start};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse arguments and initialize logging/telemetry
    let action = start()?;

    // Handle the action
    match action {
        Action::Server { .. } => actions::server::handle(action).await?,
    }

    Ok(())
}
