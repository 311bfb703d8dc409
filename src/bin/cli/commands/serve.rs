use anyhow::{Context, Result};

use codestudy_lib::server::start_server;

use crate::app::App;

pub fn run(app: App) -> Result<()> {
    let runtime = app.runtime()?;
    runtime
        .block_on(start_server(app.config))
        .context("Server stopped with an error")
}
