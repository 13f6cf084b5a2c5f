mod cli;
mod config;
mod error;
mod logger;
mod shell;
mod spec;

use anyhow::Result;
use tracing::{error, info};

fn main() -> Result<()> {
    logger::init()?;
    info!(args = ?std::env::args().collect::<Vec<_>>(), "muxspec start");

    match cli::run() {
        Ok(result) => {
            info!("muxspec finished successfully");
            Ok(result)
        }
        Err(err) => {
            error!(error = ?err, "muxspec failed");
            Err(err)
        }
    }
}
