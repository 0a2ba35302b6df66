mod error;
mod runner;
mod scenario;

use std::path::PathBuf;

use log::info;

use crate::error::SimError;
use crate::scenario::Scenario;

fn main() -> Result<(), SimError> {
    env_logger::init();

    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .ok_or(SimError::Usage)?;
    let scenario = Scenario::load(&path)?;
    info!(
        "running `{}`: {} frames at {:.4}s",
        scenario.name, scenario.frames, scenario.frame_dt
    );

    let summary = runner::run(&scenario)?;
    println!("{summary}");
    Ok(())
}
