use std::path::Path;

use sandbox_renderer::config::SandboxConfig;
use sandbox_renderer::sandbox;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // usage: sandbox-renderer [config.json]
    let config = match std::env::args().nth(1) {
        Some(path) => SandboxConfig::load(Path::new(&path))?,
        None => {
            log::info!("no config given, using defaults");
            SandboxConfig::default()
        }
    };

    sandbox::run(&config)?;
    Ok(())
}
