#[cfg(not(any(target_os = "macos", unix)))]
compile_error!("Only macos and unix are currently supported");

use courier::{Config, Courier, find_config_file};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = find_config_file()?;
    let config = Config::load(&config_path)?;

    Courier::new(config).run().await
}
