mod avatar;
mod chat;
mod config;
mod errors;
mod icons;
mod logging;
mod security;
mod server;


use crate::avatar::AllowedRoots;
use crate::config::Config;
use anyhow::Context;
use std::path::PathBuf;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path = PathBuf::from("chatpanel.toml");
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                if i >= args.len() { eprintln!("--config requires a path"); std::process::exit(2); }
                config_path = PathBuf::from(&args[i]);
            }
            other => {
                eprintln!("unknown argument: {other}");
                std::process::exit(2);
            }
        }
        i += 1;
    }

    let cfg = Config::load(&config_path).with_context(|| format!("loading config {}", config_path.display()))?;
    cfg.validate().context("validating config")?;

    let roots = AllowedRoots::shared().context("resolving avatar roots")?;

    info!(addr = %cfg.listen_addr(), base_path = %cfg.server.base_path, roots = ?roots.as_slice(), "chatpanel ready");
    println!("chatpanel ready addr={} base_path={}", cfg.listen_addr(), cfg.server.base_path);

    server::serve(cfg, roots).await
}
