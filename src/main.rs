use clap::Parser;
use std::time::Duration;

fn main() -> anyhow::Result<()> {
    let cfg = cardgate::config::Config::parse();
    if cfg.list_users {
        return cardgate::list_users(cfg);
    }
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(cardgate::run(cfg));
    // A door cycle or an open name dialog may still hold a blocking thread.
    runtime.shutdown_timeout(Duration::from_secs(2));
    result
}
