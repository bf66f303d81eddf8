//! Print new and modified files under a path until interrupted.
//!
//! Usage: cargo run -p codex-poll-watcher --example watch_dir -- <path> [exclude...]

use codex_poll_watcher::{PollingWatcher, WatchConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: watch_dir <path> [exclude...]");
        std::process::exit(2);
    };

    let mut config = WatchConfig::new(path);
    for pattern in args {
        config = config.exclude(pattern);
    }

    let mut watcher = PollingWatcher::from_config(&config)?;
    watcher.on_new(|file| println!("new       {file}"));
    watcher.on_modified(|file| println!("modified  {file}"));

    let stop = watcher.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.cancel();
        }
    });

    watcher.watch().await?;
    Ok(())
}
