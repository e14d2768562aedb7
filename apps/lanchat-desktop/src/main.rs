mod bridge;
mod config;
mod console;
mod logging;

use std::{
    error::Error,
    sync::{Arc, Mutex},
};

use bridge::{DesktopBridge, LineOutcome, UiUpdateCallback};
use config::DesktopConfig;
use console::ConsoleView;
use lanchat_core::SessionSnapshot;
use lanchat_gateway::JsonLinesGateway;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

fn main() -> Result<(), Box<dyn Error>> {
    logging::init();
    info!("starting lanchat-desktop");

    let config = match DesktopConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "invalid desktop configuration");
            return Err(err.into());
        }
    };
    info!(
        backend_addr = %config.backend_addr,
        poll_interval_ms = config.peer_poll_interval_ms,
        history_limit = config.history_limit,
        "desktop config loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("lanchat-desktop")
        .build()?;
    runtime.block_on(run(config))
}

async fn run(config: DesktopConfig) -> Result<(), Box<dyn Error>> {
    let gateway =
        match JsonLinesGateway::connect(config.backend_addr.as_str(), config.call_timeout()).await {
            Ok(gateway) => gateway,
            Err(err) => {
                error!(error = %err, addr = %config.backend_addr, "backend unreachable");
                return Err(err.into());
            }
        };

    let view = Mutex::new(ConsoleView::new());
    let ui_update: UiUpdateCallback = Arc::new(move |snapshot: SessionSnapshot| {
        let Ok(mut view) = view.lock() else {
            return;
        };
        for line in view.render(&snapshot) {
            println!("{line}");
        }
    });
    let bridge = DesktopBridge::spawn(Arc::new(gateway), config.runtime_config(), ui_update);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => match bridge.submit_line(&line) {
                    LineOutcome::Continue => {}
                    LineOutcome::Reply(text) => println!("{text}"),
                    LineOutcome::Quit => break,
                },
                Ok(None) => break,
                Err(err) => {
                    warn!(error = %err, "stdin read failed");
                    break;
                }
            },
        }
    }

    bridge.shutdown().await;
    info!("lanchat-desktop stopped");
    Ok(())
}
