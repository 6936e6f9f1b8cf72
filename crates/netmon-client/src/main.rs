//! # netmon-client
//!
//! Terminal client: prints every notification from a netmon server and
//! requests a measurement for each line typed on stdin.

#![deny(unsafe_code)]

mod render;

use anyhow::{Context, Result};
use clap::Parser;
use futures::{SinkExt, StreamExt};
use netmon_logging::LoggingConfig;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::warn;

/// Message sent to request a measurement. The server ignores the content.
const TRIGGER_MESSAGE: &str = "Start-CLI";

/// netmon terminal client.
#[derive(Parser, Debug)]
#[command(name = "netmon-client", version, about = "netmon terminal client")]
struct Cli {
    /// Host name or IP address of the netmon server.
    #[arg(long, default_value = "localhost")]
    ip: String,

    /// TCP port of the netmon server.
    #[arg(long, default_value = "8080")]
    port: u16,
}

impl Cli {
    fn url(&self) -> String {
        format!("ws://{}:{}/ws", self.ip, self.port)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _ = netmon_logging::init_logging(&LoggingConfig {
        level: "warn".into(),
        json: false,
    });

    let url = cli.url();
    println!("Connecting to {url}");
    let (ws, _) = connect_async(url.as_str())
        .await
        .with_context(|| format!("Failed to connect to {url}"))?;
    let (mut ws_tx, mut ws_rx) = ws.split();

    let mut receiver = tokio::spawn(async move {
        while let Some(frame) = ws_rx.next().await {
            match frame {
                Ok(Message::Text(text)) => match render::render_frame(&text) {
                    Ok(out) => println!("{out}"),
                    Err(e) => warn!(error = %e, "malformed notification skipped"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "connection error");
                    break;
                }
            }
        }
        println!("Connection closed.");
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Received interrupt. Quitting...");
                let close = CloseFrame {
                    code: CloseCode::Normal,
                    reason: "".into(),
                };
                if let Err(e) = ws_tx.send(Message::Close(Some(close))).await {
                    warn!(error = %e, "failed to send close frame");
                }
                break;
            }
            _ = &mut receiver => break,
            line = lines.next_line() => match line.context("Failed to read stdin")? {
                Some(_) => {
                    println!("CLI: Requesting test.");
                    ws_tx
                        .send(Message::text(TRIGGER_MESSAGE))
                        .await
                        .context("Failed to send request")?;
                }
                None => break,
            },
        }
    }

    receiver.abort();
    Ok(())
}
