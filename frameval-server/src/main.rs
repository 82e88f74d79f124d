//! frameval Server
//!
//! JSON-RPC server that evaluates compiled debugger expressions against frame
//! snapshots. Communicates via stdin/stdout, one JSON message per line.

use std::io;
use std::sync::Arc;

use anyhow::Result;
use frameval_core::eval::EvalConfig;
use frameval_core::protocol::RpcMessage;
use frameval_core::{Request, Response};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdout};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

mod handler;

use handler::{Dispatch, Handler};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging to stderr (stdout is for JSON-RPC)
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    info!("frameval-server starting...");

    let config = load_config();
    debug!("Evaluation limits: {:?}", config);

    let stdout = Arc::new(Mutex::new(tokio::io::stdout()));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handler = Handler::new(config);

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        debug!("Received: {}", line);

        let msg = match serde_json::from_str::<RpcMessage<Request>>(&line) {
            Ok(msg) => msg,
            Err(e) => {
                let response = RpcMessage::new(0, Response::error(format!("Parse error: {}", e)));
                send(&stdout, &response).await?;
                continue;
            }
        };
        let id = msg.id.unwrap_or(0);

        match handler.handle(id, msg.content) {
            Dispatch::Immediate(response) => send(&stdout, &RpcMessage::new(id, response)).await?,
            Dispatch::Deferred(task) => {
                let stdout = Arc::clone(&stdout);
                tokio::spawn(async move {
                    let response = match task.await {
                        Ok(response) => response,
                        Err(e) => Response::error(format!("Evaluation task failed: {}", e)),
                    };
                    if let Err(e) = send(&stdout, &RpcMessage::new(id, response)).await {
                        error!("Failed to send response {}: {}", id, e);
                    }
                });
            }
            Dispatch::Shutdown(response) => {
                send(&stdout, &RpcMessage::new(id, response)).await?;
                break;
            }
        }
    }

    info!("frameval-server shutting down");
    Ok(())
}

async fn send(stdout: &Mutex<Stdout>, message: &RpcMessage<Response>) -> Result<()> {
    let mut json = serde_json::to_string(message)?;
    debug!("Sending: {}", json);
    json.push('\n');

    let mut out = stdout.lock().await;
    out.write_all(json.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Evaluation limits, overridable through `FRAMEVAL_MAX_STEPS` and
/// `FRAMEVAL_MAX_STACK`
fn load_config() -> EvalConfig {
    let mut config = EvalConfig::default();
    if let Some(steps) = env_limit("FRAMEVAL_MAX_STEPS") {
        config.max_steps = steps;
    }
    if let Some(depth) = env_limit("FRAMEVAL_MAX_STACK") {
        config.max_stack_depth = depth;
    }
    config
}

fn env_limit(name: &str) -> Option<usize> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(limit) => Some(limit),
        Err(e) => {
            warn!("Ignoring {}={:?}: {}", name, raw, e);
            None
        }
    }
}
