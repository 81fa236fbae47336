//! Stdin/stdout bridge: a dedicated blocking thread reads line-delimited
//! JSON requests off stdin and forwards them over a channel, so the
//! dispatcher never blocks on synchronous stdio reads.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::warn;

use super::protocol::Request;

/// Spawn the stdin reader thread. Returns the receiving end; the channel
/// closes (and `recv()` returns `None`) on stdin EOF.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Request> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!("stdin read error: {e}");
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Request>(&line) {
                Ok(req) => {
                    if tx.send(req).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("malformed JSON-RPC line, dropping: {e}"),
            }
        }
    });
    rx
}

/// Write one response line to stdout, flushing immediately so the
/// caller observes it without buffering delay.
pub fn write_line(value: &serde_json::Value) {
    let mut stdout = io::stdout().lock();
    if let Ok(mut line) = serde_json::to_string(value) {
        line.push('\n');
        let _ = stdout.write_all(line.as_bytes());
        let _ = stdout.flush();
    }
}
