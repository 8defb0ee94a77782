//! Newline-delimited JSON-RPC over stdin/stdout

use std::io::{self, BufRead};

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::mcp::rpc::{json_rpc_error, PARSE_ERROR};
use crate::mcp::server::handle_payload;
use crate::AppState;

const STDIN_LINE_BUFFER: usize = 64;

/// Serves until the reader reaches end of input.
pub async fn serve<R, W>(state: &AppState, reader: R, mut writer: W) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        answer_line(state, &line, &mut writer).await?;
    }

    info!("stdin closed, stopping stdio transport");
    Ok(())
}

/// Serves lines from a reader channel until every sender is gone.
pub async fn serve_lines<W>(
    state: &AppState,
    mut lines: mpsc::Receiver<io::Result<String>>,
    mut writer: W,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(line) = lines.recv().await {
        answer_line(state, &line?, &mut writer).await?;
    }

    info!("stdin closed, stopping stdio transport");
    Ok(())
}

/// Reads stdin on a detached OS thread.
///
/// A blocking read on stdin cannot be cancelled, so it must not live on the runtime's
/// blocking pool: the runtime would wait for it on shutdown.
pub fn spawn_stdin_reader() -> mpsc::Receiver<io::Result<String>> {
    let (tx, rx) = mpsc::channel(STDIN_LINE_BUFFER);

    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let failed = line.is_err();
            if tx.blocking_send(line).is_err() || failed {
                break;
            }
        }
    });

    rx
}

async fn answer_line<W>(state: &AppState, line: &str, writer: &mut W) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let line = line.trim();
    if line.is_empty() {
        return Ok(());
    }

    let response = match serde_json::from_str::<Value>(line) {
        Ok(payload) => handle_payload(state, payload).await,
        Err(err) => {
            debug!(error = %err, "discarding unparseable stdio line");
            Some(json_rpc_error(None, PARSE_ERROR, "Parse error"))
        }
    };

    if let Some(response) = response {
        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
        writer.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::test_support::TestHarness;

    #[tokio::test]
    async fn serve_lines_answers_until_senders_are_dropped() {
        let harness = TestHarness::open().await;
        let (tx, rx) = mpsc::channel(4);
        tx.send(Ok(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#.to_string()))
            .await
            .expect("send line");
        drop(tx);

        let mut output = Vec::new();
        serve_lines(&harness.state, rx, &mut output)
            .await
            .expect("serve lines");

        let response: Value = serde_json::from_slice(&output).expect("json line");
        assert_eq!(response["id"], json!(7));
        assert_eq!(response["result"], json!({}));
    }

    #[tokio::test]
    async fn serve_lines_stops_on_read_error() {
        let harness = TestHarness::open().await;
        let (tx, rx) = mpsc::channel(4);
        tx.send(Err(io::Error::new(io::ErrorKind::InvalidData, "not utf-8")))
            .await
            .expect("send error");

        let error = serve_lines(&harness.state, rx, tokio::io::sink())
            .await
            .expect_err("read error surfaces");
        assert_eq!(error.kind(), io::ErrorKind::InvalidData);
    }
}
