//! Line-oriented TCP front end.
//!
//! Each connection gets its own task. Every newline-terminated line is one
//! `<operation> <url>` request, and each reply is the rendered response
//! followed by a newline. Connections end on EOF.
//!
//! Lines longer than [`MAX_LINE_LEN`] or not valid UTF-8 are answered with
//! `400 Bad Request` and the connection stays open.

use crate::command::Response;
use crate::types::AppState;
use std::sync::Arc;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, info, warn};

/// Longest accepted request line, newline excluded.
pub const MAX_LINE_LEN: u64 = 8 * 1024;

/// Accepts connections forever, spawning one task per client.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        info!(%peer, "Client connected");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            match handle_connection(socket, state).await {
                Ok(handled) => info!(%peer, handled, "Client disconnected"),
                Err(e) => warn!(%peer, error = %e, "Connection failed"),
            }
        });
    }
}

/// Serves one client until EOF. Returns the number of requests handled.
pub async fn handle_connection(
    socket: TcpStream,
    state: Arc<AppState>,
) -> std::io::Result<usize> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    let mut handled = 0;

    loop {
        buf.clear();
        let read = (&mut reader)
            .take(MAX_LINE_LEN + 1)
            .read_until(b'\n', &mut buf)
            .await?;
        if read == 0 {
            break;
        }

        let mut reply = if buf.last() != Some(&b'\n') && read as u64 > MAX_LINE_LEN {
            discard_line(&mut reader).await?;
            debug!(limit = MAX_LINE_LEN, "Rejected overlong line");
            Response::BadRequest.to_string()
        } else {
            match String::from_utf8(std::mem::take(&mut buf)) {
                Ok(line) => {
                    let line = line.trim_end_matches(['\n', '\r']).to_string();
                    let state = Arc::clone(&state);
                    // The engine lock and its file writes are blocking.
                    tokio::task::spawn_blocking(move || {
                        let reply = state.engine.handle_line(&line);
                        debug!(request = %line.trim(), reply = %reply, "Handled line");
                        reply
                    })
                    .await
                    .map_err(std::io::Error::other)?
                }
                Err(e) => {
                    debug!(error = %e, "Rejected line that is not UTF-8");
                    Response::BadRequest.to_string()
                }
            }
        };

        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
        handled += 1;
    }

    writer.shutdown().await?;
    Ok(handled)
}

/// Skips input up to and including the next newline, or to EOF.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
    let mut chunk = Vec::new();
    loop {
        chunk.clear();
        let read = (&mut *reader)
            .take(MAX_LINE_LEN)
            .read_until(b'\n', &mut chunk)
            .await?;
        if read == 0 || chunk.last() == Some(&b'\n') {
            return Ok(());
        }
    }
}
