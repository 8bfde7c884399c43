use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, warn};

use crate::scheduler::Scheduler;

/// Requests other parts of the tool send to the running watcher,
/// one JSON object per line: `{"type":"REFRESH_BADGE"}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    RefreshBadge,
    ConfigUpdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub success: bool,
}

impl Message {
    pub fn to_line(self) -> String {
        serde_json::json!(self).to_string()
    }
}

pub async fn handle(scheduler: &mut Scheduler, message: Message) -> Response {
    debug!(?message, "message received");
    match message {
        Message::RefreshBadge => scheduler.refresh_now(),
        Message::ConfigUpdated => scheduler.on_config_changed().await,
    }
    Response { success: true }
}

/// Answer messages from `reader` until it closes.
pub async fn serve<R, W>(scheduler: &mut Scheduler, reader: R, mut writer: W) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<Message>(line) {
            Ok(message) => handle(scheduler, message).await,
            Err(e) => {
                warn!(error = %e, %line, "unrecognized message");
                Response { success: false }
            }
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        writer.write_all(out.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
