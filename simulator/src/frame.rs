use anyhow::Result;
use contracts::WsEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Writes one event as a single JSON line
pub async fn write_frame<W>(out: &mut W, event: &WsEvent) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');
    out.write_all(&line).await?;
    Ok(())
}
