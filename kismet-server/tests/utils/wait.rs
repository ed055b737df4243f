use crate::utils::SinkRecord;
use anyhow::{Result, bail};
use kismet_core::{ServerEnvelope, SessionId};
use tokio::sync::mpsc;

/// Timeout for a single expected delivery (ms).
pub const WAIT_TIMEOUT_MS: u64 = 2000;

/// Wait for the next envelope delivered directly to `session`, skipping
/// broadcasts and deliveries to other sessions.
pub async fn next_direct_for(
    rx: &mut mpsc::UnboundedReceiver<SinkRecord>,
    session: SessionId,
) -> Result<ServerEnvelope> {
    loop {
        let recv = tokio::time::timeout(
            std::time::Duration::from_millis(WAIT_TIMEOUT_MS),
            rx.recv(),
        );
        match recv.await {
            Ok(Some(SinkRecord::Direct {
                session: id,
                envelope,
            })) if id == session => return Ok(envelope),
            Ok(Some(_)) => continue,
            Ok(None) => bail!("sink channel closed"),
            Err(_) => bail!("timeout waiting for delivery to {session}"),
        }
    }
}

/// Wait for the next broadcast envelope.
pub async fn next_broadcast(
    rx: &mut mpsc::UnboundedReceiver<SinkRecord>,
) -> Result<ServerEnvelope> {
    loop {
        let recv = tokio::time::timeout(
            std::time::Duration::from_millis(WAIT_TIMEOUT_MS),
            rx.recv(),
        );
        match recv.await {
            Ok(Some(SinkRecord::Broadcast { envelope })) => return Ok(envelope),
            Ok(Some(_)) => continue,
            Ok(None) => bail!("sink channel closed"),
            Err(_) => bail!("timeout waiting for broadcast"),
        }
    }
}

/// Let the dispatcher drain everything already queued. Used before
/// asserting that something was *not* sent.
pub async fn quiesce() {
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
}
