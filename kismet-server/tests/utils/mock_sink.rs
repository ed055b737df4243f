use async_trait::async_trait;
use kismet_core::{ServerEnvelope, SessionId};
use kismet_server::ClientSink;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// One delivery captured by the mock sink.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkRecord {
    Direct {
        session: SessionId,
        envelope: ServerEnvelope,
    },
    Broadcast {
        envelope: ServerEnvelope,
    },
}

/// Mock ClientSink that captures all outgoing envelopes.
#[derive(Clone)]
pub struct MockClientSink {
    /// Channel to stream captured deliveries.
    tx: mpsc::UnboundedSender<SinkRecord>,
    /// All captured deliveries (for verification).
    records: Arc<Mutex<Vec<SinkRecord>>>,
}

impl MockClientSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkRecord>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = Self {
            tx,
            records: Arc::new(Mutex::new(Vec::new())),
        };
        (sink, rx)
    }

    /// All envelopes delivered directly to a specific session.
    pub async fn sent_to(&self, session: &SessionId) -> Vec<ServerEnvelope> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Direct {
                    session: id,
                    envelope,
                } if id == session => Some(envelope.clone()),
                _ => None,
            })
            .collect()
    }

    /// All broadcast envelopes, in delivery order.
    pub async fn broadcasts(&self) -> Vec<ServerEnvelope> {
        self.records
            .lock()
            .await
            .iter()
            .filter_map(|r| match r {
                SinkRecord::Broadcast { envelope } => Some(envelope.clone()),
                _ => None,
            })
            .collect()
    }

    /// Count of `peer_disconnected` envelopes delivered to a session.
    pub async fn peer_disconnected_count(&self, session: &SessionId) -> usize {
        self.sent_to(session)
            .await
            .iter()
            .filter(|e| matches!(e, ServerEnvelope::PeerDisconnected {}))
            .count()
    }

    async fn record(&self, record: SinkRecord) {
        self.records.lock().await.push(record.clone());
        let _ = self.tx.send(record);
    }
}

#[async_trait]
impl ClientSink for MockClientSink {
    async fn send(&self, session: SessionId, envelope: ServerEnvelope) {
        tracing::debug!("[MockSink] send to {session}: {envelope:?}");
        self.record(SinkRecord::Direct { session, envelope }).await;
    }

    async fn broadcast(&self, envelope: ServerEnvelope) {
        tracing::debug!("[MockSink] broadcast: {envelope:?}");
        self.record(SinkRecord::Broadcast { envelope }).await;
    }
}
