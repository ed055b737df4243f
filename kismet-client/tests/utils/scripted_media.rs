use async_trait::async_trait;
use kismet_client::{MediaError, MediaEvent, MediaFactory, MediaSession};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Media stack double for end-to-end tests. Produces canned
/// descriptions tagged with the owner's name, trickles one local
/// candidate per session and reports the channel connected as soon as
/// the handshake lands. Every call is recorded in a shared log.
pub struct ScriptedMediaFactory {
    tag: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMediaFactory {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn log(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl MediaFactory for ScriptedMediaFactory {
    async fn create(
        &self,
        events: mpsc::Sender<MediaEvent>,
    ) -> Result<Box<dyn MediaSession>, MediaError> {
        self.log.lock().unwrap().push("create".to_string());

        // Like a real stack that starts gathering at session creation:
        // one candidate goes out immediately, possibly racing ahead of
        // the descriptions.
        let candidate = json!({"candidate": format!("cand-{}", self.tag)});
        let _ = events.send(MediaEvent::LocalCandidate(candidate)).await;

        Ok(Box::new(ScriptedMediaSession {
            tag: self.tag.clone(),
            log: Arc::clone(&self.log),
            events,
        }))
    }
}

struct ScriptedMediaSession {
    tag: String,
    log: Arc<Mutex<Vec<String>>>,
    events: mpsc::Sender<MediaEvent>,
}

impl ScriptedMediaSession {
    fn record(&self, entry: impl Into<String>) {
        self.log.lock().unwrap().push(entry.into());
    }
}

#[async_trait]
impl MediaSession for ScriptedMediaSession {
    async fn create_offer(&mut self) -> Result<Value, MediaError> {
        self.record("create_offer");
        Ok(json!({"type": "offer", "sdp": format!("offer-{}", self.tag)}))
    }

    async fn accept_offer(&mut self, offer: Value) -> Result<Value, MediaError> {
        self.record(format!(
            "accept_offer:{}",
            offer["sdp"].as_str().unwrap_or("?")
        ));
        let _ = self.events.send(MediaEvent::ChannelConnected).await;
        Ok(json!({"type": "answer", "sdp": format!("answer-{}", self.tag)}))
    }

    async fn accept_answer(&mut self, answer: Value) -> Result<(), MediaError> {
        self.record(format!(
            "accept_answer:{}",
            answer["sdp"].as_str().unwrap_or("?")
        ));
        let _ = self.events.send(MediaEvent::ChannelConnected).await;
        Ok(())
    }

    async fn add_remote_candidate(&mut self, candidate: Value) -> Result<(), MediaError> {
        self.record(format!(
            "add_candidate:{}",
            candidate["candidate"].as_str().unwrap_or("?")
        ));
        Ok(())
    }

    async fn close(&mut self) {
        self.record("close");
    }
}
