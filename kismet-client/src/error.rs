use crate::media::MediaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("transport failure: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("media negotiation failure: {0}")]
    Media(#[from] MediaError),

    #[error("not connected to the signaling server")]
    NotConnected,

    #[error("gave up reconnecting after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("connection manager task is gone")]
    ManagerGone,
}
