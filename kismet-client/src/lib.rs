pub mod backoff;
pub mod config;
pub mod error;
pub mod event;
pub mod manager;
pub mod media;
pub mod negotiation;

pub use backoff::ReconnectPolicy;
pub use config::ClientConfig;
pub use error::ClientError;
pub use event::{ClientEvent, ConnectionState};
pub use manager::ChatClient;
pub use media::{MediaError, MediaEvent, MediaFactory, MediaSession, RtcMediaFactory};
pub use negotiation::{Negotiation, NegotiationPhase};
