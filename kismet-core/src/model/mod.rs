mod chat;
mod envelope;
mod ice;
mod room;
mod session;

pub use chat::{ChatMode, PairRole};
pub use envelope::{ClientEnvelope, ServerEnvelope};
pub use ice::IceServerConfig;
pub use room::RoomId;
pub use session::SessionId;
