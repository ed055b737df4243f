pub mod model;

pub use model::{
    ChatMode, ClientEnvelope, IceServerConfig, PairRole, RoomId, ServerEnvelope, SessionId,
};
