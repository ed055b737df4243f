mod command;
mod dispatcher;
mod registry;

pub use command::RegistryCommand;
pub use dispatcher::Dispatcher;
pub use registry::{Registry, RegistryError, RegistryStats, RoomPair, SearchOutcome, Session};
