mod client_sink;
mod signaling_service;
mod ws_handler;

pub use client_sink::ClientSink;
pub use signaling_service::SignalingService;
pub use ws_handler::ws_handler;
