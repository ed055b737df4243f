use crate::backoff::ReconnectPolicy;
use kismet_core::IceServerConfig;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint of the signaling server.
    pub server_url: String,
    /// STUN/TURN servers handed to the peer connection.
    pub ice_servers: Vec<IceServerConfig>,
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: "ws://127.0.0.1:3001/ws".to_string(),
            ice_servers: IceServerConfig::default_stun(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}
