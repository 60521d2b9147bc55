// vigia-api: Async client for the vigia alert server (REST pull API + push channel)

pub mod client;
pub mod error;
pub mod models;
pub mod protocol;
pub mod transport;
pub mod websocket;

pub use client::AlertClient;
pub use error::Error;
pub use models::{ActionRequest, ActionResponse, AlertPage, AlertPayload, RawId, RawTimestamp};
pub use protocol::{OutboundMessage, PushMessage};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{ChannelEvent, ConnectionManager, ConnectionState, ReconnectConfig};
