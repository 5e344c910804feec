//! Client transport: wire codec, outbound sink and WebSocket adapter

pub mod handlers;
pub mod messages;
pub mod publisher;
pub mod websocket;

pub use handlers::{EventHandler, MockEventHandler};
pub use messages::{decode_client_event, encode_server_event, MAX_FRAME_BYTES};
pub use publisher::{ChannelEventSink, EventSink, MockEventSink};
pub use websocket::{WebSocketServer, WebSocketServerConfig, WebSocketState};
