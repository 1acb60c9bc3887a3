//! Realtime change feed: clients subscribe to conversations over a WebSocket
//! and receive the change events the API publishes through the `Dispatcher`.

pub mod connection;
pub mod dispatcher;
