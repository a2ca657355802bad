pub mod client_view;
pub mod protocol;
pub mod sink;
pub mod wire;

/// Stable session identity of a connected client
pub type ClientId = uuid::Uuid;
