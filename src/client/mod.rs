//! Client side of the gateway API
//!
//! - [`GatewayClient`]: typed calls to every gateway route
//! - [`CallbackServer`]: the push-notification endpoints a subscribed client exposes

pub mod callback;
pub mod gateway;

pub use callback::{CallbackServer, Notification};
pub use gateway::GatewayClient;
