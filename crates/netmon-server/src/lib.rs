//! # netmon-server
//!
//! Broadcasts network measurements to WebSocket clients.
//!
//! - [`websocket::registry::SessionRegistry`]: live connections, one lock
//! - [`websocket::broadcast::Broadcaster`]: fan-out that evicts failed clients
//! - [`pipeline::RequestPipeline`]: single-flight measurement worker
//! - [`trigger`]: coalescing trigger channel and the periodic trigger
//! - [`websocket::session`]: per-connection protocol driver
//! - [`server::NetmonServer`]: Axum router (`/ws`, `/health`, `/metrics`,
//!   static files) and worker wiring

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod health;
pub mod history;
pub mod metrics;
pub mod pipeline;
pub mod server;
pub mod shutdown;
pub mod trigger;
pub mod websocket;

pub use config::ServerConfig;
pub use error::ServerError;
pub use pipeline::{PipelineState, RequestPipeline, RunOutcome};
pub use server::NetmonServer;
pub use trigger::{TriggerOutcome, TriggerSender};
