//! WebSocket connection management, session handling, and broadcasting.

pub mod broadcast;
pub mod connection;
pub mod registry;
pub mod session;
