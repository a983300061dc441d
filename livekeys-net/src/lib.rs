//! Presence channel for livekeys sessions.
//!
//! A TCP server hosting rooms of participants, the authorization endpoint
//! that admits them, and the client that publishes local presence and
//! receives everyone else's.

pub mod auth;
pub mod client;
pub mod framing;
pub mod protocol;
pub mod server;

pub use auth::{random_room_id, AuthError, Authorizer, SessionGrant};
pub use client::{ConnectError, PresenceClient};
pub use protocol::{ClientMessage, ServerMessage};
pub use server::PresenceServer;
