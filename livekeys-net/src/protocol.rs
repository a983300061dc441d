//! Wire protocol for the presence channel.

use serde::{Deserialize, Serialize};

use livekeys_types::{ConnectionId, PresencePatch, RosterEntry, UserInfo};

use crate::auth::SessionGrant;

/// Messages sent from client to server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientMessage {
    /// Ask the server's authorization endpoint for a session in `room`.
    Authorize { room: String },
    /// Join a room with a token obtained from `Authorize`.
    Hello {
        room: String,
        token: String,
        client_name: String,
    },
    /// Merge fields into this connection's presence.
    UpdatePresence(PresencePatch),
    /// Leave the room.
    Goodbye,
    Ping,
}

/// Messages sent from server to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerMessage {
    /// Session granted by the authorization endpoint.
    Authorized(SessionGrant),
    /// The server has no secret configured; nobody can join.
    SetupRequired,
    /// Handshake complete.
    Welcome {
        connection_id: ConnectionId,
        info: UserInfo,
        /// Everyone else already in the room, in join order.
        roster: Vec<RosterEntry>,
    },
    /// Presence of everyone in the room except the recipient, in join order.
    Roster { others: Vec<RosterEntry> },
    /// Authorization or join refused.
    Rejected { reason: String },
    Pong,
    /// Server is shutting down.
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_json_shape() {
        let msg = ClientMessage::Hello {
            room: "piano-room".into(),
            token: "t".into(),
            client_name: "laptop".into(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.starts_with(r#"{"Hello":{"room":"piano-room""#));
        let back: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn unit_variants_are_strings() {
        assert_eq!(serde_json::to_string(&ServerMessage::Pong).unwrap(), r#""Pong""#);
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#""Goodbye""#).unwrap(),
            ClientMessage::Goodbye
        );
    }
}
