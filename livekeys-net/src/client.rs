//! Presence channel client.
//!
//! Connects to a presence server, completes authorization and the Hello
//! handshake, then receives roster updates on a background thread.

use std::fmt;
use std::io::{self, BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use log::{error, info, warn};

use livekeys_types::{ConnectionId, PresencePatch, RosterEntry, UserInfo};

use crate::auth::SessionGrant;
use crate::framing::{read_message, write_message};
use crate::protocol::{ClientMessage, ServerMessage};

/// Why joining a room failed.
#[derive(Debug)]
pub enum ConnectError {
    Io(io::Error),
    /// The server has no authorization secret.
    SetupRequired,
    Rejected(String),
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectError::Io(e) => write!(f, "connection failed: {}", e),
            ConnectError::SetupRequired => write!(f, "server setup required"),
            ConnectError::Rejected(reason) => write!(f, "rejected: {}", reason),
        }
    }
}

impl std::error::Error for ConnectError {}

impl From<io::Error> for ConnectError {
    fn from(e: io::Error) -> Self {
        ConnectError::Io(e)
    }
}

/// Messages received from the server via background thread.
enum ServerUpdate {
    Roster(Vec<RosterEntry>),
    Shutdown,
    Error(String),
}

pub struct PresenceClient {
    writer: BufWriter<TcpStream>,
    update_rx: Receiver<ServerUpdate>,
    connection_id: ConnectionId,
    info: UserInfo,
    /// Newest roster not yet handed out by `poll_roster`.
    latest_roster: Option<Vec<RosterEntry>>,
    server_shutdown: bool,
}

impl PresenceClient {
    /// Connect, ask the server's authorization endpoint for a session in
    /// `room`, and join it.
    pub fn connect(addr: &str, room: &str, client_name: &str) -> Result<Self, ConnectError> {
        info!(target: "net::client", "Connecting to {} for room {}", addr, room);

        let stream = TcpStream::connect(addr)?;
        let mut writer = BufWriter::new(stream.try_clone()?);
        let mut reader = BufReader::new(stream.try_clone()?);

        write_message(
            &mut writer,
            &ClientMessage::Authorize {
                room: room.to_string(),
            },
        )?;
        let grant = match read_message::<_, ServerMessage>(&mut reader)? {
            ServerMessage::Authorized(grant) => grant,
            ServerMessage::SetupRequired => return Err(ConnectError::SetupRequired),
            ServerMessage::Rejected { reason } => return Err(ConnectError::Rejected(reason)),
            _ => {
                return Err(ConnectError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "expected Authorized message",
                )))
            }
        };

        Self::handshake(stream, writer, reader, &grant, client_name)
    }

    fn handshake(
        stream: TcpStream,
        mut writer: BufWriter<TcpStream>,
        mut reader: BufReader<TcpStream>,
        grant: &SessionGrant,
        client_name: &str,
    ) -> Result<Self, ConnectError> {
        write_message(
            &mut writer,
            &ClientMessage::Hello {
                room: grant.room.clone(),
                token: grant.token.clone(),
                client_name: client_name.to_string(),
            },
        )?;

        let (connection_id, info, roster) = match read_message::<_, ServerMessage>(&mut reader)? {
            ServerMessage::Welcome {
                connection_id,
                info,
                roster,
            } => (connection_id, info, roster),
            ServerMessage::SetupRequired => return Err(ConnectError::SetupRequired),
            ServerMessage::Rejected { reason } => return Err(ConnectError::Rejected(reason)),
            _ => {
                return Err(ConnectError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "expected Welcome message",
                )))
            }
        };

        info!(
            target: "net::client",
            "Joined room {} as connection {} ({}), {} others present",
            grant.room,
            connection_id,
            info.name,
            roster.len()
        );

        // The handshake reader may hold buffered bytes, so it moves to the
        // background thread rather than a fresh clone of the stream.
        drop(stream);
        let (update_tx, update_rx) = mpsc::channel();
        thread::spawn(move || {
            server_reader_thread(reader, update_tx);
        });

        Ok(Self {
            writer,
            update_rx,
            connection_id,
            info,
            latest_roster: Some(roster),
            server_shutdown: false,
        })
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Identity assigned by the authorization endpoint.
    pub fn info(&self) -> &UserInfo {
        &self.info
    }

    pub fn server_shutdown(&self) -> bool {
        self.server_shutdown
    }

    /// Publish a partial update of this participant's presence.
    pub fn update_local_state(&mut self, patch: PresencePatch) -> io::Result<()> {
        write_message(&mut self.writer, &ClientMessage::UpdatePresence(patch))
    }

    /// Drain server updates. Returns the newest roster if it changed since
    /// the last call.
    pub fn poll_roster(&mut self) -> Option<Vec<RosterEntry>> {
        loop {
            match self.update_rx.try_recv() {
                Ok(ServerUpdate::Roster(others)) => self.latest_roster = Some(others),
                Ok(ServerUpdate::Shutdown) => {
                    info!(target: "net::client", "Server shutdown received");
                    self.server_shutdown = true;
                }
                Ok(ServerUpdate::Error(msg)) => {
                    warn!(target: "net::client", "Server error: {}", msg);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.server_shutdown {
                        warn!(target: "net::client", "Server connection lost");
                        self.server_shutdown = true;
                    }
                    break;
                }
            }
        }
        self.latest_roster.take()
    }

    /// Send goodbye and disconnect.
    pub fn disconnect(mut self) -> io::Result<()> {
        write_message(&mut self.writer, &ClientMessage::Goodbye)
    }
}

/// Background thread that reads messages from the server.
fn server_reader_thread(mut reader: BufReader<TcpStream>, update_tx: mpsc::Sender<ServerUpdate>) {
    loop {
        let update = match read_message::<_, ServerMessage>(&mut reader) {
            Ok(ServerMessage::Roster { others }) => ServerUpdate::Roster(others),
            Ok(ServerMessage::Welcome { roster, .. }) => ServerUpdate::Roster(roster),
            Ok(ServerMessage::Pong) => continue,
            Ok(ServerMessage::Rejected { reason }) => ServerUpdate::Error(reason),
            Ok(ServerMessage::Authorized(_)) | Ok(ServerMessage::SetupRequired) => continue,
            Ok(ServerMessage::Shutdown) => {
                let _ = update_tx.send(ServerUpdate::Shutdown);
                break;
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    error!(target: "net::client", "Server read error: {}", e);
                }
                let _ = update_tx.send(ServerUpdate::Shutdown);
                break;
            }
        };
        if update_tx.send(update).is_err() {
            break;
        }
    }

    info!(target: "net::client", "Server reader thread exiting");
}
