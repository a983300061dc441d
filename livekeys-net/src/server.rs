//! Presence server: rooms of participants broadcasting their presence.
//!
//! Accepts client connections, hosts the authorization endpoint, merges
//! presence patches and broadcasts each room's roster after every change.

use std::collections::{BTreeMap, HashMap};
use std::io::{self, BufReader, BufWriter};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use log::{error, info, warn};

use livekeys_types::{ConnectionId, Presence, PresencePatch, RosterEntry, UserInfo};

use crate::auth::{AuthError, Authorizer};
use crate::framing::{read_message, write_message};
use crate::protocol::{ClientMessage, ServerMessage};

/// A participant that completed the Hello handshake.
struct Participant {
    client_name: String,
    room: String,
    info: UserInfo,
    /// `None` until the first presence update.
    presence: Option<Presence>,
    writer: BufWriter<TcpStream>,
}

impl Participant {
    fn send(&mut self, msg: &ServerMessage) -> io::Result<()> {
        write_message(&mut self.writer, msg)
    }
}

/// A connection that has not joined a room yet.
struct PendingConnection {
    writer: BufWriter<TcpStream>,
}

pub struct PresenceServer {
    listener: TcpListener,
    authorizer: Authorizer,
    participants: HashMap<ConnectionId, Participant>,
    pending: HashMap<ConnectionId, PendingConnection>,
    /// Room id → members in join order.
    rooms: BTreeMap<String, Vec<ConnectionId>>,
    message_rx: Receiver<(ConnectionId, ClientMessage)>,
    message_tx: Sender<(ConnectionId, ClientMessage)>,
    next_connection_id: u64,
}

impl PresenceServer {
    /// Bind the server to an address.
    pub fn bind(addr: &str, authorizer: Authorizer) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;

        let (message_tx, message_rx) = mpsc::channel();

        info!(target: "net::server", "PresenceServer listening on {}", listener.local_addr()?);
        if !authorizer.is_configured() {
            warn!(target: "net::server", "No authorization secret configured; joins will be refused");
        }

        Ok(Self {
            listener,
            authorizer,
            participants: HashMap::new(),
            pending: HashMap::new(),
            rooms: BTreeMap::new(),
            message_rx,
            message_tx,
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept any pending TCP connections (they join a room after Hello).
    pub fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    let connection_id = ConnectionId::new(self.next_connection_id);
                    self.next_connection_id += 1;

                    if let Err(e) = stream.set_nonblocking(false) {
                        error!(target: "net::server", "Failed to configure stream: {}", e);
                        continue;
                    }
                    let read_stream = match stream.try_clone() {
                        Ok(s) => s,
                        Err(e) => {
                            error!(target: "net::server", "Failed to clone stream: {}", e);
                            continue;
                        }
                    };

                    let message_tx = self.message_tx.clone();
                    thread::spawn(move || {
                        connection_reader_thread(connection_id, read_stream, message_tx);
                    });

                    self.pending.insert(
                        connection_id,
                        PendingConnection {
                            writer: BufWriter::new(stream),
                        },
                    );
                    info!(target: "net::server", "Connection {} from {}, awaiting Hello", connection_id, addr);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(target: "net::server", "Accept error: {}", e);
                    break;
                }
            }
        }
    }

    /// Handle queued client messages. Returns the number handled.
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Ok((connection_id, msg)) = self.message_rx.try_recv() {
            handled += 1;
            match msg {
                ClientMessage::Authorize { room } => self.handle_authorize(connection_id, &room),
                ClientMessage::Hello {
                    room,
                    token,
                    client_name,
                } => self.handle_hello(connection_id, room, &token, client_name),
                ClientMessage::UpdatePresence(patch) => self.handle_update(connection_id, patch),
                ClientMessage::Goodbye => self.remove_connection(connection_id),
                ClientMessage::Ping => {
                    if let Err(e) = self.send_to(connection_id, &ServerMessage::Pong) {
                        warn!(target: "net::server", "Failed to send pong to {}: {}", connection_id, e);
                    }
                }
            }
        }
        handled
    }

    fn handle_authorize(&mut self, connection_id: ConnectionId, room: &str) {
        let reply = match self.authorizer.authorize(room) {
            Ok(grant) => ServerMessage::Authorized(grant),
            Err(AuthError::NotConfigured) => ServerMessage::SetupRequired,
            Err(e) => ServerMessage::Rejected {
                reason: e.to_string(),
            },
        };
        if let Err(e) = self.send_to(connection_id, &reply) {
            warn!(target: "net::server", "Failed to answer authorize from {}: {}", connection_id, e);
        }
    }

    fn handle_hello(
        &mut self,
        connection_id: ConnectionId,
        room: String,
        token: &str,
        client_name: String,
    ) {
        let Some(mut pending) = self.pending.remove(&connection_id) else {
            warn!(target: "net::server", "Connection {} sent Hello after joining", connection_id);
            return;
        };

        let info = match self.authorizer.verify(&room, token) {
            Ok(grant) => grant.info,
            Err(e) => {
                warn!(target: "net::server", "Connection {} refused: {}", connection_id, e);
                let reply = match e {
                    AuthError::NotConfigured => ServerMessage::SetupRequired,
                    AuthError::InvalidToken => ServerMessage::Rejected {
                        reason: e.to_string(),
                    },
                };
                let _ = write_message(&mut pending.writer, &reply);
                return;
            }
        };

        let welcome = ServerMessage::Welcome {
            connection_id,
            info: info.clone(),
            roster: self.roster_for(&room, connection_id),
        };
        if let Err(e) = write_message(&mut pending.writer, &welcome) {
            error!(target: "net::server", "Failed to send welcome to {}: {}", connection_id, e);
            return;
        }

        info!(
            target: "net::server",
            "Connection {} '{}' joined room {} as {}",
            connection_id,
            client_name,
            room,
            info.name
        );
        self.rooms
            .entry(room.clone())
            .or_default()
            .push(connection_id);
        self.participants.insert(
            connection_id,
            Participant {
                client_name,
                room: room.clone(),
                info,
                presence: None,
                writer: pending.writer,
            },
        );
        self.broadcast_roster(&room);
    }

    fn handle_update(&mut self, connection_id: ConnectionId, patch: PresencePatch) {
        let Some(participant) = self.participants.get_mut(&connection_id) else {
            warn!(target: "net::server", "Presence from {} before Hello ignored", connection_id);
            return;
        };
        participant
            .presence
            .get_or_insert_with(Presence::default)
            .apply(patch);
        let room = participant.room.clone();
        self.broadcast_roster(&room);
    }

    fn send_to(&mut self, connection_id: ConnectionId, msg: &ServerMessage) -> io::Result<()> {
        if let Some(participant) = self.participants.get_mut(&connection_id) {
            participant.send(msg)
        } else if let Some(pending) = self.pending.get_mut(&connection_id) {
            write_message(&mut pending.writer, msg)
        } else {
            Ok(())
        }
    }

    /// Drop a connection and tell its room.
    fn remove_connection(&mut self, connection_id: ConnectionId) {
        self.pending.remove(&connection_id);
        let Some(participant) = self.participants.remove(&connection_id) else {
            return;
        };
        if let Some(members) = self.rooms.get_mut(&participant.room) {
            members.retain(|&id| id != connection_id);
            if members.is_empty() {
                self.rooms.remove(&participant.room);
            }
        }
        info!(
            target: "net::server",
            "Connection {} '{}' left room {}",
            connection_id,
            participant.client_name,
            participant.room
        );
        self.broadcast_roster(&participant.room);
    }

    /// Everyone in `room` except `exclude`, in join order.
    fn roster_for(&self, room: &str, exclude: ConnectionId) -> Vec<RosterEntry> {
        let Some(members) = self.rooms.get(room) else {
            return Vec::new();
        };
        members
            .iter()
            .filter(|&&id| id != exclude)
            .filter_map(|id| {
                self.participants.get(id).map(|p| RosterEntry {
                    connection_id: *id,
                    info: p.info.clone(),
                    presence: p.presence.clone(),
                })
            })
            .collect()
    }

    /// Send each member of `room` the roster of the others.
    fn broadcast_roster(&mut self, room: &str) {
        let members = self.rooms.get(room).cloned().unwrap_or_default();
        let mut disconnected = Vec::new();

        for id in members {
            let msg = ServerMessage::Roster {
                others: self.roster_for(room, id),
            };
            if let Some(participant) = self.participants.get_mut(&id) {
                if let Err(e) = participant.send(&msg) {
                    warn!(target: "net::server", "Failed to send to {}: {}", id, e);
                    disconnected.push(id);
                }
            }
        }

        for id in disconnected {
            self.remove_connection(id);
        }
    }

    /// Broadcast a shutdown message to every connection.
    pub fn broadcast_shutdown(&mut self) {
        for (id, participant) in &mut self.participants {
            if let Err(e) = participant.send(&ServerMessage::Shutdown) {
                warn!(target: "net::server", "Failed to send shutdown to {}: {}", id, e);
            }
        }
        for pending in self.pending.values_mut() {
            let _ = write_message(&mut pending.writer, &ServerMessage::Shutdown);
        }
    }

    /// Number of connections that joined a room.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Presence of every member of `room`, in join order.
    pub fn room_roster(&self, room: &str) -> Vec<RosterEntry> {
        self.roster_for(room, ConnectionId::new(0))
    }
}

/// Background thread that reads messages from a connection and forwards them.
fn connection_reader_thread(
    connection_id: ConnectionId,
    stream: TcpStream,
    message_tx: Sender<(ConnectionId, ClientMessage)>,
) {
    let mut reader = BufReader::new(stream);

    loop {
        match read_message::<_, ClientMessage>(&mut reader) {
            Ok(msg) => {
                let is_goodbye = matches!(msg, ClientMessage::Goodbye);
                if message_tx.send((connection_id, msg)).is_err() {
                    break;
                }
                if is_goodbye {
                    break;
                }
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::UnexpectedEof {
                    warn!(target: "net::server", "Connection {} read error: {}", connection_id, e);
                }
                // Implicit goodbye on disconnect
                let _ = message_tx.send((connection_id, ClientMessage::Goodbye));
                break;
            }
        }
    }

    info!(target: "net::server", "Connection {} reader thread exiting", connection_id);
}
