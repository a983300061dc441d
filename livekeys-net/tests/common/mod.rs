#![allow(dead_code)]
//! Test harness utilities for livekeys-net integration tests.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use livekeys_net::auth::{Authorizer, SessionGrant};
use livekeys_net::framing::{read_message, write_message};
use livekeys_net::protocol::{ClientMessage, ServerMessage};
use livekeys_net::server::PresenceServer;
use livekeys_types::{ConnectionId, RosterEntry, UserInfo};

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub fn bind_server(secret: Option<&str>) -> (PresenceServer, String) {
    let server = PresenceServer::bind(
        "127.0.0.1:0",
        Authorizer::from_secret(secret.map(str::to_string)),
    )
    .unwrap();
    let addr = server.local_addr().unwrap().to_string();
    (server, addr)
}

/// Drive the server (accept + poll) until `done` holds, or panic on timeout.
pub fn drive_until<F: Fn(&PresenceServer) -> bool>(
    server: &mut PresenceServer,
    timeout: Duration,
    done: F,
) {
    let start = Instant::now();
    while start.elapsed() < timeout {
        server.accept_connections();
        server.poll();
        if done(server) {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out driving server");
}

/// Drive the server until the expected participant count is reached.
pub fn drive_until_participants(server: &mut PresenceServer, expected: usize) {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        server.accept_connections();
        server.poll();
        if server.participant_count() == expected {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!(
        "Timed out waiting for {} participants (have {})",
        expected,
        server.participant_count()
    );
}

/// Drive the server until it has handled `count` client messages.
pub fn drive_until_handled(server: &mut PresenceServer, count: usize) {
    let start = Instant::now();
    let mut handled = 0;
    while start.elapsed() < TIMEOUT {
        server.accept_connections();
        handled += server.poll();
        if handled >= count {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out: server handled {} of {} messages", handled, count);
}

/// Drive the server for a fixed duration, handling whatever arrives.
pub fn drive_for(server: &mut PresenceServer, duration: Duration) {
    let start = Instant::now();
    while start.elapsed() < duration {
        server.accept_connections();
        server.poll();
        std::thread::sleep(Duration::from_millis(5));
    }
}

/// A raw TCP client for protocol-level tests.
///
/// Tests are single-threaded, so every request is split: send, drive the
/// server, then `recv` the reply.
pub struct RawClient {
    pub reader: BufReader<TcpStream>,
    pub writer: BufWriter<TcpStream>,
}

impl RawClient {
    pub fn connect(addr: &str) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(Duration::from_secs(5)))?;
        let read_stream = stream.try_clone()?;
        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn send(&mut self, msg: &ClientMessage) -> std::io::Result<()> {
        write_message(&mut self.writer, msg)
    }

    pub fn recv(&mut self) -> std::io::Result<ServerMessage> {
        read_message(&mut self.reader)
    }

    /// Receive until a roster arrives.
    pub fn recv_roster(&mut self) -> Vec<RosterEntry> {
        loop {
            match self.recv().unwrap() {
                ServerMessage::Roster { others } => return others,
                ServerMessage::Pong => continue,
                other => panic!("Expected Roster, got {:?}", other),
            }
        }
    }
}

/// A participant joined through the raw protocol.
pub struct Joined {
    pub client: RawClient,
    pub grant: SessionGrant,
    pub connection_id: ConnectionId,
    pub info: UserInfo,
    pub welcome_roster: Vec<RosterEntry>,
}

/// Authorize and join `room`, driving the server in between. Consumes the
/// roster broadcast that follows the join.
pub fn join(server: &mut PresenceServer, addr: &str, room: &str, name: &str) -> Joined {
    let expected = server.participant_count() + 1;
    let mut client = RawClient::connect(addr).unwrap();
    client
        .send(&ClientMessage::Authorize {
            room: room.to_string(),
        })
        .unwrap();
    drive_until_handled(server, 1);
    let grant = match client.recv().unwrap() {
        ServerMessage::Authorized(grant) => grant,
        other => panic!("Expected Authorized, got {:?}", other),
    };

    client
        .send(&ClientMessage::Hello {
            room: room.to_string(),
            token: grant.token.clone(),
            client_name: name.to_string(),
        })
        .unwrap();
    drive_until_participants(server, expected);

    let (connection_id, info, welcome_roster) = match client.recv().unwrap() {
        ServerMessage::Welcome {
            connection_id,
            info,
            roster,
        } => (connection_id, info, roster),
        other => panic!("Expected Welcome, got {:?}", other),
    };
    client.recv_roster();

    Joined {
        client,
        grant,
        connection_id,
        info,
        welcome_roster,
    }
}

/// A server driven on its own thread, for blocking client APIs.
pub struct BackgroundServer {
    pub addr: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<PresenceServer>>,
}

impl BackgroundServer {
    pub fn start(secret: Option<&str>) -> Self {
        let (mut server, addr) = bind_server(secret);
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                server.accept_connections();
                server.poll();
                std::thread::sleep(Duration::from_millis(2));
            }
            server
        });
        Self {
            addr,
            stop,
            handle: Some(handle),
        }
    }

    /// Stop driving and hand back the server.
    pub fn stop(mut self) -> PresenceServer {
        self.stop.store(true, Ordering::SeqCst);
        self.handle.take().unwrap().join().unwrap()
    }
}

impl Drop for BackgroundServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Poll a client until a roster satisfying `pred` arrives.
pub fn wait_for_roster<F: Fn(&[RosterEntry]) -> bool>(
    client: &mut livekeys_net::PresenceClient,
    pred: F,
) -> Vec<RosterEntry> {
    let start = Instant::now();
    while start.elapsed() < TIMEOUT {
        if let Some(roster) = client.poll_roster() {
            if pred(&roster) {
                return roster;
            }
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("Timed out waiting for roster");
}
