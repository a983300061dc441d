//! Presence server mode and joining a room as a client.

use std::time::Duration;

use livekeys_core::{Config, OfflineChannel, PresenceChannel, SessionStatus};
use livekeys_net::{Authorizer, ConnectError, PresenceClient, PresenceServer};
use livekeys_types::ConnectionId;

const SERVER_POLL_INTERVAL: Duration = Duration::from_millis(5);

pub fn run_server(config: &Config, listen_addr: Option<&str>) -> std::io::Result<()> {
    let addr = listen_addr
        .map(str::to_string)
        .unwrap_or_else(|| config.listen_addr());
    log::info!("Starting livekeys presence server on {}", addr);

    let authorizer = Authorizer::from_secret(config.auth_secret());
    if !authorizer.is_configured() {
        eprintln!(
            "warning: no authorization secret; set {} or [auth] secret. Joins will report setup required.",
            livekeys_net::auth::SECRET_ENV_VAR
        );
    }

    let mut server = PresenceServer::bind(&addr, authorizer)?;
    println!("livekeys server listening on {}", server.local_addr()?);

    let mut last_participants = 0usize;
    loop {
        server.accept_connections();
        server.poll();

        let participants = server.participant_count();
        if participants != last_participants {
            log::info!(
                "{} participant(s) in {} room(s)",
                participants,
                server.room_count()
            );
            last_participants = participants;
        }

        std::thread::sleep(SERVER_POLL_INTERVAL);
    }
}

/// Join `room` on `addr`. Failures degrade to an offline session; a server
/// without a secret yields `SetupRequired`.
pub fn join(addr: &str, room: &str, client_name: &str) -> (Box<dyn PresenceChannel>, SessionStatus) {
    match PresenceClient::connect(addr, room, client_name) {
        Ok(client) => (Box::new(client), SessionStatus::Connected),
        Err(ConnectError::SetupRequired) => {
            log::warn!("Server at {} has no authorization secret", addr);
            (offline(), SessionStatus::SetupRequired)
        }
        Err(e) => {
            log::error!("Cannot join {} on {}: {}", room, addr, e);
            (offline(), SessionStatus::Offline)
        }
    }
}

pub fn offline() -> Box<dyn PresenceChannel> {
    Box::new(OfflineChannel::new(ConnectionId::new(0)))
}
