//! Authorization endpoint: grants a random identity for a room.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use livekeys_types::UserInfo;

/// Environment variable holding the authorization secret.
pub const SECRET_ENV_VAR: &str = "LIVEKEYS_SECRET_KEY";

pub const COLORS: [&str; 10] = [
    "#f87171", "#fb923c", "#facc15", "#5fda15", "#4ade80", "#34ead2", "#22d3ee", "#60a5fa",
    "#c084fc", "#ff7dc0",
];

pub const NAMES: [&str; 8] = [
    "Charlie Layne",
    "Mislav Abha",
    "Tatum Paolo",
    "Anjali Wanda",
    "Jody Hekla",
    "Emil Joyce",
    "Jory Quispe",
    "Quinn Elton",
];

const AVATAR_COUNT: u32 = 10;
const USER_ID_LEN: usize = 6;
const ROOM_ID_LEN: usize = 21;

/// Unredeemed tokens are dropped after this long.
pub const TOKEN_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthError {
    /// No secret configured. Surfaced as "setup required"; never retried.
    NotConfigured,
    /// Token unknown or issued for another room.
    InvalidToken,
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::NotConfigured => write!(f, "authorization secret not configured"),
            AuthError::InvalidToken => write!(f, "invalid session token"),
        }
    }
}

impl std::error::Error for AuthError {}

/// A session issued for one user in one room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionGrant {
    pub room: String,
    pub user_id: String,
    pub info: UserInfo,
    /// `room.user.nonce`
    pub token: String,
}

/// Issues and verifies session tokens. Without a secret every request is
/// refused with [`AuthError::NotConfigured`].
pub struct Authorizer {
    secret: Option<String>,
    issued: HashMap<String, (SessionGrant, Instant)>,
    ttl: Duration,
}

impl Authorizer {
    pub fn from_secret(secret: Option<String>) -> Self {
        let secret = secret.filter(|s| !s.trim().is_empty());
        Self {
            secret,
            issued: HashMap::new(),
            ttl: TOKEN_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Grant a fresh random identity with full access to `room`.
    pub fn authorize(&mut self, room: &str) -> Result<SessionGrant, AuthError> {
        if self.secret.is_none() {
            return Err(AuthError::NotConfigured);
        }
        self.prune_expired(Instant::now());

        let mut rng = rand::thread_rng();
        let user_id = random_user_id(&mut rng);
        let info = UserInfo {
            name: NAMES.choose(&mut rng).copied().unwrap_or(NAMES[0]).to_string(),
            color: COLORS.choose(&mut rng).copied().unwrap_or(COLORS[0]).to_string(),
            picture: format!("/assets/avatars/{}.png", rng.gen_range(0..AVATAR_COUNT)),
        };
        let token = format!("{}.{}.{:032x}", room, user_id, rng.gen::<u128>());

        let grant = SessionGrant {
            room: room.to_string(),
            user_id,
            info,
            token: token.clone(),
        };
        self.issued.insert(token, (grant.clone(), Instant::now()));
        log::info!(
            target: "net::auth",
            "Authorized {} ({}) for room {}",
            grant.user_id,
            grant.info.name,
            room
        );
        Ok(grant)
    }

    /// Redeem `token`, which must have been issued for `room` and not have
    /// expired. A token is good for one join; a wrong-room attempt leaves it
    /// redeemable.
    pub fn verify(&mut self, room: &str, token: &str) -> Result<SessionGrant, AuthError> {
        if self.secret.is_none() {
            return Err(AuthError::NotConfigured);
        }
        self.prune_expired(Instant::now());
        match self.issued.get(token) {
            Some((grant, _)) if grant.room == room => {}
            _ => return Err(AuthError::InvalidToken),
        }
        self.issued
            .remove(token)
            .map(|(grant, _)| grant)
            .ok_or(AuthError::InvalidToken)
    }

    fn prune_expired(&mut self, now: Instant) {
        let ttl = self.ttl;
        let before = self.issued.len();
        self.issued
            .retain(|_, (_, issued_at)| now.duration_since(*issued_at) < ttl);
        let dropped = before - self.issued.len();
        if dropped > 0 {
            log::debug!(target: "net::auth", "Dropped {} expired tokens", dropped);
        }
    }

    /// Tokens issued but not yet redeemed.
    pub fn outstanding(&self) -> usize {
        self.issued.len()
    }
}

fn random_user_id<R: Rng>(rng: &mut R) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(USER_ID_LEN)
        .map(|b| (b as char).to_ascii_lowercase())
        .collect()
}

/// Random room id used when none is supplied: 21 lowercase hex digits.
pub fn random_room_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ROOM_ID_LEN)
        .map(|_| {
            let digit = rng.gen_range(0..16u32);
            std::char::from_digit(digit, 16).unwrap_or('0')
        })
        .collect()
}
