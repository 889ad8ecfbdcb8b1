//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by the room/queue wire protocol and changing
//! them would break compatibility with connected clients.

// ─────────────────────────────────────────────────────────────────────────────
// Room Lifecycle
// ─────────────────────────────────────────────────────────────────────────────

/// Room lifetime from creation (seconds). Clients poll the TTL endpoint and
/// are expected to self-terminate once it reaches zero.
pub const ROOM_TTL_SECS: u64 = 3600;

/// Window after a room expires during which its captured files remain
/// downloadable (seconds).
pub const ROOM_COOLDOWN_SECS: u64 = 6 * 3600;

/// Interval between registry sweeps that expire rooms and purge cooldowns.
pub const REGISTRY_SWEEP_INTERVAL_SECS: u64 = 30;

/// Number of letters in a room code (`AAA` of `AAA123`).
pub const ROOM_CODE_LETTERS: usize = 3;

/// Number of digits in a room code (`123` of `AAA123`).
pub const ROOM_CODE_DIGITS: usize = 3;

/// Upper bound on code-generation retries before giving up on a collision.
pub const ROOM_CODE_MAX_ATTEMPTS: usize = 64;

// ─────────────────────────────────────────────────────────────────────────────
// Client Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Length of the random lowercase suffix appended to a username to form a
/// client key (`"{username}-{5 lowercase letters}"`).
pub const CLIENT_KEY_SUFFIX_LEN: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Application Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Application name used in logs and health responses.
pub const APP_NAME: &str = "Classroom PTT";

/// Service identifier used for health checks.
pub const SERVICE_ID: &str = "classroom-ptt";

/// Name of the README included in every storage download if one isn't
/// already present among the captured files.
pub const DOWNLOAD_README_NAME: &str = "README.txt";
