//! General utilities shared across the application.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

use crate::protocol_constants::{CLIENT_KEY_SUFFIX_LEN, ROOM_CODE_DIGITS, ROOM_CODE_LETTERS};

// ─────────────────────────────────────────────────────────────────────────────
// Time Utilities
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the current Unix timestamp in milliseconds.
///
/// Returns 0 if the system clock is before the Unix epoch (shouldn't happen in practice).
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Room Codes
// ─────────────────────────────────────────────────────────────────────────────

/// Returns `true` if `code` matches `^[A-Z]{3}[0-9]{3}$`.
#[must_use]
pub fn is_valid_room_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != ROOM_CODE_LETTERS + ROOM_CODE_DIGITS {
        return false;
    }
    let (letters, digits) = bytes.split_at(ROOM_CODE_LETTERS);
    letters.iter().all(u8::is_ascii_uppercase) && digits.iter().all(u8::is_ascii_digit)
}

/// Draws a fresh random room code: 3 uppercase letters followed by 3 digits.
///
/// Does not check for collisions; callers are responsible for retrying
/// against the registry's live and cooldown caches.
#[must_use]
pub fn random_room_code() -> String {
    let mut rng = rand::thread_rng();
    let mut code = String::with_capacity(ROOM_CODE_LETTERS + ROOM_CODE_DIGITS);
    for _ in 0..ROOM_CODE_LETTERS {
        code.push(rng.gen_range(b'A'..=b'Z') as char);
    }
    for _ in 0..ROOM_CODE_DIGITS {
        code.push(rng.gen_range(b'0'..=b'9') as char);
    }
    code
}

// ─────────────────────────────────────────────────────────────────────────────
// Client Keys
// ─────────────────────────────────────────────────────────────────────────────

/// Builds a client key `"{username}-{5 lowercase letters}"`.
///
/// The random suffix disambiguates duplicate usernames within a room.
#[must_use]
pub fn make_client_key(username: &str) -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..CLIENT_KEY_SUFFIX_LEN)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect();
    format!("{username}-{suffix}")
}

/// Strips the `-xxxxx` disambiguation suffix from a client key, returning
/// the bare username for display. Returns the input unchanged if it is
/// too short to contain a suffix.
#[must_use]
pub fn strip_key_suffix(key: &str) -> &str {
    let suffix_len = CLIENT_KEY_SUFFIX_LEN + 1; // "-" + suffix
    if key.len() > suffix_len {
        &key[..key.len() - suffix_len]
    } else {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_room_code_accepted() {
        assert!(is_valid_room_code("ABC123"));
    }

    #[test]
    fn lowercase_letters_rejected() {
        assert!(!is_valid_room_code("abc123"));
    }

    #[test]
    fn wrong_length_rejected() {
        assert!(!is_valid_room_code("AB123"));
        assert!(!is_valid_room_code("ABCD123"));
    }

    #[test]
    fn digits_before_letters_rejected() {
        assert!(!is_valid_room_code("123ABC"));
    }

    #[test]
    fn random_room_code_is_well_formed() {
        for _ in 0..100 {
            assert!(is_valid_room_code(&random_room_code()));
        }
    }

    #[test]
    fn client_key_has_expected_shape() {
        let key = make_client_key("alice");
        assert!(key.starts_with("alice-"));
        let suffix = &key["alice-".len()..];
        assert_eq!(suffix.len(), CLIENT_KEY_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_lowercase()));
    }

    #[test]
    fn strip_key_suffix_removes_disambiguator() {
        assert_eq!(strip_key_suffix("alice-xyzab"), "alice");
        assert_eq!(strip_key_suffix("bob-12345"), "bob");
    }

    #[test]
    fn strip_key_suffix_leaves_short_input_untouched() {
        assert_eq!(strip_key_suffix("ab"), "ab");
    }
}
