//! Session id generation.

use rand::RngCore;

/// Generate a session id: 16 random bytes, lowercase hex (32 characters).
///
/// Ids are the sole correlation key across otherwise-stateless HTTP
/// exchanges. Uniqueness is probabilistic; the session table still rejects
/// a colliding insert.
pub fn session_id() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
