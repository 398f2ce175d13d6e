//! Anti-forgery state token generation
//!
//! The state parameter is sent with the authorization request and echoed back
//! in the callback; comparing the two correlates the callback with the flow
//! that initiated it (CSRF protection).

use rand::{thread_rng, Rng};

/// Length of the generated state token.
const STATE_LEN: usize = 32;

/// Generate a random state string for CSRF protection.
///
/// Creates a 32-character random string using URL-safe characters
/// (A-Z, a-z, 0-9). A fresh token is generated per authorization session and
/// never reused; the callback handler compares the echoed value by exact
/// match. Cannot fail: the thread RNG is a non-blocking entropy source.
pub fn generate_state() -> String {
    let mut rng = thread_rng();
    (0..STATE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..62);
            match idx {
                0..=25 => (b'A' + idx) as char,
                26..=51 => (b'a' + (idx - 26)) as char,
                _ => (b'0' + (idx - 52)) as char,
            }
        })
        .collect()
}
