use sha2::{Digest, Sha256};
use warp::{Filter, Rejection};

use crate::warp_helpers::UnauthorizedError;

/// SHA-256 digest of an admin token. Routes compare digests, never the
/// raw token.
pub fn hash_token(token: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&out);
    arr
}

/// Digest comparison that does not short-circuit on the first
/// mismatched byte.
pub fn hashes_equal(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn bearer_token(header: &str) -> Option<&str> {
    header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Gate for mutating routes. With no admin token configured every
/// mutation is refused, so a bare deployment is read-only.
pub fn require_bearer(
    token_hash: Option<[u8; 32]>,
) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
        .and_then(move |header: Option<String>| async move {
            let presented = header.as_deref().and_then(bearer_token);
            match (token_hash, presented) {
                (Some(expected), Some(token)) if hashes_equal(&hash_token(token), &expected) => {
                    Ok(())
                }
                _ => Err(warp::reject::custom(UnauthorizedError)),
            }
        })
        .untuple_one()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_token("hello"), hash_token("hello"));
        assert_ne!(hash_token("hello"), hash_token("hello!"));
    }

    #[test]
    fn hashes_equal_matches_only_identical_digests() {
        let a = hash_token("abc");
        let b = hash_token("abc");
        let c = hash_token("abd");

        assert!(hashes_equal(&a, &b));
        assert!(!hashes_equal(&a, &c));
        assert!(!hashes_equal(&a, &a[..16]));
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token("Bearer secret"), Some("secret"));
        assert_eq!(bearer_token("Bearer   secret  "), Some("secret"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("secret"), None);
    }
}
