//! The `mysql_native_password` scramble.
//!
//! ```text
//! SHA1(password) XOR SHA1(nonce + SHA1(SHA1(password)))
//! ```
//!
//! The nonce is the 20-byte auth challenge from the initial handshake (or from
//! an auth-switch request).

use sha1::{Digest, Sha1};

/// The only authentication plugin this client speaks.
pub(crate) const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";

/// Computes the authentication response for `mysql_native_password`.
///
/// Returns an empty vector for an empty password, which the server expects.
pub(crate) fn native_password_scramble(password: &str, nonce: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    // Servers send the 20-byte challenge with a trailing NUL at times.
    let nonce = if nonce.len() > 20 { &nonce[..20] } else { nonce };

    let stage1: [u8; 20] = Sha1::digest(password.as_bytes()).into();
    let stage2: [u8; 20] = Sha1::digest(stage1).into();

    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(stage2);
    let stage3: [u8; 20] = hasher.finalize().into();

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_password_yields_empty_response() {
        assert!(native_password_scramble("", &[0; 20]).is_empty());
    }

    #[test]
    fn response_is_twenty_bytes_and_deterministic() {
        let nonce = [7u8; 20];
        let first = native_password_scramble("secret", &nonce);
        let second = native_password_scramble("secret", &nonce);
        assert_eq!(20, first.len());
        assert_eq!(first, second);
    }

    #[test]
    fn response_depends_on_password_and_nonce() {
        let nonce = [7u8; 20];
        let other_nonce = [8u8; 20];
        let base = native_password_scramble("secret", &nonce);
        assert_ne!(base, native_password_scramble("other", &nonce));
        assert_ne!(base, native_password_scramble("secret", &other_nonce));
    }

    #[test]
    fn trailing_nul_on_the_nonce_is_ignored() {
        let nonce = [7u8; 20];
        let mut padded = nonce.to_vec();
        padded.push(0);
        assert_eq!(
            native_password_scramble("secret", &nonce),
            native_password_scramble("secret", &padded)
        );
    }

    #[test]
    fn xor_structure_recovers_stage_one() {
        // scramble ^ SHA1(nonce + SHA1(SHA1(pw))) must equal SHA1(pw)
        let nonce = [3u8; 20];
        let scramble = native_password_scramble("secret", &nonce);

        let stage1: [u8; 20] = Sha1::digest(b"secret").into();
        let stage2: [u8; 20] = Sha1::digest(stage1).into();
        let mut hasher = Sha1::new();
        hasher.update(nonce);
        hasher.update(stage2);
        let stage3: [u8; 20] = hasher.finalize().into();

        let recovered: Vec<u8> = scramble
            .iter()
            .zip(stage3.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        assert_eq!(&stage1[..], &recovered[..]);
    }
}
