//! Cryptographic primitives backing the resumable session handshake:
//! Diffie-Hellman key agreement over the RFC 3526 2048-bit MODP group,
//! MD5/HMAC-MD5 for the (non-standard) reconnect authentication scheme,
//! and base64 for framing both over an ASCII handshake line.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use num_bigint::BigUint;
use rand::RngCore;

/// Width in bytes of the DH public value and of the private exponent.
pub const DH_KEY_SIZE: usize = 256;
/// Width in bytes of the private exponent, per the external interface spec.
pub const DH_PRIVATE_KEY_SIZE: usize = 32;
/// Width in bytes of the negotiated shared secret (truncated from the full DH result).
pub const SHARED_SECRET_SIZE: usize = 32;

/// RFC 3526 Group 14: 2048-bit MODP group, generator 2.
const GROUP14_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D",
    "C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F",
    "83655D23DCA3AD961C62F356208552BB9ED529077096966D",
    "670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9",
    "DE2BCBF6955817183995497CEA956AE515D2261898FA0510",
    "15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

fn group14_prime() -> BigUint {
    BigUint::parse_bytes(GROUP14_PRIME_HEX.as_bytes(), 16)
        .expect("RFC 3526 group 14 prime constant is well-formed")
}

fn group14_generator() -> BigUint {
    BigUint::from(2u32)
}

/// A Diffie-Hellman private exponent, drawn from cryptographic randomness.
pub struct DhPrivateKey {
    x: BigUint,
}

impl DhPrivateKey {
    /// Generate a fresh private key from `DH_PRIVATE_KEY_SIZE` bytes of randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; DH_PRIVATE_KEY_SIZE];
        rand::thread_rng().fill_bytes(&mut bytes);
        DhPrivateKey {
            x: BigUint::from_bytes_be(&bytes),
        }
    }

    /// Compute the public value `g^x mod p`, as a fixed `DH_KEY_SIZE`-byte big-endian value.
    pub fn public_value(&self) -> [u8; DH_KEY_SIZE] {
        let pub_val = group14_generator().modpow(&self.x, &group14_prime());
        to_fixed_be(&pub_val, DH_KEY_SIZE)
    }

    /// Derive the shared secret from the peer's public value: `peer_pub^x mod p`,
    /// truncated to the leading `SHARED_SECRET_SIZE` bytes.
    pub fn shared_secret(&self, peer_public: &[u8]) -> [u8; SHARED_SECRET_SIZE] {
        let peer = BigUint::from_bytes_be(peer_public);
        let shared = peer.modpow(&self.x, &group14_prime());
        let full = to_fixed_be(&shared, DH_KEY_SIZE);
        let mut secret = [0u8; SHARED_SECRET_SIZE];
        secret.copy_from_slice(&full[..SHARED_SECRET_SIZE]);
        secret
    }
}

fn to_fixed_be(v: &BigUint, width: usize) -> Vec<u8> {
    let bytes = v.to_bytes_be();
    if bytes.len() >= width {
        bytes[bytes.len() - width..].to_vec()
    } else {
        let mut out = vec![0u8; width - bytes.len()];
        out.extend_from_slice(&bytes);
        out
    }
}

/// MD5 digest of `content`.
pub fn md5(content: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(content);
    hasher.finalize().into()
}

/// HMAC-MD5 of `MD5(content)` under `key`.
///
/// This is the non-standard "hash-of-hash" construction the reconnect
/// handshake relies on: the HMAC input is `md5(content)`, not `content`.
pub fn hmac_md5_of_hash(key: &[u8], content: &[u8]) -> [u8; 16] {
    let digest = md5(content);
    let mut mac = Hmac::<Md5>::new_from_slice(key).expect("HMAC accepts a key of any length");
    mac.update(&digest);
    mac.finalize().into_bytes().into()
}

/// Standard-alphabet base64 encoding, with padding (unmodified `btoa` output).
pub fn base64_encode(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Standard-alphabet base64 decoding.
pub fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dh_roundtrip_agrees() {
        let alice = DhPrivateKey::generate();
        let bob = DhPrivateKey::generate();

        let alice_pub = alice.public_value();
        let bob_pub = bob.public_value();

        let alice_secret = alice.shared_secret(&bob_pub);
        let bob_secret = bob.shared_secret(&alice_pub);

        assert_eq!(alice_secret, bob_secret);
    }

    #[test]
    fn test_dh_public_value_is_full_width() {
        let key = DhPrivateKey::generate();
        assert_eq!(key.public_value().len(), DH_KEY_SIZE);
    }

    #[test]
    fn test_md5_known_vector() {
        // md5("") == d41d8cd98f00b204e9800998ecf8427e
        let digest = md5(b"");
        assert_eq!(
            digest,
            [
                0xd4, 0x1d, 0x8c, 0xd9, 0x8f, 0x00, 0xb2, 0x04, 0xe9, 0x80, 0x09, 0x98, 0xec, 0xf8,
                0x42, 0x7e,
            ]
        );
    }

    #[test]
    fn test_hmac_md5_of_hash_deterministic() {
        let key = b"shared-secret";
        let content = b"42\n1\n0\n";
        let a = hmac_md5_of_hash(key, content);
        let b = hmac_md5_of_hash(key, content);
        assert_eq!(a, b);

        let different_key = hmac_md5_of_hash(b"other-secret", content);
        assert_ne!(a, different_key);
    }

    #[test]
    fn test_base64_roundtrip() {
        let data = vec![0u8, 1, 2, 250, 251, 252, 253, 254, 255];
        let encoded = base64_encode(&data);
        let decoded = base64_decode(&encoded).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_base64_matches_standard_padding() {
        // "f" -> "Zg==" is the canonical standard-alphabet, padded encoding.
        assert_eq!(base64_encode(b"f"), "Zg==");
    }
}
