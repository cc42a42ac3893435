//! Encryption algorithms known to the key exchange.
//!
//! The key exchange does not encrypt anything by itself, but it must know how many bytes of key
//! and IV to derive for the negotiated cipher (RFC 4253, section 7.2). The transport uses the
//! derived keys to construct the actual cipher.
//!
//! # Supported algorithms
//!
//! - "aes128-ctr" / "aes192-ctr" / "aes256-ctr" ([`AES128_CTR`] / [`AES192_CTR`] / [`AES256_CTR`])
//! - "aes128-cbc" / "aes192-cbc" / "aes256-cbc" ([`AES128_CBC`] / [`AES192_CBC`] / [`AES256_CBC`])
//! - "3des-ctr" / "3des-cbc" ([`TDES_CTR`] / [`TDES_CBC`])
//! - "none" ([`NONE`])

/// Algorithm for encrypting and decrypting messages.
///
/// See the [module documentation][self] for details.
#[derive(Debug)]
pub struct CipherAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    /// Size of the cipher block in bytes.
    pub block_len: usize,
    /// Size of the key in bytes.
    pub key_len: usize,
    /// Size of the initialization vector in bytes.
    pub iv_len: usize,
}

/// "aes128-ctr" cipher from RFC 4344.
pub static AES128_CTR: CipherAlgo = CipherAlgo { name: "aes128-ctr", block_len: 16, key_len: 16, iv_len: 16 };
/// "aes192-ctr" cipher from RFC 4344.
pub static AES192_CTR: CipherAlgo = CipherAlgo { name: "aes192-ctr", block_len: 16, key_len: 24, iv_len: 16 };
/// "aes256-ctr" cipher from RFC 4344.
pub static AES256_CTR: CipherAlgo = CipherAlgo { name: "aes256-ctr", block_len: 16, key_len: 32, iv_len: 16 };

/// "aes128-cbc" cipher from RFC 4253.
pub static AES128_CBC: CipherAlgo = CipherAlgo { name: "aes128-cbc", block_len: 16, key_len: 16, iv_len: 16 };
/// "aes192-cbc" cipher from RFC 4253.
pub static AES192_CBC: CipherAlgo = CipherAlgo { name: "aes192-cbc", block_len: 16, key_len: 24, iv_len: 16 };
/// "aes256-cbc" cipher from RFC 4253.
pub static AES256_CBC: CipherAlgo = CipherAlgo { name: "aes256-cbc", block_len: 16, key_len: 32, iv_len: 16 };

/// "3des-ctr" cipher from RFC 4344.
pub static TDES_CTR: CipherAlgo = CipherAlgo { name: "3des-ctr", block_len: 8, key_len: 24, iv_len: 8 };
/// "3des-cbc" cipher from RFC 4253.
pub static TDES_CBC: CipherAlgo = CipherAlgo { name: "3des-cbc", block_len: 8, key_len: 24, iv_len: 8 };

/// "none" cipher (no encryption).
///
/// This is used before the first key exchange finishes.
pub static NONE: CipherAlgo = CipherAlgo { name: "none", block_len: 8, key_len: 0, iv_len: 0 };
