//! Message authentication algorithms known to the key exchange.
//!
//! As with [ciphers][crate::cipher], only the sizes are needed to derive the keys; the transport
//! computes the MACs.
//!
//! # Supported algorithms
//!
//! - "hmac-sha2-256" ([`HMAC_SHA2_256`])
//! - "hmac-sha2-512" ([`HMAC_SHA2_512`])
//! - "hmac-sha1" ([`HMAC_SHA1`])
//! - "hmac-sha2-256-etm@openssh.com" ([`HMAC_SHA2_256_ETM`])
//! - "hmac-sha2-512-etm@openssh.com" ([`HMAC_SHA2_512_ETM`])
//! - "hmac-sha1-etm@openssh.com" ([`HMAC_SHA1_ETM`])
//! - "hmac-sha1-96" ([`HMAC_SHA1_96`])
//! - "hmac-md5" / "hmac-md5-96" ([`HMAC_MD5`] / [`HMAC_MD5_96`])
//! - "none" ([`NONE`])

/// Algorithm for authenticating messages.
///
/// See the [module documentation][self] for details.
#[derive(Debug)]
pub struct MacAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    /// Size of the MAC tag in bytes.
    pub tag_len: usize,
    /// Size of the key in bytes.
    pub key_len: usize,
    /// Whether the MAC is computed over the plaintext or the ciphertext.
    pub variant: MacAlgoVariant,
}

/// Order of encryption and authentication.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MacAlgoVariant {
    /// The MAC is computed from the plaintext (RFC 4253, section 6.4).
    EncryptAndMac,
    /// The MAC is computed from the ciphertext ("-etm@openssh.com" algorithms).
    EncryptThenMac,
}

/// "hmac-sha2-256" MAC from RFC 6668.
pub static HMAC_SHA2_256: MacAlgo = MacAlgo {
    name: "hmac-sha2-256",
    tag_len: 32,
    key_len: 32,
    variant: MacAlgoVariant::EncryptAndMac,
};

/// "hmac-sha2-512" MAC from RFC 6668.
pub static HMAC_SHA2_512: MacAlgo = MacAlgo {
    name: "hmac-sha2-512",
    tag_len: 64,
    key_len: 64,
    variant: MacAlgoVariant::EncryptAndMac,
};

/// "hmac-sha1" MAC from RFC 4253.
pub static HMAC_SHA1: MacAlgo = MacAlgo {
    name: "hmac-sha1",
    tag_len: 20,
    key_len: 20,
    variant: MacAlgoVariant::EncryptAndMac,
};

/// "hmac-sha2-256-etm@openssh.com" MAC from OpenSSH.
pub static HMAC_SHA2_256_ETM: MacAlgo = MacAlgo {
    name: "hmac-sha2-256-etm@openssh.com",
    tag_len: 32,
    key_len: 32,
    variant: MacAlgoVariant::EncryptThenMac,
};

/// "hmac-sha2-512-etm@openssh.com" MAC from OpenSSH.
pub static HMAC_SHA2_512_ETM: MacAlgo = MacAlgo {
    name: "hmac-sha2-512-etm@openssh.com",
    tag_len: 64,
    key_len: 64,
    variant: MacAlgoVariant::EncryptThenMac,
};

/// "hmac-sha1-etm@openssh.com" MAC from OpenSSH.
pub static HMAC_SHA1_ETM: MacAlgo = MacAlgo {
    name: "hmac-sha1-etm@openssh.com",
    tag_len: 20,
    key_len: 20,
    variant: MacAlgoVariant::EncryptThenMac,
};

/// "hmac-sha1-96" MAC from RFC 4253 (truncated to 12 bytes).
pub static HMAC_SHA1_96: MacAlgo = MacAlgo {
    name: "hmac-sha1-96",
    tag_len: 12,
    key_len: 20,
    variant: MacAlgoVariant::EncryptAndMac,
};

/// "hmac-md5" MAC from RFC 4253.
pub static HMAC_MD5: MacAlgo = MacAlgo {
    name: "hmac-md5",
    tag_len: 16,
    key_len: 16,
    variant: MacAlgoVariant::EncryptAndMac,
};

/// "hmac-md5-96" MAC from RFC 4253 (truncated to 12 bytes).
pub static HMAC_MD5_96: MacAlgo = MacAlgo {
    name: "hmac-md5-96",
    tag_len: 12,
    key_len: 16,
    variant: MacAlgoVariant::EncryptAndMac,
};

/// "none" MAC (no authentication).
pub static NONE: MacAlgo = MacAlgo {
    name: "none",
    tag_len: 0,
    key_len: 0,
    variant: MacAlgoVariant::EncryptAndMac,
};
