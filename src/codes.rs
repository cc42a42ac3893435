//! Message numbers of the SSH transport layer used during key exchange.
#![allow(missing_docs)]

/// Message numbers (RFC 4250, section 4.1).
///
/// Numbers 30 to 49 are specific to the key exchange method, so several constants share the
/// same value.
pub mod msg {
    pub const KEXINIT: u8 = 20;
    pub const NEWKEYS: u8 = 21;

    pub const KEXDH_INIT: u8 = 30;
    pub const KEXDH_REPLY: u8 = 31;

    pub const KEX_ECDH_INIT: u8 = 30;
    pub const KEX_ECDH_REPLY: u8 = 31;

    pub const KEX_DH_GEX_REQUEST_OLD: u8 = 30;
    pub const KEX_DH_GEX_GROUP: u8 = 31;
    pub const KEX_DH_GEX_INIT: u8 = 32;
    pub const KEX_DH_GEX_REPLY: u8 = 33;
    pub const KEX_DH_GEX_REQUEST: u8 = 34;

    /// First message number of the key exchange range.
    pub const KEX_FIRST: u8 = 20;
    /// Last message number of the key exchange range.
    pub const KEX_LAST: u8 = 49;
    /// First message number that is specific to the key exchange method.
    pub const KEX_METHOD_FIRST: u8 = 30;
}
