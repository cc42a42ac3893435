//! Key exchange algorithms.
//!
//! The SSH protocol supports several key exchange (kex) algorithms, which are used to establish
//! the one-time keys used for message encryption and authentication.
//!
//! The client and the server exchange lists of supported algorithms, and the first algorithm on
//! the client's list that is also supported by the server is used for the connection.
//!
//! # Supported algorithms
//!
//! - "diffie-hellman-group-exchange-sha256" ([`DIFFIE_HELLMAN_GROUP_EXCHANGE_SHA256`])
//! - "diffie-hellman-group-exchange-sha1" ([`DIFFIE_HELLMAN_GROUP_EXCHANGE_SHA1`])
//! - "diffie-hellman-group14-sha1" ([`DIFFIE_HELLMAN_GROUP14_SHA1`])
//! - "diffie-hellman-group1-sha1" ([`DIFFIE_HELLMAN_GROUP1_SHA1`])
//! - "ecdh-sha2-nistp256" ([`ECDH_SHA2_NISTP256`])
//! - "ecdh-sha2-nistp384" ([`ECDH_SHA2_NISTP384`])
//! - "ecdh-sha2-nistp521" ([`ECDH_SHA2_NISTP521`])
//! - "curve25519-sha256" / "curve25519-sha256@libssh.org" ([`CURVE25519_SHA256`] /
//! [`CURVE25519_SHA256_LIBSSH`])
//!
//! The group exchange methods send one more round trip to the server, which picks a group in the
//! range given by [`GexParams`][crate::GexParams].
use bytes::Bytes;
use crate::codec::{PacketDecode, PacketEncode};
use crate::codes::msg;
use crate::config::GexParams;
use crate::error::{Error, Result};
use crate::util::CryptoRngCore;
pub use self::hash::HashAlgo;
use self::dh::{DhKex, FixedGroup};
use self::ecdh::{Curve, EcdhKex};
use self::gex::GexKex;

mod dh;
mod ecdh;
mod gex;
mod hash;

/// Algorithm for key exchange.
///
/// See the [module documentation][self] for details.
#[derive(Debug)]
pub struct KexAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    pub(crate) kind: KexKind,
}

#[derive(Debug, Copy, Clone)]
pub(crate) enum KexKind {
    GroupExchange(HashAlgo),
    FixedGroup(FixedGroup, HashAlgo),
    Ecdh(Curve),
}

impl KexAlgo {
    /// Hash function used by this method for the exchange hash and for key derivation.
    pub fn hash_algo(&self) -> HashAlgo {
        match self.kind {
            KexKind::GroupExchange(hash) | KexKind::FixedGroup(_, hash) => hash,
            KexKind::Ecdh(curve) => curve.hash_algo(),
        }
    }

    /// Returns true if this method requests the group from the server (RFC 4419).
    pub fn is_group_exchange(&self) -> bool {
        matches!(self.kind, KexKind::GroupExchange(_))
    }
}

/// "diffie-hellman-group-exchange-sha256" key exchange from RFC 4419.
pub static DIFFIE_HELLMAN_GROUP_EXCHANGE_SHA256: KexAlgo = KexAlgo {
    name: "diffie-hellman-group-exchange-sha256",
    kind: KexKind::GroupExchange(HashAlgo::Sha256),
};

/// "diffie-hellman-group-exchange-sha1" key exchange from RFC 4419.
pub static DIFFIE_HELLMAN_GROUP_EXCHANGE_SHA1: KexAlgo = KexAlgo {
    name: "diffie-hellman-group-exchange-sha1",
    kind: KexKind::GroupExchange(HashAlgo::Sha1),
};

/// "diffie-hellman-group14-sha1" key exchange from RFC 4253.
pub static DIFFIE_HELLMAN_GROUP14_SHA1: KexAlgo = KexAlgo {
    name: "diffie-hellman-group14-sha1",
    kind: KexKind::FixedGroup(FixedGroup::Group14, HashAlgo::Sha1),
};

/// "diffie-hellman-group1-sha1" key exchange from RFC 4253.
///
/// The 1024-bit group is considered weak, but many old servers support nothing else.
pub static DIFFIE_HELLMAN_GROUP1_SHA1: KexAlgo = KexAlgo {
    name: "diffie-hellman-group1-sha1",
    kind: KexKind::FixedGroup(FixedGroup::Group1, HashAlgo::Sha1),
};

/// "ecdh-sha2-nistp256" key exchange from RFC 5656.
pub static ECDH_SHA2_NISTP256: KexAlgo = KexAlgo {
    name: "ecdh-sha2-nistp256",
    kind: KexKind::Ecdh(Curve::P256),
};

/// "ecdh-sha2-nistp384" key exchange from RFC 5656.
pub static ECDH_SHA2_NISTP384: KexAlgo = KexAlgo {
    name: "ecdh-sha2-nistp384",
    kind: KexKind::Ecdh(Curve::P384),
};

/// "ecdh-sha2-nistp521" key exchange from RFC 5656.
pub static ECDH_SHA2_NISTP521: KexAlgo = KexAlgo {
    name: "ecdh-sha2-nistp521",
    kind: KexKind::Ecdh(Curve::P521),
};

/// "curve25519-sha256" key exchange from RFC 8731.
pub static CURVE25519_SHA256: KexAlgo = KexAlgo {
    name: "curve25519-sha256",
    kind: KexKind::Ecdh(Curve::X25519),
};

/// "curve25519-sha256@libssh.org" key exchange, the name used before RFC 8731.
pub static CURVE25519_SHA256_LIBSSH: KexAlgo = KexAlgo {
    name: "curve25519-sha256@libssh.org",
    kind: KexKind::Ecdh(Curve::X25519),
};

static ALL_KEX_ALGOS: [&KexAlgo; 9] = [
    &DIFFIE_HELLMAN_GROUP_EXCHANGE_SHA256,
    &DIFFIE_HELLMAN_GROUP_EXCHANGE_SHA1,
    &DIFFIE_HELLMAN_GROUP14_SHA1,
    &DIFFIE_HELLMAN_GROUP1_SHA1,
    &ECDH_SHA2_NISTP256,
    &ECDH_SHA2_NISTP384,
    &ECDH_SHA2_NISTP521,
    &CURVE25519_SHA256,
    &CURVE25519_SHA256_LIBSSH,
];

/// Finds a supported key exchange algorithm by name.
pub fn by_name(name: &str) -> Option<&'static KexAlgo> {
    ALL_KEX_ALGOS.iter().copied().find(|algo| algo.name == name)
}

/// Names of all supported key exchange algorithms in the default order of preference.
///
/// This list is the only source of truth for the kex names that we accept.
pub fn default_kex_algos() -> Vec<&'static str> {
    ALL_KEX_ALGOS.iter().map(|algo| algo.name).collect()
}

/// Inputs of the exchange hash that are common to all methods (RFC 4253, section 8).
#[derive(Debug)]
pub(crate) struct KexInput<'a> {
    pub client_ident: &'a [u8],
    pub server_ident: &'a [u8],
    pub client_kex_init: &'a [u8],
    pub server_kex_init: &'a [u8],
    pub server_pubkey: &'a [u8],
}

impl KexInput<'_> {
    /// Writes V_C, V_S, I_C, I_S and K_S.
    pub fn put_prefix(&self, data: &mut PacketEncode) {
        data.put_bytes(self.client_ident);
        data.put_bytes(self.server_ident);
        data.put_bytes(self.client_kex_init);
        data.put_bytes(self.server_kex_init);
        data.put_bytes(self.server_pubkey);
    }
}

/// Final message from the server: its host key and the signature of the exchange hash.
#[derive(Debug, Clone)]
pub(crate) struct KexReply {
    pub server_pubkey: Bytes,
    pub server_exchange_hash_sign: Bytes,
}

pub(crate) struct KexOutput {
    pub shared_secret_be: Vec<u8>,
    pub exchange_hash: Vec<u8>,
}

/// What the exchange wants the manager to do after a message from the server.
#[derive(Debug)]
pub(crate) enum ExchangeStep {
    /// The server sent a group, we must send our public value.
    GroupReceived(Bytes),
    /// The server sent its final reply.
    Reply(KexReply),
}

/// Running exchange of one of the method families.
#[derive(Debug)]
pub(crate) enum Exchange {
    Dh(DhKex),
    Gex(GexKex),
    Ecdh(EcdhKex),
}

impl Exchange {
    /// Creates the exchange and returns the first message that we send.
    pub fn start(algo: &KexAlgo, gex_params: &GexParams, rng: &mut dyn CryptoRngCore) -> (Exchange, Bytes) {
        match algo.kind {
            KexKind::GroupExchange(hash) => {
                let kex = GexKex::new(gex_params.clone(), hash);
                let payload = kex.send_request();
                (Exchange::Gex(kex), payload)
            },
            KexKind::FixedGroup(group, hash) => {
                let kex = DhKex::new(group, hash, rng);
                let payload = kex.send_kexdh_init();
                (Exchange::Dh(kex), payload)
            },
            KexKind::Ecdh(curve) => {
                let kex = EcdhKex::new(curve, rng);
                let payload = kex.send_ecdh_init();
                (Exchange::Ecdh(kex), payload)
            },
        }
    }

    pub fn hash_algo(&self) -> HashAlgo {
        match self {
            Exchange::Dh(kex) => kex.hash_algo(),
            Exchange::Gex(kex) => kex.hash_algo(),
            Exchange::Ecdh(kex) => kex.hash_algo(),
        }
    }

    /// Handles a method-specific message (numbers 30 to 49).
    pub fn recv_message(
        &mut self,
        msg_id: u8,
        payload: &mut PacketDecode,
        rng: &mut dyn CryptoRngCore,
    ) -> Result<ExchangeStep> {
        match (self, msg_id) {
            (Exchange::Dh(kex), msg::KEXDH_REPLY) =>
                kex.recv_kexdh_reply(payload).map(ExchangeStep::Reply),
            (Exchange::Ecdh(kex), msg::KEX_ECDH_REPLY) =>
                kex.recv_ecdh_reply(payload).map(ExchangeStep::Reply),
            (Exchange::Gex(kex), msg::KEX_DH_GEX_GROUP) =>
                kex.recv_group(payload, rng).map(ExchangeStep::GroupReceived),
            (Exchange::Gex(kex), msg::KEX_DH_GEX_REPLY) =>
                kex.recv_reply(payload).map(ExchangeStep::Reply),
            (_, _) => Err(Error::Protocol("received unexpected key exchange message")),
        }
    }

    /// Computes the shared secret and the exchange hash after the reply was received.
    pub fn exchange(&self, input: &KexInput) -> Result<KexOutput> {
        match self {
            Exchange::Dh(kex) => kex.exchange(input),
            Exchange::Gex(kex) => kex.exchange(input),
            Exchange::Ecdh(kex) => kex.exchange(input),
        }
    }
}
