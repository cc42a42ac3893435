//! Negotiation of algorithms from the `SSH_MSG_KEXINIT` messages (RFC 4253, section 7.1).
use bytes::Bytes;
use rand::RngCore as _;
use crate::codec::{PacketDecode, PacketEncode};
use crate::codes::msg;
use crate::config::AlgoWishList;
use crate::error::{AlgoNegotiateError, Error, Result};
use crate::util::CryptoRngCore;

/// Category of algorithms that are negotiated separately.
///
/// The categories are listed in the order in which they appear in `SSH_MSG_KEXINIT`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum Category {
    Kex,
    HostKey,
    CipherCts,
    CipherStc,
    MacCts,
    MacStc,
    CompressionCts,
    CompressionStc,
    LanguageCts,
    LanguageStc,
}

impl Category {
    /// All categories in the wire order.
    pub const ALL: [Category; 10] = [
        Category::Kex, Category::HostKey,
        Category::CipherCts, Category::CipherStc,
        Category::MacCts, Category::MacStc,
        Category::CompressionCts, Category::CompressionStc,
        Category::LanguageCts, Category::LanguageStc,
    ];

    /// Human readable name, used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            Category::Kex => "key exchange",
            Category::HostKey => "server public key",
            Category::CipherCts => "cipher client-to-server",
            Category::CipherStc => "cipher server-to-client",
            Category::MacCts => "mac client-to-server",
            Category::MacStc => "mac server-to-client",
            Category::CompressionCts => "compression client-to-server",
            Category::CompressionStc => "compression server-to-client",
            Category::LanguageCts => "language client-to-server",
            Category::LanguageStc => "language server-to-client",
        }
    }

    /// Languages are optional: failure to agree on them is not an error.
    pub fn is_optional(self) -> bool {
        matches!(self, Category::LanguageCts | Category::LanguageStc)
    }
}

/// Parsed `SSH_MSG_KEXINIT` together with its exact payload.
///
/// The payload is hashed into the exchange hash byte-for-byte, so we keep the original bytes
/// instead of re-encoding the message.
#[derive(Debug, Clone)]
pub struct KexInit {
    /// Random cookie.
    pub cookie: [u8; 16],
    /// The lists of algorithms, in order of preference.
    pub algos: AlgoWishList,
    /// The sender guessed the algorithms and sent the first kex packet right after this one.
    pub first_kex_packet_follows: bool,
    /// The payload of the message, including the message number.
    pub payload: Bytes,
}

impl KexInit {
    /// Builds our `SSH_MSG_KEXINIT` with a random cookie.
    pub fn build(algos: AlgoWishList, rng: &mut dyn CryptoRngCore) -> KexInit {
        let mut cookie = [0; 16];
        rng.fill_bytes(&mut cookie);

        // RFC 4253, section 7.1
        let mut payload = PacketEncode::new();
        payload.put_u8(msg::KEXINIT);
        payload.put_raw(&cookie);
        for category in Category::ALL {
            payload.put_name_list(algos.list(category));
        }
        payload.put_bool(false); // first_kex_packet_follows
        payload.put_u32(0); // reserved

        KexInit { cookie, algos, first_kex_packet_follows: false, payload: payload.finish() }
    }

    /// Decodes `SSH_MSG_KEXINIT`; the message number must be already consumed from `payload`.
    pub fn decode(payload: &mut PacketDecode) -> Result<KexInit> {
        // RFC 4253, section 7.1
        let cookie = payload.get_array::<16>()?;
        let mut algos = AlgoWishList::empty();
        for category in Category::ALL {
            *algos.list_mut(category) = payload.get_name_list()?;
        }
        let first_kex_packet_follows = payload.get_bool()?;
        payload.get_u32()?; // reserved

        let payload = payload.whole();
        Ok(KexInit { cookie, algos, first_kex_packet_follows, payload })
    }
}

/// Algorithms that were agreed on by both sides.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Negotiated {
    pub kex: String,
    pub host_key: String,
    pub cipher_cts: String,
    pub cipher_stc: String,
    pub mac_cts: String,
    pub mac_stc: String,
    pub compression_cts: String,
    pub compression_stc: String,
    pub language_cts: Option<String>,
    pub language_stc: Option<String>,
    /// The first kex and host key algorithms of both sides are the same, so a kex packet sent
    /// before negotiation was sent with the right algorithms.
    pub guess_ok: bool,
}

/// Selects the first algorithm from our (client) list that is also in their (server) list.
///
/// Our order of preference wins. An empty client list selects nothing and is not an error;
/// otherwise no overlap gives [`Error::AlgoNegotiate`].
pub fn match_algo(category: Category, ours: &[String], theirs: &[String]) -> Result<Option<String>> {
    if ours.is_empty() {
        return Ok(None)
    }

    for our_algo in ours.iter() {
        if theirs.iter().any(|their_algo| their_algo == our_algo) {
            return Ok(Some(our_algo.clone()))
        }
    }

    Err(Error::AlgoNegotiate(AlgoNegotiateError {
        algo_name: category.name().into(),
        our_algos: ours.into(),
        their_algos: theirs.into(),
    }))
}

/// Checks whether a guessed first kex packet used the algorithms that are negotiated.
///
/// Only the first entries of the kex and host key lists are compared (RFC 4253, section 7).
pub fn is_guess_ok(ours: &AlgoWishList, theirs: &AlgoWishList) -> bool {
    ours.kex.first() == theirs.kex.first() && ours.host_key.first() == theirs.host_key.first()
}

/// Negotiates algorithms in all categories.
pub fn negotiate(ours: &AlgoWishList, theirs: &AlgoWishList) -> Result<Negotiated> {
    let mandatory = |category: Category| -> Result<String> {
        let algo = match_algo(category, ours.list(category), theirs.list(category))?
            .ok_or_else(|| Error::AlgoNegotiate(AlgoNegotiateError {
                algo_name: category.name().into(),
                our_algos: Vec::new(),
                their_algos: theirs.list(category).into(),
            }))?;
        log::debug!("negotiated algo {:?} for {}", algo, category.name());
        Ok(algo)
    };

    let optional = |category: Category| -> Option<String> {
        match match_algo(category, ours.list(category), theirs.list(category)) {
            Ok(algo) => algo,
            Err(err) => {
                log::debug!("ignoring failed negotiation: {}", err);
                None
            },
        }
    };

    Ok(Negotiated {
        kex: mandatory(Category::Kex)?,
        host_key: mandatory(Category::HostKey)?,
        cipher_cts: mandatory(Category::CipherCts)?,
        cipher_stc: mandatory(Category::CipherStc)?,
        mac_cts: mandatory(Category::MacCts)?,
        mac_stc: mandatory(Category::MacStc)?,
        compression_cts: mandatory(Category::CompressionCts)?,
        compression_stc: mandatory(Category::CompressionStc)?,
        language_cts: optional(Category::LanguageCts),
        language_stc: optional(Category::LanguageStc),
        guess_ok: is_guess_ok(ours, theirs),
    })
}
