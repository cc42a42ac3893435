use bytes::Bytes;
use derivative::Derivative;
use crate::codec::{PacketDecode, PacketEncode};
use crate::codes::msg;
use crate::error::{Error, Result};
use crate::util::CryptoRngCore;
use super::{HashAlgo, KexInput, KexOutput, KexReply};

/// Curve used by an elliptic-curve key exchange.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum Curve {
    /// NIST P-256, "ecdh-sha2-nistp256" (RFC 5656).
    P256,
    /// NIST P-384, "ecdh-sha2-nistp384" (RFC 5656).
    P384,
    /// NIST P-521, "ecdh-sha2-nistp521" (RFC 5656).
    P521,
    /// Curve25519, "curve25519-sha256" (RFC 8731).
    X25519,
}

impl Curve {
    /// The hash is fixed by the curve size (RFC 5656, section 6.2.1).
    pub fn hash_algo(self) -> HashAlgo {
        match self {
            Curve::P256 | Curve::X25519 => HashAlgo::Sha256,
            Curve::P384 => HashAlgo::Sha384,
            Curve::P521 => HashAlgo::Sha512,
        }
    }
}

enum EphSecret {
    P256(p256::ecdh::EphemeralSecret),
    P384(p384::ecdh::EphemeralSecret),
    P521(p521::ecdh::EphemeralSecret),
    X25519(x25519_dalek::EphemeralSecret),
}

/// Elliptic-curve Diffie-Hellman key exchange (RFC 5656, section 4 and RFC 8731).
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct EcdhKex {
    curve: Curve,
    #[derivative(Debug = "ignore")]
    our_eph_privkey: Option<EphSecret>,
    our_eph_pubkey: Vec<u8>,
    server_eph_pubkey: Option<Vec<u8>>,
    #[derivative(Debug = "ignore")]
    shared_secret_be: Option<Vec<u8>>,
}

impl EcdhKex {
    pub fn new(curve: Curve, rng: &mut dyn CryptoRngCore) -> EcdhKex {
        use p256::elliptic_curve::sec1::ToEncodedPoint as _;

        let (our_eph_privkey, our_eph_pubkey) = match curve {
            Curve::P256 => {
                let privkey = p256::ecdh::EphemeralSecret::random(&mut &mut *rng);
                let pubkey = privkey.public_key().to_encoded_point(false).as_bytes().to_vec();
                (EphSecret::P256(privkey), pubkey)
            },
            Curve::P384 => {
                let privkey = p384::ecdh::EphemeralSecret::random(&mut &mut *rng);
                let pubkey = privkey.public_key().to_encoded_point(false).as_bytes().to_vec();
                (EphSecret::P384(privkey), pubkey)
            },
            Curve::P521 => {
                let privkey = p521::ecdh::EphemeralSecret::random(&mut &mut *rng);
                let pubkey = privkey.public_key().to_encoded_point(false).as_bytes().to_vec();
                (EphSecret::P521(privkey), pubkey)
            },
            Curve::X25519 => {
                let privkey = x25519_dalek::EphemeralSecret::random_from_rng(&mut *rng);
                let pubkey = x25519_dalek::PublicKey::from(&privkey).as_bytes().to_vec();
                (EphSecret::X25519(privkey), pubkey)
            },
        };

        log::debug!("initialized ECDH kex with {:?}", curve);
        EcdhKex {
            curve,
            our_eph_privkey: Some(our_eph_privkey),
            our_eph_pubkey,
            server_eph_pubkey: None,
            shared_secret_be: None,
        }
    }

    pub fn hash_algo(&self) -> HashAlgo {
        self.curve.hash_algo()
    }

    pub fn send_ecdh_init(&self) -> Bytes {
        // RFC 5656, section 4
        let mut payload = PacketEncode::new();
        payload.put_u8(msg::KEX_ECDH_INIT);
        payload.put_bytes(&self.our_eph_pubkey);
        log::debug!("sending SSH_MSG_KEX_ECDH_INIT");
        payload.finish()
    }

    pub fn recv_ecdh_reply(&mut self, payload: &mut PacketDecode) -> Result<KexReply> {
        let our_eph_privkey = self.our_eph_privkey.take()
            .ok_or(Error::Protocol("received duplicate SSH_MSG_KEX_ECDH_REPLY"))?;

        // RFC 5656, section 4 and RFC 8731, section 3.1
        let server_pubkey = payload.get_bytes()?;
        let server_eph_pubkey = payload.get_bytes()?;
        let server_exchange_hash_sign = payload.get_bytes()?;

        let shared_secret_be = agree(our_eph_privkey, &server_eph_pubkey)?;
        self.server_eph_pubkey = Some(server_eph_pubkey.to_vec());
        self.shared_secret_be = Some(shared_secret_be);
        log::debug!("received SSH_MSG_KEX_ECDH_REPLY");
        Ok(KexReply { server_pubkey, server_exchange_hash_sign })
    }

    pub fn exchange(&self, input: &KexInput) -> Result<KexOutput> {
        let (server_eph_pubkey, shared_secret_be) = match (&self.server_eph_pubkey, &self.shared_secret_be) {
            (Some(pubkey), Some(secret)) => (pubkey, secret),
            _ => return Err(Error::Protocol("ECDH exchange has not received the reply")),
        };

        // RFC 5656, section 4
        let mut exchange_data = PacketEncode::new();
        input.put_prefix(&mut exchange_data);
        exchange_data.put_bytes(&self.our_eph_pubkey);
        exchange_data.put_bytes(server_eph_pubkey);
        exchange_data.put_mpint_uint_be(shared_secret_be);
        let exchange_hash = self.hash_algo().digest(&exchange_data.finish());

        Ok(KexOutput { shared_secret_be: shared_secret_be.clone(), exchange_hash })
    }
}

fn agree(our_eph_privkey: EphSecret, server_eph_pubkey: &[u8]) -> Result<Vec<u8>> {
    let invalid = Error::Protocol("server sent invalid ECDH ephemeral public key");
    match our_eph_privkey {
        EphSecret::P256(privkey) => {
            let pubkey = p256::PublicKey::from_sec1_bytes(server_eph_pubkey).map_err(|_| invalid)?;
            Ok(privkey.diffie_hellman(&pubkey).raw_secret_bytes().to_vec())
        },
        EphSecret::P384(privkey) => {
            let pubkey = p384::PublicKey::from_sec1_bytes(server_eph_pubkey).map_err(|_| invalid)?;
            Ok(privkey.diffie_hellman(&pubkey).raw_secret_bytes().to_vec())
        },
        EphSecret::P521(privkey) => {
            let pubkey = p521::PublicKey::from_sec1_bytes(server_eph_pubkey).map_err(|_| invalid)?;
            Ok(privkey.diffie_hellman(&pubkey).raw_secret_bytes().to_vec())
        },
        EphSecret::X25519(privkey) => {
            let pubkey: [u8; 32] = server_eph_pubkey.try_into().map_err(|_| invalid)?;
            let shared_secret = privkey.diffie_hellman(&x25519_dalek::PublicKey::from(pubkey));
            // RFC 8731, section 3
            if !shared_secret.was_contributory() {
                return Err(Error::Protocol("X25519 shared secret is all zeros"))
            }
            Ok(shared_secret.as_bytes().to_vec())
        },
    }
}
