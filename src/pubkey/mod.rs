//! Public key algorithms for server host keys.
//!
//! The server proves its identity by signing the exchange hash with its host key. We decode the
//! host key from its SSH encoding and verify the signature using the public key algorithm that
//! was negotiated.
//!
//! # Supported algorithms
//!
//! - "ssh-ed25519" ([`SSH_ED25519`], uses [`Ed25519Pubkey`])
//! - "ecdsa-sha2-nistp256" ([`ECDSA_SHA2_NISTP256`], uses [`EcdsaP256Pubkey`])
//! - "ecdsa-sha2-nistp384" ([`ECDSA_SHA2_NISTP384`], uses [`EcdsaP384Pubkey`])
//! - "rsa-sha2-512" ([`RSA_SHA2_512`], uses [`RsaPubkey`])
//! - "rsa-sha2-256" ([`RSA_SHA2_256`], uses [`RsaPubkey`])
//! - "ssh-rsa" ([`SSH_RSA_SHA1`], uses [`RsaPubkey`])
use base64::Engine as _;
use bytes::Bytes;
use derivative::Derivative;
use std::fmt;
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Result, Error};
pub use self::ecdsa::{ECDSA_SHA2_NISTP256, ECDSA_SHA2_NISTP384, EcdsaP256Pubkey, EcdsaP384Pubkey};
pub use self::ed25519::{SSH_ED25519, Ed25519Pubkey};
pub use self::rsa::{SSH_RSA_SHA1, RSA_SHA2_256, RSA_SHA2_512, RsaPubkey};

mod ecdsa;
mod ed25519;
mod rsa;

/// Algorithm for public key cryptography.
///
/// See the [module documentation][self] for details.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct PubkeyAlgo {
    /// Name of the algorithm.
    pub name: &'static str,
    #[derivative(Debug = "ignore")]
    pub(crate) verify: fn(pubkey: &Pubkey, message: &[u8], signature: Bytes) -> Result<SignatureVerified>,
}

impl PubkeyAlgo {
    /// Verifies an SSH signature blob of `message` with the public key.
    ///
    /// Returns [`Error::PubkeyFormat`] if the key cannot be used with this algorithm and
    /// [`Error::Signature`] if the signature is not valid.
    pub fn verify(&self, pubkey: &Pubkey, message: &[u8], signature: Bytes) -> Result<()> {
        (self.verify)(pubkey, message, signature).map(|_| ())
    }
}

/// Public key in one of supported formats.
///
/// This enum is marked as `#[non_exhaustive]`, so we might add new variants without breaking
/// backwards compatibility.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Pubkey {
    /// Ed25519 public key.
    Ed25519(Ed25519Pubkey),
    /// RSA public key.
    Rsa(RsaPubkey),
    /// ECDSA public key on NIST P-256 curve.
    EcdsaP256(EcdsaP256Pubkey),
    /// ECDSA public key on NIST P-384 curve.
    EcdsaP384(EcdsaP384Pubkey),
}

impl Pubkey {
    /// Names of all public key algorithms that work with this key, most secure first.
    ///
    /// Most key types work with just a single public key algorithm, but with RSA keys
    /// ([`Pubkey::Rsa`]), there are multiple algorithms that differ in the hash function.
    pub fn algo_names(&self) -> &'static [&'static str] {
        match self {
            Pubkey::Ed25519(_) => &["ssh-ed25519"],
            Pubkey::Rsa(_) => &["rsa-sha2-512", "rsa-sha2-256", "ssh-rsa"],
            Pubkey::EcdsaP256(_) => &["ecdsa-sha2-nistp256"],
            Pubkey::EcdsaP384(_) => &["ecdsa-sha2-nistp384"],
        }
    }

    /// Name of the key format, as used in the SSH encoding of the key and in `known_hosts`.
    pub fn type_str(&self) -> &'static str {
        match self {
            Pubkey::Ed25519(_) => "ssh-ed25519",
            Pubkey::Rsa(_) => "ssh-rsa",
            Pubkey::EcdsaP256(_) => "ecdsa-sha2-nistp256",
            Pubkey::EcdsaP384(_) => "ecdsa-sha2-nistp384",
        }
    }

    /// Decode a public key from SSH wire encoding.
    ///
    /// This is the encoding initially defined by RFC 4253. For keys other than RSA, the encoding
    /// is defined in the RFC that introduces the key type.
    pub fn decode(blob: Bytes) -> Result<Self> {
        let mut blob = PacketDecode::new(blob);
        let format = blob.get_string()?;
        match format.as_str() {
            "ssh-ed25519" => ed25519::decode_pubkey(&mut blob).map(Pubkey::Ed25519),
            "ssh-rsa" => rsa::decode_pubkey(&mut blob).map(Pubkey::Rsa),
            "ecdsa-sha2-nistp256" => ecdsa::decode_p256(&mut blob).map(Pubkey::EcdsaP256),
            "ecdsa-sha2-nistp384" => ecdsa::decode_p384(&mut blob).map(Pubkey::EcdsaP384),
            _ => {
                log::debug!("unknown pubkey format {:?}", format);
                Err(Error::Decode("unknown public key format"))
            },
        }
    }

    /// Encode a public key into SSH encoding.
    pub fn encode(&self) -> Bytes {
        let mut blob = PacketEncode::new();
        match self {
            Pubkey::Ed25519(pubkey) => ed25519::encode_pubkey(&mut blob, pubkey),
            Pubkey::Rsa(pubkey) => rsa::encode_pubkey(&mut blob, pubkey),
            Pubkey::EcdsaP256(pubkey) => ecdsa::encode_p256(&mut blob, pubkey),
            Pubkey::EcdsaP384(pubkey) => ecdsa::encode_p384(&mut blob, pubkey),
        }
        blob.finish()
    }

    /// Compute a fingerprint of the public key.
    ///
    /// The fingerprint is in the SHA-256 digest of the public key encoded with base64 (not padded
    /// with `=` characters) and prefixed with `SHA256:` (e.g.
    /// `"SHA256:eaBPG/rqx+IPa0Lc9KHypkG3UxjmUwerwq9CZ/xpPWM"`).
    pub fn fingerprint(&self) -> String {
        use sha2::Digest as _;
        let digest = sha2::Sha256::digest(self.encode());
        format!("SHA256:{}", base64::engine::general_purpose::STANDARD_NO_PAD.encode(digest))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Pubkey::Ed25519(pubkey) => fmt::Display::fmt(pubkey, f),
            Pubkey::Rsa(pubkey) => fmt::Display::fmt(pubkey, f),
            Pubkey::EcdsaP256(pubkey) => fmt::Display::fmt(pubkey, f),
            Pubkey::EcdsaP384(pubkey) => fmt::Display::fmt(pubkey, f),
        }
    }
}

#[derive(Debug)]
pub(crate) struct SignatureVerified(());

impl SignatureVerified {
    fn assertion() -> Self { Self(()) }
}

/// Reads the algorithm name from a signature blob and checks that it matches `algo_name`.
fn decode_signature(signature: Bytes, algo_name: &str) -> Result<PacketDecode> {
    let mut signature = PacketDecode::new(signature);
    if signature.get_string()? != algo_name {
        return Err(Error::Decode("unexpected signature format"))
    }
    Ok(signature)
}
