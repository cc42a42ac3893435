use bytes::Bytes;
use ecdsa::signature::Verifier as _;
use p256::elliptic_curve::sec1::ToEncodedPoint as _;
use std::fmt;
use crate::codec::{PacketDecode, PacketEncode};
use crate::error::{Result, Error};
use super::{PubkeyAlgo, Pubkey, SignatureVerified};

/// "ecdsa-sha2-nistp256" public key algorithm from RFC 5656.
///
/// This algorithm is compatible with [`EcdsaP256Pubkey`].
pub static ECDSA_SHA2_NISTP256: PubkeyAlgo = PubkeyAlgo {
    name: "ecdsa-sha2-nistp256",
    verify: verify_p256,
};

/// "ecdsa-sha2-nistp384" public key algorithm from RFC 5656.
///
/// This algorithm is compatible with [`EcdsaP384Pubkey`].
pub static ECDSA_SHA2_NISTP384: PubkeyAlgo = PubkeyAlgo {
    name: "ecdsa-sha2-nistp384",
    verify: verify_p384,
};

/// ECDSA public key on the NIST P-256 curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaP256Pubkey {
    verifying: p256::ecdsa::VerifyingKey,
}

/// ECDSA public key on the NIST P-384 curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcdsaP384Pubkey {
    verifying: p384::ecdsa::VerifyingKey,
}

fn verify_p256(pubkey: &Pubkey, message: &[u8], signature: Bytes) -> Result<SignatureVerified> {
    let Pubkey::EcdsaP256(pubkey) = pubkey else { return Err(Error::PubkeyFormat) };
    let (r, s) = decode_scalars(signature, "ecdsa-sha2-nistp256", 32)?;
    let ecdsa_signature = p256::ecdsa::Signature::from_scalars(
        *p256::FieldBytes::from_slice(&r), *p256::FieldBytes::from_slice(&s),
    ).map_err(|_| Error::Signature)?;

    match pubkey.verifying.verify(message, &ecdsa_signature) {
        Ok(_) => Ok(SignatureVerified::assertion()),
        Err(_) => Err(Error::Signature),
    }
}

fn verify_p384(pubkey: &Pubkey, message: &[u8], signature: Bytes) -> Result<SignatureVerified> {
    let Pubkey::EcdsaP384(pubkey) = pubkey else { return Err(Error::PubkeyFormat) };
    let (r, s) = decode_scalars(signature, "ecdsa-sha2-nistp384", 48)?;
    let ecdsa_signature = p384::ecdsa::Signature::from_scalars(
        *p384::FieldBytes::from_slice(&r), *p384::FieldBytes::from_slice(&s),
    ).map_err(|_| Error::Signature)?;

    match pubkey.verifying.verify(message, &ecdsa_signature) {
        Ok(_) => Ok(SignatureVerified::assertion()),
        Err(_) => Err(Error::Signature),
    }
}

/// Decodes `r` and `s` from the signature blob (RFC 5656, section 3.1.2), padded to `len` bytes.
fn decode_scalars(signature: Bytes, algo_name: &str, len: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut signature = super::decode_signature(signature, algo_name)?;
    let mut signature_blob = PacketDecode::new(signature.get_bytes()?);
    let r = signature_blob.get_scalar(len)?;
    let s = signature_blob.get_scalar(len)?;
    Ok((r, s))
}

pub(super) fn decode_p256(blob: &mut PacketDecode) -> Result<EcdsaP256Pubkey> {
    let point = decode_point(blob, "nistp256")?;
    let verifying = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point)
        .map_err(|_| Error::Decode("ecdsa-sha2-nistp256 public key is not valid"))?;
    Ok(EcdsaP256Pubkey { verifying })
}

pub(super) fn decode_p384(blob: &mut PacketDecode) -> Result<EcdsaP384Pubkey> {
    let point = decode_point(blob, "nistp384")?;
    let verifying = p384::ecdsa::VerifyingKey::from_sec1_bytes(&point)
        .map_err(|_| Error::Decode("ecdsa-sha2-nistp384 public key is not valid"))?;
    Ok(EcdsaP384Pubkey { verifying })
}

fn decode_point(blob: &mut PacketDecode, curve_name: &str) -> Result<Bytes> {
    // RFC 5656, section 3.1
    if blob.get_string()? != curve_name {
        return Err(Error::Decode("ecdsa public key has unexpected curve identifier"))
    }
    blob.get_bytes()
}

pub(super) fn encode_p256(blob: &mut PacketEncode, pubkey: &EcdsaP256Pubkey) {
    blob.put_str("ecdsa-sha2-nistp256");
    blob.put_str("nistp256");
    blob.put_bytes(p256::PublicKey::from(&pubkey.verifying).to_encoded_point(false).as_bytes());
}

pub(super) fn encode_p384(blob: &mut PacketEncode, pubkey: &EcdsaP384Pubkey) {
    blob.put_str("ecdsa-sha2-nistp384");
    blob.put_str("nistp384");
    blob.put_bytes(p384::PublicKey::from(&pubkey.verifying).to_encoded_point(false).as_bytes());
}

impl From<p256::ecdsa::VerifyingKey> for EcdsaP256Pubkey {
    fn from(verifying: p256::ecdsa::VerifyingKey) -> Self { Self { verifying } }
}

impl From<p384::ecdsa::VerifyingKey> for EcdsaP384Pubkey {
    fn from(verifying: p384::ecdsa::VerifyingKey) -> Self { Self { verifying } }
}

impl fmt::Display for EcdsaP256Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let point = p256::PublicKey::from(&self.verifying).to_encoded_point(false);
        write!(f, "ecdsa-sha2-nistp256 {:x}", Bytes::copy_from_slice(point.as_bytes()))
    }
}

impl fmt::Display for EcdsaP384Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let point = p384::PublicKey::from(&self.verifying).to_encoded_point(false);
        write!(f, "ecdsa-sha2-nistp384 {:x}", Bytes::copy_from_slice(point.as_bytes()))
    }
}
