use bytes::Bytes;
use num_bigint_dig::BigUint;
use crate::codec::{PacketDecode, PacketEncode};
use crate::codes::msg;
use crate::config::GexParams;
use crate::error::{Error, Result};
use crate::util::CryptoRngCore;
use super::dh::{DhKeypair, Group};
use super::{HashAlgo, KexInput, KexOutput, KexReply};

/// Diffie-Hellman group exchange (RFC 4419).
///
/// The server chooses the group based on the bit lengths that we request, so the exchange has
/// one more round trip than the fixed-group methods.
#[derive(Debug)]
pub(crate) struct GexKex {
    hash: HashAlgo,
    params: GexParams,
    keypair: Option<DhKeypair>,
}

impl GexKex {
    pub fn new(params: GexParams, hash: HashAlgo) -> GexKex {
        GexKex { hash, params, keypair: None }
    }

    pub fn hash_algo(&self) -> HashAlgo {
        self.hash
    }

    pub fn send_request(&self) -> Bytes {
        // RFC 4419, section 3 and 5
        let mut payload = PacketEncode::new();
        if self.params.is_legacy() {
            payload.put_u8(msg::KEX_DH_GEX_REQUEST_OLD);
            payload.put_u32(self.params.preferred_group_len);
            log::debug!("sending SSH_MSG_KEX_DH_GEX_REQUEST_OLD ({} bits)",
                self.params.preferred_group_len);
        } else {
            payload.put_u8(msg::KEX_DH_GEX_REQUEST);
            payload.put_u32(self.params.min_group_len);
            payload.put_u32(self.params.preferred_group_len);
            payload.put_u32(self.params.max_group_len);
            log::debug!("sending SSH_MSG_KEX_DH_GEX_REQUEST ({}, {}, {} bits)",
                self.params.min_group_len, self.params.preferred_group_len, self.params.max_group_len);
        }
        payload.finish()
    }

    /// Handles `SSH_MSG_KEX_DH_GEX_GROUP` and returns the `SSH_MSG_KEX_DH_GEX_INIT` payload.
    pub fn recv_group(&mut self, payload: &mut PacketDecode, rng: &mut dyn CryptoRngCore) -> Result<Bytes> {
        if self.keypair.is_some() {
            return Err(Error::Protocol("received duplicate SSH_MSG_KEX_DH_GEX_GROUP"))
        }

        let p = payload.get_biguint()?;
        let g = payload.get_biguint()?;
        check_group(&self.params, &p, &g)?;
        log::debug!("received SSH_MSG_KEX_DH_GEX_GROUP ({} bits)", p.bits());

        let keypair = DhKeypair::generate(Group::new(p, g), rng);
        let mut init = PacketEncode::new();
        init.put_u8(msg::KEX_DH_GEX_INIT);
        init.put_biguint(&keypair.our_eph_pubkey);
        self.keypair = Some(keypair);
        log::debug!("sending SSH_MSG_KEX_DH_GEX_INIT");
        Ok(init.finish())
    }

    pub fn recv_reply(&mut self, payload: &mut PacketDecode) -> Result<KexReply> {
        let keypair = self.keypair.as_mut()
            .ok_or(Error::Protocol("received SSH_MSG_KEX_DH_GEX_REPLY before the group"))?;
        if keypair.server_eph_pubkey.is_some() {
            return Err(Error::Protocol("received duplicate SSH_MSG_KEX_DH_GEX_REPLY"))
        }

        // RFC 4419, section 3
        let server_pubkey = payload.get_bytes()?;
        let server_eph_pubkey = payload.get_biguint()?;
        let server_exchange_hash_sign = payload.get_bytes()?;

        keypair.set_server_eph_pubkey(server_eph_pubkey)?;
        log::debug!("received SSH_MSG_KEX_DH_GEX_REPLY");
        Ok(KexReply { server_pubkey, server_exchange_hash_sign })
    }

    pub fn exchange(&self, input: &KexInput) -> Result<KexOutput> {
        let keypair = self.keypair.as_ref()
            .ok_or(Error::Protocol("group exchange has not received the group"))?;
        let shared_secret = keypair.shared_secret()?;
        let server_eph_pubkey = keypair.server_eph_pubkey.as_ref()
            .ok_or(Error::Protocol("Diffie-Hellman public key of the server is missing"))?;

        // RFC 4419, section 3
        let mut exchange_data = PacketEncode::new();
        input.put_prefix(&mut exchange_data);
        if self.params.is_legacy() {
            exchange_data.put_u32(self.params.preferred_group_len);
        } else {
            exchange_data.put_u32(self.params.min_group_len);
            exchange_data.put_u32(self.params.preferred_group_len);
            exchange_data.put_u32(self.params.max_group_len);
        }
        exchange_data.put_biguint(&keypair.group.p);
        exchange_data.put_biguint(&keypair.group.g);
        exchange_data.put_biguint(&keypair.our_eph_pubkey);
        exchange_data.put_biguint(server_eph_pubkey);
        exchange_data.put_biguint(&shared_secret);
        let exchange_hash = self.hash.digest(&exchange_data.finish());

        Ok(KexOutput { shared_secret_be: shared_secret.to_bytes_be(), exchange_hash })
    }
}

fn check_group(params: &GexParams, p: &BigUint, g: &BigUint) -> Result<()> {
    let bits = p.bits();
    let (min_bits, max_bits) = if params.is_legacy() {
        (GexParams::MIN_ALLOWED_LEN, GexParams::MAX_ALLOWED_LEN)
    } else {
        (params.min_group_len, params.max_group_len)
    };

    if bits < min_bits as usize || bits > max_bits as usize {
        return Err(Error::Protocol("server sent a group with a modulus of unacceptable size"))
    }
    if *g <= BigUint::from(1u32) || *g >= p - BigUint::from(1u32) {
        return Err(Error::Protocol("server sent a group with an invalid generator"))
    }
    Ok(())
}
