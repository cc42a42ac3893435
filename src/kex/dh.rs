use bytes::Bytes;
use derivative::Derivative;
use hex_literal::hex;
use num_bigint_dig::{BigUint, RandBigInt as _};
use crate::codec::{PacketDecode, PacketEncode};
use crate::codes::msg;
use crate::error::{Error, Result};
use crate::util::CryptoRngCore;
use super::{HashAlgo, KexInput, KexOutput, KexReply};

/// Diffie-Hellman group: a prime modulus `p` and a generator `g`.
#[derive(Debug, Clone)]
pub(crate) struct Group {
    pub g: BigUint,
    pub p: BigUint,
    pub p_minus_1: BigUint,
}

/// Fixed group used by the "diffie-hellman-groupN-*" methods.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum FixedGroup {
    /// Oakley group 2 (1024 bits), used by "diffie-hellman-group1-sha1".
    Group1,
    /// Group 14 (2048 bits) from RFC 3526.
    Group14,
}

impl FixedGroup {
    pub fn group(self) -> Group {
        match self {
            FixedGroup::Group1 => Group::group_2(),
            FixedGroup::Group14 => Group::group_14(),
        }
    }
}

/// Ephemeral Diffie-Hellman keypair on a [`Group`] together with the server's public value.
///
/// This is shared by the fixed-group methods (RFC 4253, section 8) and by the group exchange
/// (RFC 4419), which differ only in how the group is obtained and which messages are used.
#[derive(Derivative)]
#[derivative(Debug)]
pub(crate) struct DhKeypair {
    pub group: Group,
    #[derivative(Debug = "ignore")]
    our_eph_privkey: BigUint,
    pub our_eph_pubkey: BigUint,
    pub server_eph_pubkey: Option<BigUint>,
}

impl DhKeypair {
    pub fn generate(group: Group, rng: &mut dyn CryptoRngCore) -> DhKeypair {
        let our_eph_privkey = rng.as_rngcore().gen_biguint_range(&BigUint::from(2u32), &group.p_minus_1);
        let our_eph_pubkey = (group.g).modpow(&our_eph_privkey, &group.p);
        DhKeypair { group, our_eph_privkey, our_eph_pubkey, server_eph_pubkey: None }
    }

    pub fn set_server_eph_pubkey(&mut self, server_eph_pubkey: BigUint) -> Result<()> {
        // RFC 8268, section 4
        if server_eph_pubkey <= BigUint::from(1u32) || server_eph_pubkey >= self.group.p_minus_1 {
            return Err(Error::Protocol("server sent invalid Diffie-Hellman ephemeral public key"))
        }
        self.server_eph_pubkey = Some(server_eph_pubkey);
        Ok(())
    }

    pub fn shared_secret(&self) -> Result<BigUint> {
        let server_eph_pubkey = self.server_eph_pubkey.as_ref()
            .ok_or(Error::Protocol("Diffie-Hellman public key of the server is missing"))?;
        Ok(server_eph_pubkey.modpow(&self.our_eph_privkey, &self.group.p))
    }
}

/// Fixed-group Diffie-Hellman key exchange (RFC 4253, section 8).
#[derive(Debug)]
pub(crate) struct DhKex {
    hash: HashAlgo,
    keypair: DhKeypair,
}

impl DhKex {
    pub fn new(group: FixedGroup, hash: HashAlgo, rng: &mut dyn CryptoRngCore) -> DhKex {
        let keypair = DhKeypair::generate(group.group(), rng);
        log::debug!("initialized Diffie-Hellman kex with {:?}", group);
        DhKex { hash, keypair }
    }

    pub fn hash_algo(&self) -> HashAlgo {
        self.hash
    }

    pub fn send_kexdh_init(&self) -> Bytes {
        // RFC 4253, section 8
        let mut payload = PacketEncode::new();
        payload.put_u8(msg::KEXDH_INIT);
        payload.put_biguint(&self.keypair.our_eph_pubkey);
        log::debug!("sending SSH_MSG_KEXDH_INIT");
        payload.finish()
    }

    pub fn recv_kexdh_reply(&mut self, payload: &mut PacketDecode) -> Result<KexReply> {
        if self.keypair.server_eph_pubkey.is_some() {
            return Err(Error::Protocol("received duplicate SSH_MSG_KEXDH_REPLY"))
        }

        // RFC 4253, section 8
        let server_pubkey = payload.get_bytes()?;
        let server_eph_pubkey = payload.get_biguint()?;
        let server_exchange_hash_sign = payload.get_bytes()?;

        self.keypair.set_server_eph_pubkey(server_eph_pubkey)?;
        log::debug!("received SSH_MSG_KEXDH_REPLY");
        Ok(KexReply { server_pubkey, server_exchange_hash_sign })
    }

    pub fn exchange(&self, input: &KexInput) -> Result<KexOutput> {
        let shared_secret = self.keypair.shared_secret()?;
        let server_eph_pubkey = self.keypair.server_eph_pubkey.as_ref()
            .ok_or(Error::Protocol("Diffie-Hellman public key of the server is missing"))?;

        let mut exchange_data = PacketEncode::new();
        input.put_prefix(&mut exchange_data);
        exchange_data.put_biguint(&self.keypair.our_eph_pubkey);
        exchange_data.put_biguint(server_eph_pubkey);
        exchange_data.put_biguint(&shared_secret);
        let exchange_hash = self.hash.digest(&exchange_data.finish());

        Ok(KexOutput { shared_secret_be: shared_secret.to_bytes_be(), exchange_hash })
    }
}

impl Group {
    pub fn new(p: BigUint, g: BigUint) -> Group {
        let p_minus_1 = &p - BigUint::from(1u32);
        Group { g, p, p_minus_1 }
    }

    pub(super) fn group_2() -> Group {
        // RFC 2409, section 6.2
        let g = BigUint::from(2u32);
        let p = BigUint::from_bytes_be(&hex!(
            "FFFFFFFF" "FFFFFFFF" "C90FDAA2" "2168C234" "C4C6628B" "80DC1CD1"
            "29024E08" "8A67CC74" "020BBEA6" "3B139B22" "514A0879" "8E3404DD"
            "EF9519B3" "CD3A431B" "302B0A6D" "F25F1437" "4FE1356D" "6D51C245"
            "E485B576" "625E7EC6" "F44C42E9" "A637ED6B" "0BFF5CB6" "F406B7ED"
            "EE386BFB" "5A899FA5" "AE9F2411" "7C4B1FE6" "49286651" "ECE65381"
            "FFFFFFFF" "FFFFFFFF"
        ));
        Group::new(p, g)
    }

    pub(super) fn group_14() -> Group {
        // RFC 3526, section 3
        let g = BigUint::from(2u32);
        let p = BigUint::from_bytes_be(&hex!(
            "FFFFFFFF" "FFFFFFFF" "C90FDAA2" "2168C234" "C4C6628B" "80DC1CD1"
            "29024E08" "8A67CC74" "020BBEA6" "3B139B22" "514A0879" "8E3404DD"
            "EF9519B3" "CD3A431B" "302B0A6D" "F25F1437" "4FE1356D" "6D51C245"
            "E485B576" "625E7EC6" "F44C42E9" "A637ED6B" "0BFF5CB6" "F406B7ED"
            "EE386BFB" "5A899FA5" "AE9F2411" "7C4B1FE6" "49286651" "ECE45B3D"
            "C2007CB8" "A163BF05" "98DA4836" "1C55D39A" "69163FA8" "FD24CF5F"
            "83655D23" "DCA3AD96" "1C62F356" "208552BB" "9ED52907" "7096966D"
            "670C354E" "4ABC9804" "F1746C08" "CA18217C" "32905E46" "2E36CE3B"
            "E39E772C" "180E8603" "9B2783A2" "EC07A28F" "B5C55DF0" "6F4C52C9"
            "DE2BCBF6" "95581718" "3995497C" "EA956AE5" "15D22618" "98FA0510"
            "15728E5A" "8AACAA68" "FFFFFFFF" "FFFFFFFF"
        ));
        Group::new(p, g)
    }

}
