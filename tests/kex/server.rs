//! Simulated SSH server that runs the server side of the key exchange.
use bytes::Bytes;
use ed25519_dalek::Signer as _;
use hex_literal::hex;
use makiko_kex::{AlgoWishList, KexInit, PacketDecode, PacketEncode};
use makiko_kex::codes::msg;
use num_bigint_dig::BigUint;
use p256::elliptic_curve::sec1::ToEncodedPoint as _;
use rand::{RngCore as _, SeedableRng as _};
use rand_chacha::ChaCha8Rng;
use sha1::Digest as _;

pub const CLIENT_IDENT: &[u8] = b"SSH-2.0-makiko_kex_test";
pub const SERVER_IDENT: &[u8] = b"SSH-2.0-OpenSSH_9.0";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Method {
    Curve25519,
    Nist(NistCurve),
    Group1,
    Group14,
    GroupExchange,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum NistCurve {
    P256,
    P384,
    P521,
}

pub struct Server {
    pub algos: AlgoWishList,
    pub first_kex_packet_follows: bool,
    pub sign_wrong_hash: bool,
    host_key: ed25519_dalek::SigningKey,
    rng: ChaCha8Rng,
    kex_init: Option<Bytes>,
    client_kex_init: Option<Bytes>,
    method: Option<Method>,
    gex_request: Option<Vec<u32>>,
    pub exchange_hashes: Vec<Vec<u8>>,
    pub new_keys_recvd: u32,
}

impl Server {
    pub fn new(algos: AlgoWishList) -> Server {
        Server {
            algos,
            first_kex_packet_follows: false,
            sign_wrong_hash: false,
            host_key: ed25519_dalek::SigningKey::from_bytes(&hex!(
                "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60")),
            rng: ChaCha8Rng::seed_from_u64(1234),
            kex_init: None,
            client_kex_init: None,
            method: None,
            gex_request: None,
            exchange_hashes: Vec::new(),
            new_keys_recvd: 0,
        }
    }

    /// SSH encoding of the host key.
    pub fn host_key_blob(&self) -> Bytes {
        let mut blob = PacketEncode::new();
        blob.put_str("ssh-ed25519");
        blob.put_bytes(self.host_key.verifying_key().as_bytes());
        blob.finish()
    }

    /// Starts a new key exchange and returns our `SSH_MSG_KEXINIT`.
    pub fn kex_init(&mut self) -> Bytes {
        let mut cookie = [0; 16];
        self.rng.fill_bytes(&mut cookie);

        let mut payload = PacketEncode::new();
        payload.put_u8(msg::KEXINIT);
        payload.put_raw(&cookie);
        for category in makiko_kex::Category::ALL {
            payload.put_name_list(self.algos.list(category));
        }
        payload.put_bool(self.first_kex_packet_follows);
        payload.put_u32(0);
        let payload = payload.finish();

        self.kex_init = Some(payload.clone());
        self.client_kex_init = None;
        self.method = None;
        self.gex_request = None;
        payload
    }

    /// Handles a message from the client and returns our responses.
    pub fn recv(&mut self, payload: Bytes) -> Vec<Bytes> {
        let mut decode = PacketDecode::new(payload.clone());
        let msg_id = decode.get_u8().unwrap();
        match (msg_id, self.method) {
            (msg::KEXINIT, _) => {
                let client_kex_init = KexInit::decode(&mut decode).unwrap();
                let mut responses = Vec::new();
                if self.kex_init.is_none() {
                    responses.push(self.kex_init());
                }
                let server_algos = self.algos.clone();
                let negotiated = makiko_kex::negotiate::negotiate(&client_kex_init.algos, &server_algos)
                    .expect("server could not negotiate");
                self.method = Some(match negotiated.kex.as_str() {
                    "curve25519-sha256" | "curve25519-sha256@libssh.org" => Method::Curve25519,
                    "ecdh-sha2-nistp256" => Method::Nist(NistCurve::P256),
                    "ecdh-sha2-nistp384" => Method::Nist(NistCurve::P384),
                    "ecdh-sha2-nistp521" => Method::Nist(NistCurve::P521),
                    "diffie-hellman-group1-sha1" => Method::Group1,
                    "diffie-hellman-group14-sha1" => Method::Group14,
                    "diffie-hellman-group-exchange-sha256" => Method::GroupExchange,
                    name => panic!("server does not implement {:?}", name),
                });
                self.client_kex_init = Some(payload);
                responses
            },
            (msg::NEWKEYS, _) => {
                self.new_keys_recvd += 1;
                self.kex_init = None;
                Vec::new()
            },
            (msg::KEX_ECDH_INIT, Some(Method::Curve25519)) => {
                let client_eph_pubkey = decode.get_bytes().unwrap();
                self.reply_curve25519(&client_eph_pubkey)
            },
            (msg::KEX_ECDH_INIT, Some(Method::Nist(curve))) => {
                let client_eph_pubkey = decode.get_bytes().unwrap();
                self.reply_nist(curve, &client_eph_pubkey)
            },
            (msg::KEXDH_INIT, Some(Method::Group1)) => {
                let e = decode.get_biguint().unwrap();
                self.reply_dh(msg::KEXDH_REPLY, &e, oakley_group_2(), None)
            },
            (msg::KEXDH_INIT, Some(Method::Group14)) => {
                let e = decode.get_biguint().unwrap();
                self.reply_dh(msg::KEXDH_REPLY, &e, oakley_group_14(), None)
            },
            (msg::KEX_DH_GEX_REQUEST, Some(Method::GroupExchange)) => {
                let min = decode.get_u32().unwrap();
                let n = decode.get_u32().unwrap();
                let max = decode.get_u32().unwrap();
                self.gex_request = Some(vec![min, n, max]);
                vec![gex_group()]
            },
            (msg::KEX_DH_GEX_REQUEST_OLD, Some(Method::GroupExchange)) => {
                let n = decode.get_u32().unwrap();
                self.gex_request = Some(vec![n]);
                vec![gex_group()]
            },
            (msg::KEX_DH_GEX_INIT, Some(Method::GroupExchange)) => {
                let e = decode.get_biguint().unwrap();
                let request = self.gex_request.clone().expect("GEX_INIT before GEX_REQUEST");
                self.reply_dh(msg::KEX_DH_GEX_REPLY, &e, oakley_group_2(), Some(request))
            },
            (msg_id, method) => panic!("server received unexpected message {} in {:?}", msg_id, method),
        }
    }

    fn hash_prefix(&self) -> PacketEncode {
        let mut data = PacketEncode::new();
        data.put_bytes(CLIENT_IDENT);
        data.put_bytes(SERVER_IDENT);
        data.put_bytes(self.client_kex_init.as_ref().unwrap());
        data.put_bytes(self.kex_init.as_ref().unwrap());
        data.put_bytes(&self.host_key_blob());
        data
    }

    fn reply_curve25519(&mut self, client_eph_pubkey: &[u8]) -> Vec<Bytes> {
        let client_eph_pubkey: [u8; 32] = client_eph_pubkey.try_into().unwrap();
        let our_privkey = x25519_dalek::EphemeralSecret::random_from_rng(&mut self.rng);
        let our_pubkey = x25519_dalek::PublicKey::from(&our_privkey);
        let shared_secret = our_privkey.diffie_hellman(&x25519_dalek::PublicKey::from(client_eph_pubkey));

        let mut data = self.hash_prefix();
        data.put_bytes(&client_eph_pubkey);
        data.put_bytes(our_pubkey.as_bytes());
        data.put_mpint_uint_be(shared_secret.as_bytes());
        let exchange_hash = sha2::Sha256::digest(data.finish()).to_vec();

        self.reply(msg::KEX_ECDH_REPLY, |reply| reply.put_bytes(our_pubkey.as_bytes()), exchange_hash)
    }

    fn reply_nist(&mut self, curve: NistCurve, client_eph_pubkey: &[u8]) -> Vec<Bytes> {
        let (our_pubkey, shared_secret) = match curve {
            NistCurve::P256 => {
                let our_privkey = p256::ecdh::EphemeralSecret::random(&mut self.rng);
                let client_pubkey = p256::PublicKey::from_sec1_bytes(client_eph_pubkey).unwrap();
                (our_privkey.public_key().to_encoded_point(false).as_bytes().to_vec(),
                    our_privkey.diffie_hellman(&client_pubkey).raw_secret_bytes().to_vec())
            },
            NistCurve::P384 => {
                let our_privkey = p384::ecdh::EphemeralSecret::random(&mut self.rng);
                let client_pubkey = p384::PublicKey::from_sec1_bytes(client_eph_pubkey).unwrap();
                (our_privkey.public_key().to_encoded_point(false).as_bytes().to_vec(),
                    our_privkey.diffie_hellman(&client_pubkey).raw_secret_bytes().to_vec())
            },
            NistCurve::P521 => {
                let our_privkey = p521::ecdh::EphemeralSecret::random(&mut self.rng);
                let client_pubkey = p521::PublicKey::from_sec1_bytes(client_eph_pubkey).unwrap();
                (our_privkey.public_key().to_encoded_point(false).as_bytes().to_vec(),
                    our_privkey.diffie_hellman(&client_pubkey).raw_secret_bytes().to_vec())
            },
        };

        // Q_C and Q_S are SEC1 strings, K is the x-coordinate as mpint
        let mut data = self.hash_prefix();
        data.put_bytes(client_eph_pubkey);
        data.put_bytes(&our_pubkey);
        data.put_biguint(&BigUint::from_bytes_be(&shared_secret));
        let data = data.finish();
        let exchange_hash = match curve {
            NistCurve::P256 => sha2::Sha256::digest(&data).to_vec(),
            NistCurve::P384 => sha2::Sha384::digest(&data).to_vec(),
            NistCurve::P521 => sha2::Sha512::digest(&data).to_vec(),
        };

        self.reply(msg::KEX_ECDH_REPLY, |reply| reply.put_bytes(&our_pubkey), exchange_hash)
    }

    fn reply_dh(&mut self, msg_id: u8, e: &BigUint, (p, g): (BigUint, BigUint), gex_request: Option<Vec<u32>>) -> Vec<Bytes> {
        let mut y_bytes = [0; 32];
        self.rng.fill_bytes(&mut y_bytes);
        let y = BigUint::from_bytes_be(&y_bytes);
        let f = g.modpow(&y, &p);
        let k = e.modpow(&y, &p);

        let mut data = self.hash_prefix();
        let exchange_hash = match gex_request {
            Some(request) => {
                for len in request {
                    data.put_u32(len);
                }
                data.put_biguint(&p);
                data.put_biguint(&g);
                data.put_biguint(e);
                data.put_biguint(&f);
                data.put_biguint(&k);
                sha2::Sha256::digest(data.finish()).to_vec()
            },
            None => {
                data.put_biguint(e);
                data.put_biguint(&f);
                data.put_biguint(&k);
                sha1::Sha1::digest(data.finish()).to_vec()
            },
        };

        self.reply(msg_id, |reply| reply.put_biguint(&f), exchange_hash)
    }

    /// Signs the exchange hash and returns the reply followed by `SSH_MSG_NEWKEYS`.
    fn reply(&mut self, msg_id: u8, put_eph_pubkey: impl FnOnce(&mut PacketEncode), exchange_hash: Vec<u8>) -> Vec<Bytes> {
        let mut reply = PacketEncode::new();
        reply.put_u8(msg_id);
        reply.put_bytes(&self.host_key_blob());
        put_eph_pubkey(&mut reply);
        reply.put_bytes(&self.sign(&exchange_hash));
        self.exchange_hashes.push(exchange_hash);
        vec![reply.finish(), new_keys()]
    }

    fn sign(&self, exchange_hash: &[u8]) -> Bytes {
        let signature = if self.sign_wrong_hash {
            self.host_key.sign(b"this is not the exchange hash")
        } else {
            self.host_key.sign(exchange_hash)
        };
        let mut blob = PacketEncode::new();
        blob.put_str("ssh-ed25519");
        blob.put_bytes(&signature.to_bytes());
        blob.finish()
    }
}

fn new_keys() -> Bytes {
    Bytes::from_static(&[msg::NEWKEYS])
}

fn gex_group() -> Bytes {
    let (p, g) = oakley_group_2();
    let mut payload = PacketEncode::new();
    payload.put_u8(msg::KEX_DH_GEX_GROUP);
    payload.put_biguint(&p);
    payload.put_biguint(&g);
    payload.finish()
}

fn oakley_group_2() -> (BigUint, BigUint) {
    let p = BigUint::from_bytes_be(&hex!(
        "FFFFFFFF" "FFFFFFFF" "C90FDAA2" "2168C234" "C4C6628B" "80DC1CD1"
        "29024E08" "8A67CC74" "020BBEA6" "3B139B22" "514A0879" "8E3404DD"
        "EF9519B3" "CD3A431B" "302B0A6D" "F25F1437" "4FE1356D" "6D51C245"
        "E485B576" "625E7EC6" "F44C42E9" "A637ED6B" "0BFF5CB6" "F406B7ED"
        "EE386BFB" "5A899FA5" "AE9F2411" "7C4B1FE6" "49286651" "ECE65381"
        "FFFFFFFF" "FFFFFFFF"
    ));
    (p, BigUint::from(2u32))
}

fn oakley_group_14() -> (BigUint, BigUint) {
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
    (p, BigUint::from(2u32))
}
