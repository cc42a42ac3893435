use derivative::Derivative;
use crate::cipher::CipherAlgo;
use crate::codec::PacketEncode;
use crate::kex::HashAlgo;
use crate::mac::MacAlgo;

/// Number of bytes to derive for one direction of the connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct KeyLengths {
    /// Length of the initialization vector.
    pub iv_len: usize,
    /// Length of the encryption key.
    pub cipher_key_len: usize,
    /// Length of the MAC key.
    pub mac_key_len: usize,
}

impl KeyLengths {
    /// Lengths required by the cipher and MAC.
    pub fn for_algos(cipher: &CipherAlgo, mac: &MacAlgo) -> KeyLengths {
        KeyLengths { iv_len: cipher.iv_len, cipher_key_len: cipher.key_len, mac_key_len: mac.key_len }
    }
}

/// The six keys derived from a key exchange (RFC 4253, section 7.2).
#[derive(Derivative, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct KeyMaterial {
    /// Initial IV client to server ("A").
    #[derivative(Debug = "ignore")]
    pub iv_cts: Vec<u8>,
    /// Initial IV server to client ("B").
    #[derivative(Debug = "ignore")]
    pub iv_stc: Vec<u8>,
    /// Encryption key client to server ("C").
    #[derivative(Debug = "ignore")]
    pub cipher_key_cts: Vec<u8>,
    /// Encryption key server to client ("D").
    #[derivative(Debug = "ignore")]
    pub cipher_key_stc: Vec<u8>,
    /// Integrity key client to server ("E").
    #[derivative(Debug = "ignore")]
    pub mac_key_cts: Vec<u8>,
    /// Integrity key server to client ("F").
    #[derivative(Debug = "ignore")]
    pub mac_key_stc: Vec<u8>,
}

impl KeyMaterial {
    /// Derives all keys from the shared secret `K` (as unsigned big endian), the exchange hash `H`
    /// and the session identifier.
    pub fn derive(
        hash: HashAlgo,
        exchange_hash: &[u8],
        shared_secret_be: &[u8],
        session_id: &[u8],
        cts: KeyLengths,
        stc: KeyLengths,
    ) -> KeyMaterial {
        let key = |key_type: u8, key_len: usize| {
            derive_key(hash, exchange_hash, shared_secret_be, session_id, key_type, key_len)
        };
        KeyMaterial {
            iv_cts: key(b'A', cts.iv_len),
            iv_stc: key(b'B', stc.iv_len),
            cipher_key_cts: key(b'C', cts.cipher_key_len),
            cipher_key_stc: key(b'D', stc.cipher_key_len),
            mac_key_cts: key(b'E', cts.mac_key_len),
            mac_key_stc: key(b'F', stc.mac_key_len),
        }
    }
}

fn derive_key(
    hash: HashAlgo,
    exchange_hash: &[u8],
    shared_secret_be: &[u8],
    session_id: &[u8],
    key_type: u8,
    key_len: usize,
) -> Vec<u8> {
    // RFC 4253, section 7.2
    let mut to_hash_prefix = PacketEncode::new();
    to_hash_prefix.put_mpint_uint_be(shared_secret_be);
    to_hash_prefix.put_raw(exchange_hash);

    let mut key = {
        let mut to_hash = to_hash_prefix.clone();
        to_hash.put_u8(key_type);
        to_hash.put_raw(session_id);
        hash.digest(&to_hash.finish())
    };

    while key.len() < key_len {
        let mut to_hash = to_hash_prefix.clone();
        to_hash.put_raw(&key);
        key.extend_from_slice(&hash.digest(&to_hash.finish()));
    }

    key.truncate(key_len);
    key
}
