use crate::cipher::{self, CipherAlgo};
use crate::mac::{self, MacAlgo};
use crate::pubkey::{self, PubkeyAlgo};

/// Table of algorithms that the key exchange can use.
///
/// The key exchange looks up host key algorithms here to verify the server's signature, and
/// cipher and MAC algorithms to find out how many bytes of keys to derive. The order of the lists
/// is the default order of preference in [`AlgoWishList`][crate::AlgoWishList].
///
/// You may remove algorithms from the [default][Default] registry, or add your own descriptors.
#[derive(Debug, Clone)]
pub struct AlgoRegistry {
    /// Supported [server public key algorithms][crate::pubkey].
    pub pubkey_algos: Vec<&'static PubkeyAlgo>,
    /// Supported [encryption algorithms][crate::cipher].
    pub cipher_algos: Vec<&'static CipherAlgo>,
    /// Supported [message authentication algorithms][crate::mac].
    pub mac_algos: Vec<&'static MacAlgo>,
}

impl Default for AlgoRegistry {
    fn default() -> Self {
        AlgoRegistry {
            pubkey_algos: vec![
                &pubkey::SSH_ED25519,
                &pubkey::ECDSA_SHA2_NISTP256, &pubkey::ECDSA_SHA2_NISTP384,
                &pubkey::RSA_SHA2_512, &pubkey::RSA_SHA2_256, &pubkey::SSH_RSA_SHA1,
            ],
            cipher_algos: vec![
                &cipher::AES128_CTR, &cipher::AES192_CTR, &cipher::AES256_CTR,
                &cipher::AES128_CBC, &cipher::AES192_CBC, &cipher::AES256_CBC,
                &cipher::TDES_CTR, &cipher::TDES_CBC,
            ],
            mac_algos: vec![
                &mac::HMAC_SHA2_256_ETM, &mac::HMAC_SHA2_512_ETM, &mac::HMAC_SHA1_ETM,
                &mac::HMAC_SHA2_256, &mac::HMAC_SHA2_512, &mac::HMAC_SHA1,
                &mac::HMAC_MD5, &mac::HMAC_SHA1_96, &mac::HMAC_MD5_96,
            ],
        }
    }
}

impl AlgoRegistry {
    /// Finds a host key algorithm by name.
    pub fn pubkey_algo(&self, name: &str) -> Option<&'static PubkeyAlgo> {
        self.pubkey_algos.iter().copied().find(|algo| algo.name == name)
    }

    /// Finds a cipher by name.
    ///
    /// The "none" cipher is always known, even though it is not listed in `cipher_algos`.
    pub fn cipher_algo(&self, name: &str) -> Option<&'static CipherAlgo> {
        if name == cipher::NONE.name {
            return Some(&cipher::NONE)
        }
        self.cipher_algos.iter().copied().find(|algo| algo.name == name)
    }

    /// Finds a MAC by name.
    ///
    /// The "none" MAC is always known, even though it is not listed in `mac_algos`.
    pub fn mac_algo(&self, name: &str) -> Option<&'static MacAlgo> {
        if name == mac::NONE.name {
            return Some(&mac::NONE)
        }
        self.mac_algos.iter().copied().find(|algo| algo.name == name)
    }

    /// Names of the host key algorithms in the order of preference.
    pub fn pubkey_algo_names(&self) -> Vec<&'static str> {
        self.pubkey_algos.iter().map(|algo| algo.name).collect()
    }

    /// Names of the ciphers in the order of preference.
    pub fn cipher_algo_names(&self) -> Vec<&'static str> {
        self.cipher_algos.iter().map(|algo| algo.name).collect()
    }

    /// Names of the MACs in the order of preference.
    pub fn mac_algo_names(&self) -> Vec<&'static str> {
        self.mac_algos.iter().map(|algo| algo.name).collect()
    }

    /// Mutate `self` in a closure.
    pub fn with<F: FnOnce(&mut Self)>(mut self, f: F) -> Self {
        f(&mut self);
        self
    }
}

/// Names of the host key algorithms in the [default registry][AlgoRegistry::default()].
pub fn default_host_key_algos() -> Vec<&'static str> {
    AlgoRegistry::default().pubkey_algo_names()
}
