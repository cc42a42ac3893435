use std::time::Duration;
use crate::error::{Error, Result};
use crate::kex;
use crate::negotiate::Category;
use crate::registry::AlgoRegistry;

/// Configuration of a [`KexManager`][crate::KexManager].
///
/// You should start from the [default][Default] instance, which has reasonable default
/// configuration, and modify it according to your needs. You may also find the method
/// [`KexConfig::with()`] syntactically convenient.
///
/// This struct is `#[non_exhaustive]`, so we may add more fields without breaking backward
/// compatibility.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct KexConfig {
    /// Algorithms that we offer for the first key exchange.
    ///
    /// Later exchanges use the wish list passed to
    /// [`KexManager::initiate()`][crate::KexManager::initiate()].
    pub wish_list: AlgoWishList,

    /// Group sizes that we request in the group exchange methods.
    pub gex_params: GexParams,

    /// Descriptors of host key, cipher and MAC algorithms.
    pub registry: AlgoRegistry,

    /// How long [`KexWaiter::wait_for_conn_info()`][crate::KexWaiter::wait_for_conn_info()]
    /// blocks before it fails with [`Error::Timeout`].
    ///
    /// By default, this is 20 minutes.
    pub wait_timeout: Duration,
}

impl Default for KexConfig {
    fn default() -> Self {
        let registry = AlgoRegistry::default();
        KexConfig {
            wish_list: AlgoWishList::from_registry(&registry),
            gex_params: GexParams::default(),
            registry,
            wait_timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl KexConfig {
    /// Mutate `self` in a closure.
    ///
    /// This method applies your closure to `self` and returns the mutated configuration.
    pub fn with<F: FnOnce(&mut Self)>(mut self, f: F) -> Self {
        f(&mut self);
        self
    }
}

/// Ordered lists of algorithm names that we offer in `SSH_MSG_KEXINIT`.
///
/// The first name in each list is the most preferred. The same type describes the lists received
/// from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct AlgoWishList {
    pub kex: Vec<String>,
    pub host_key: Vec<String>,
    pub cipher_cts: Vec<String>,
    pub cipher_stc: Vec<String>,
    pub mac_cts: Vec<String>,
    pub mac_stc: Vec<String>,
    pub compression_cts: Vec<String>,
    pub compression_stc: Vec<String>,
    pub language_cts: Vec<String>,
    pub language_stc: Vec<String>,
}

impl Default for AlgoWishList {
    fn default() -> Self {
        Self::from_registry(&AlgoRegistry::default())
    }
}

impl AlgoWishList {
    /// Wish list with all lists empty.
    pub fn empty() -> Self {
        AlgoWishList {
            kex: Vec::new(),
            host_key: Vec::new(),
            cipher_cts: Vec::new(),
            cipher_stc: Vec::new(),
            mac_cts: Vec::new(),
            mac_stc: Vec::new(),
            compression_cts: Vec::new(),
            compression_stc: Vec::new(),
            language_cts: Vec::new(),
            language_stc: Vec::new(),
        }
    }

    /// Wish list with all key exchange methods and all algorithms from the registry, without
    /// compression and languages.
    pub fn from_registry(registry: &AlgoRegistry) -> Self {
        fn names(names: Vec<&'static str>) -> Vec<String> {
            names.into_iter().map(String::from).collect()
        }

        let ciphers = names(registry.cipher_algo_names());
        let macs = names(registry.mac_algo_names());
        AlgoWishList {
            kex: names(kex::default_kex_algos()),
            host_key: names(registry.pubkey_algo_names()),
            cipher_cts: ciphers.clone(),
            cipher_stc: ciphers,
            mac_cts: macs.clone(),
            mac_stc: macs,
            compression_cts: vec!["none".into()],
            compression_stc: vec!["none".into()],
            language_cts: Vec::new(),
            language_stc: Vec::new(),
        }
    }

    /// The list for the given category.
    pub fn list(&self, category: Category) -> &[String] {
        match category {
            Category::Kex => &self.kex,
            Category::HostKey => &self.host_key,
            Category::CipherCts => &self.cipher_cts,
            Category::CipherStc => &self.cipher_stc,
            Category::MacCts => &self.mac_cts,
            Category::MacStc => &self.mac_stc,
            Category::CompressionCts => &self.compression_cts,
            Category::CompressionStc => &self.compression_stc,
            Category::LanguageCts => &self.language_cts,
            Category::LanguageStc => &self.language_stc,
        }
    }

    /// Mutable access to the list for the given category.
    pub fn list_mut(&mut self, category: Category) -> &mut Vec<String> {
        match category {
            Category::Kex => &mut self.kex,
            Category::HostKey => &mut self.host_key,
            Category::CipherCts => &mut self.cipher_cts,
            Category::CipherStc => &mut self.cipher_stc,
            Category::MacCts => &mut self.mac_cts,
            Category::MacStc => &mut self.mac_stc,
            Category::CompressionCts => &mut self.compression_cts,
            Category::CompressionStc => &mut self.compression_stc,
            Category::LanguageCts => &mut self.language_cts,
            Category::LanguageStc => &mut self.language_stc,
        }
    }

    /// Checks that we can use this wish list.
    ///
    /// Every kex method must be supported by this crate and every host key algorithm must be in
    /// the registry ([`Error::UnsupportedAlgo`]), and only the language lists may be empty
    /// ([`Error::InvalidConfig`]).
    pub fn validate(&self, registry: &AlgoRegistry) -> Result<()> {
        for category in Category::ALL {
            if !category.is_optional() && self.list(category).is_empty() {
                return Err(Error::InvalidConfig("algorithm list in the wish list is empty"))
            }
        }

        for name in self.kex.iter() {
            if kex::by_name(name).is_none() {
                return Err(Error::UnsupportedAlgo(name.clone()))
            }
        }

        for name in self.host_key.iter() {
            if registry.pubkey_algo(name).is_none() {
                return Err(Error::UnsupportedAlgo(name.clone()))
            }
        }

        Ok(())
    }

    /// Reduces the host key algorithms to those in `known_algos`, keeping our order.
    ///
    /// If none of our algorithms is known, the list is left unchanged.
    pub fn filter_host_key_algos(&mut self, known_algos: &[String]) {
        let filtered: Vec<String> = self.host_key.iter()
            .filter(|algo| known_algos.contains(*algo))
            .cloned()
            .collect();
        if !filtered.is_empty() {
            log::debug!("host key algorithms restricted to known algorithms {:?}", filtered);
            self.host_key = filtered;
        }
    }
}

/// Parameters of the Diffie-Hellman group exchange (RFC 4419).
///
/// We ask the server for a group with a modulus of `preferred_group_len` bits, and accept groups
/// between `min_group_len` and `max_group_len` bits. If `min_group_len` is zero, we use the old
/// form of the request that contains only the preferred length (see [`GexParams::legacy()`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GexParams {
    /// Minimal size of the modulus in bits.
    pub min_group_len: u32,
    /// Preferred size of the modulus in bits.
    pub preferred_group_len: u32,
    /// Maximal size of the modulus in bits.
    pub max_group_len: u32,
}

impl GexParams {
    /// Smallest group size that we allow (RFC 4419, section 3).
    pub const MIN_ALLOWED_LEN: u32 = 1024;
    /// Largest group size that we allow (RFC 4419, section 3).
    pub const MAX_ALLOWED_LEN: u32 = 8192;

    /// Parameters for the `SSH_MSG_KEX_DH_GEX_REQUEST` message.
    pub fn new(min_group_len: u32, preferred_group_len: u32, max_group_len: u32) -> Self {
        GexParams { min_group_len, preferred_group_len, max_group_len }
    }

    /// Parameters for the old `SSH_MSG_KEX_DH_GEX_REQUEST_OLD` message with just the preferred
    /// size.
    ///
    /// The old request carries no bounds, so the server may answer with any group between
    /// [`MIN_ALLOWED_LEN`][Self::MIN_ALLOWED_LEN] and [`MAX_ALLOWED_LEN`][Self::MAX_ALLOWED_LEN]
    /// bits, regardless of `preferred_group_len`.
    pub fn legacy(preferred_group_len: u32) -> Self {
        GexParams { min_group_len: 0, preferred_group_len, max_group_len: 0 }
    }

    /// Is this the old form of the request?
    pub fn is_legacy(&self) -> bool {
        self.min_group_len == 0
    }

    /// Checks that the sizes are in order and in the allowed range.
    pub fn validate(&self) -> Result<()> {
        let in_range = |len: u32| (Self::MIN_ALLOWED_LEN..=Self::MAX_ALLOWED_LEN).contains(&len);
        if self.is_legacy() {
            if !in_range(self.preferred_group_len) {
                return Err(Error::InvalidConfig("preferred group length is out of range"))
            }
        } else {
            if !in_range(self.min_group_len) || !in_range(self.max_group_len) {
                return Err(Error::InvalidConfig("group length is out of range"))
            }
            if self.min_group_len > self.preferred_group_len || self.preferred_group_len > self.max_group_len {
                return Err(Error::InvalidConfig("group lengths must satisfy min <= preferred <= max"))
            }
        }
        Ok(())
    }
}

impl Default for GexParams {
    fn default() -> Self {
        GexParams::new(1024, 1024, 4096)
    }
}
