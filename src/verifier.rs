use crate::error::BoxError;

/// Verifies the host key of the server.
///
/// The key exchange calls [`verify()`][Self::verify()] synchronously after the server sends its
/// host key, before the exchange hash is computed. Returning `Ok(false)` or an error aborts the
/// exchange with [`Error::HostKeyRejected`][crate::Error::HostKeyRejected].
///
/// [`KnownHosts`][crate::KnownHosts] implements this trait using an OpenSSH `known_hosts` file.
pub trait HostKeyVerifier: Send + Sync {
    /// Decides whether `key` (the host key blob in SSH encoding) is acceptable for the host.
    ///
    /// `algo` is the negotiated host key algorithm, such as `"ssh-ed25519"`.
    fn verify(&self, host: &str, port: u16, algo: &str, key: &[u8]) -> Result<bool, BoxError>;

    /// Host key algorithms that are already trusted for this host, if known.
    ///
    /// When this returns a non-empty list, we prefer these algorithms during negotiation, so that
    /// we don't negotiate a key type that the verifier does not know when a known one is
    /// available.
    fn known_key_algos(&self, host: &str, port: u16) -> Option<Vec<String>> {
        let _ = (host, port);
        None
    }
}

/// Verifier that accepts every host key.
///
/// This is insecure and should be used only in tests or when the host key is checked by other
/// means.
#[derive(Debug, Copy, Clone, Default)]
pub struct AcceptAll;

impl HostKeyVerifier for AcceptAll {
    fn verify(&self, host: &str, port: u16, algo: &str, _key: &[u8]) -> Result<bool, BoxError> {
        log::warn!("accepting {} host key of {}:{} without verification", algo, host, port);
        Ok(true)
    }
}
