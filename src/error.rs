use std::sync::Arc;

/// Result type for our [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed error returned by user-supplied callbacks (such as [`HostKeyVerifier`][crate::HostKeyVerifier]).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Cause of the closing of a connection, shared by all threads that wait for a key exchange.
pub type CloseCause = Arc<dyn std::error::Error + Send + Sync>;

/// Error that occured during the key exchange.
///
/// All errors except [`Error::Timeout`] and [`Error::ConnectionClosed`] are fatal for the
/// connection: there is no recovery inside the key exchange, the transport should disconnect.
///
/// This enum is `#[non_exhaustive]`, so we reserve the right to add more variants and don't
/// consider this to break backwards compatibility.
#[derive(thiserror::Error, Debug)]
#[allow(missing_docs)]
#[non_exhaustive]
pub enum Error {
    #[error("cryptography error: {0}")]
    Crypto(&'static str),
    #[error("signature verification failed")]
    Signature,
    #[error("public key does not match the algorithm")]
    PubkeyFormat,
    #[error("server host key was not accepted by the verifier")]
    HostKeyRejected(#[source] Option<BoxError>),
    #[error("protocol error: {0}")]
    Protocol(&'static str),
    #[error("could not decode bytes: {0}")]
    Decode(&'static str),
    #[error("could not negotiate algorithm: {0}")]
    AlgoNegotiate(AlgoNegotiateError),
    #[error("algorithm {0:?} is not supported")]
    UnsupportedAlgo(String),
    #[error("could not determine key sizes for algorithm {0:?}")]
    KeyDerivation(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Failure of the [`KexTransport`][crate::KexTransport], wrapped by its implementation.
    #[error("transport error")]
    Transport(#[source] BoxError),
    #[error("timed out while waiting for key exchange")]
    Timeout,
    #[error("key exchange was not finished, connection is closed")]
    ConnectionClosed(#[source] CloseCause),
}

/// Error that occured because we could not negotiate an algorithm.
///
/// During the SSH key exchange, the client and the server must negotiate which cryptographic
/// algorithms (such as ciphers or MACs) to use, as described in RFC 4253, section 7.1. This error
/// occurs when there is no intersection between the set of algorithms supported by us (the client)
/// and by the server.
#[derive(Debug, Clone, thiserror::Error)]
#[error("for {algo_name:}, our algos are {our_algos:?}, their algos are {their_algos:?}")]
pub struct AlgoNegotiateError {
    /// Human readable name of the algorithm.
    pub algo_name: String,
    /// The set of algorithms supplied by us (the client).
    pub our_algos: Vec<String>,
    /// The set of algorithms supplied by them (the server).
    pub their_algos: Vec<String>,
}
