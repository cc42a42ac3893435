use bytes::Bytes;
use derivative::Derivative;
use crate::cipher::CipherAlgo;
use crate::error::Result;
use crate::mac::MacAlgo;

/// The transport layer that carries the key exchange.
///
/// The transport owns the socket, the packet codec and the ciphers. It delivers the key exchange
/// messages (numbers 20 to 49) to [`KexManager::on_message()`][crate::KexManager::on_message()]
/// one at a time, and the manager calls back into the transport to send messages and to switch
/// keys.
///
/// Implementations report their own failures as [`Error::Transport`][crate::Error::Transport];
/// the manager returns them from the call that was in progress.
pub trait KexTransport {
    /// Sends a key exchange message (the payload starts with the message number).
    fn send_kex_message(&mut self, payload: Bytes) -> Result<()>;

    /// Starts to use new keys for packets that we send.
    ///
    /// This is called right after `SSH_MSG_NEWKEYS` was passed to
    /// [`send_kex_message()`][Self::send_kex_message()].
    fn change_send_keys(&mut self, keys: NewKeys) -> Result<()>;

    /// Starts to use new keys for packets that we receive.
    ///
    /// This is called when the server's `SSH_MSG_NEWKEYS` was received.
    fn change_recv_keys(&mut self, keys: NewKeys) -> Result<()>;

    /// Notification that we finished our part of the key exchange.
    ///
    /// The transport may resume sending packets that were held back during the exchange.
    fn kex_finished(&mut self) {}

    /// Our identification string (`V_C`), without the trailing CR LF.
    fn client_ident(&self) -> &[u8];

    /// Identification string of the server (`V_S`), without the trailing CR LF.
    fn server_ident(&self) -> &[u8];
}

/// Keys for one direction of the connection, derived by a key exchange.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct NewKeys {
    /// Negotiated cipher.
    pub cipher_algo: &'static CipherAlgo,
    /// Encryption key.
    #[derivative(Debug = "ignore")]
    pub cipher_key: Vec<u8>,
    /// Initialization vector.
    #[derivative(Debug = "ignore")]
    pub cipher_iv: Vec<u8>,
    /// Negotiated MAC.
    pub mac_algo: &'static MacAlgo,
    /// Integrity key.
    #[derivative(Debug = "ignore")]
    pub mac_key: Vec<u8>,
}
