use bytes::Bytes;
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use crate::codec::{PacketDecode, PacketEncode};
use crate::codes::msg;
use crate::config::{AlgoWishList, GexParams, KexConfig};
use crate::conn_info::{ConnInfoSlot, ConnectionInfo, KexWaiter};
use crate::error::{CloseCause, Error, Result};
use crate::kdf::{KeyLengths, KeyMaterial};
use crate::kex::{self, Exchange, ExchangeStep, KexInput, KexReply};
use crate::negotiate::{self, KexInit, Negotiated};
use crate::pubkey::Pubkey;
use crate::transport::{KexTransport, NewKeys};
use crate::util::CryptoRngCore;
use crate::verifier::HostKeyVerifier;

/// Client side of the SSH key exchange on one connection.
///
/// The manager owns the [transport][KexTransport] and must be driven from a single thread: the
/// transport passes every received key exchange message to [`on_message()`][Self::on_message()],
/// and the application may start a re-exchange with [`initiate()`][Self::initiate()]. Other
/// threads can wait for finished exchanges using a [`KexWaiter`] from
/// [`waiter()`][Self::waiter()].
///
/// All errors returned from [`on_message()`][Self::on_message()] are fatal: the transport should
/// disconnect and then call [`on_connection_closed()`][Self::on_connection_closed()] to release
/// the waiters.
pub struct KexManager<T> {
    config: KexConfig,
    transport: T,
    verifier: Option<Arc<dyn HostKeyVerifier>>,
    host: String,
    port: u16,
    rng: Box<dyn CryptoRngCore + Send>,
    kex_st: Option<KexState>,
    ignore_next_kex_packet: bool,
    session_id: Option<Vec<u8>>,
    kex_count: u32,
    next_wish_list: AlgoWishList,
    next_gex_params: GexParams,
    slot: Arc<ConnInfoSlot>,
}

/// State of the exchange that is in progress.
struct KexState {
    our_kex_init: KexInit,
    their_kex_init: Option<KexInit>,
    negotiated: Option<Negotiated>,
    gex_params: GexParams,
    exchange: Option<Exchange>,
    step: Step,
    server_host_key: Option<Bytes>,
    recv_keys: Option<NewKeys>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Step {
    /// We sent our `SSH_MSG_KEXINIT`.
    Init,
    /// Algorithms are negotiated and we sent the first message of the kex method.
    FirstSent,
    /// The server sent the group in the group exchange.
    GroupReceived,
    /// We sent `SSH_MSG_NEWKEYS` and wait for the server's one.
    Done,
}

impl<T: KexTransport> KexManager<T> {
    /// Creates a manager for a connection to `host` and `port`.
    ///
    /// The `host` and `port` are passed to the `verifier`. If there is no verifier, all host keys
    /// are accepted (but the signature of the exchange hash is always checked).
    ///
    /// Fails if the configuration is not valid (see [`AlgoWishList::validate()`] and
    /// [`GexParams::validate()`]).
    pub fn new(
        config: KexConfig,
        transport: T,
        verifier: Option<Arc<dyn HostKeyVerifier>>,
        host: impl Into<String>,
        port: u16,
    ) -> Result<Self> {
        config.wish_list.validate(&config.registry)?;
        config.gex_params.validate()?;
        Ok(KexManager {
            next_wish_list: config.wish_list.clone(),
            next_gex_params: config.gex_params.clone(),
            config,
            transport,
            verifier,
            host: host.into(),
            port,
            rng: Box::new(OsRng),
            kex_st: None,
            ignore_next_kex_packet: false,
            session_id: None,
            kex_count: 0,
            slot: Arc::new(ConnInfoSlot::default()),
        })
    }

    /// Replaces the random number generator (by default, [`OsRng`]).
    pub fn with_rng<R: RngCore + CryptoRng + Send + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Starts a key exchange with the given algorithms.
    ///
    /// If no exchange is in progress, we send our `SSH_MSG_KEXINIT` immediately. Otherwise the
    /// wish list and the parameters are stored and used for the next exchange; the running
    /// exchange is not affected.
    pub fn initiate(&mut self, wish_list: AlgoWishList, gex_params: GexParams) -> Result<()> {
        wish_list.validate(&self.config.registry)?;
        gex_params.validate()?;
        self.next_wish_list = wish_list;
        self.next_gex_params = gex_params;

        if self.kex_st.is_none() {
            self.start_kex()
        } else {
            log::debug!("key exchange is in progress, new algorithms will be used for the next one");
            Ok(())
        }
    }

    /// Handles a key exchange message from the server (message numbers 20 to 49).
    ///
    /// `payload` starts with the message number.
    pub fn on_message(&mut self, payload: Bytes) -> Result<()> {
        let mut payload = PacketDecode::new(payload);
        let msg_id = payload.get_u8()?;
        match msg_id {
            msg::KEXINIT => self.recv_kex_init(&mut payload),
            msg::NEWKEYS => self.recv_new_keys(),
            msg::KEX_METHOD_FIRST..=msg::KEX_LAST => self.recv_kex_method(msg_id, &mut payload),
            _ => {
                log::debug!("received unexpected message {} in key exchange", msg_id);
                Err(Error::Protocol("received unexpected message in key exchange"))
            },
        }
    }

    /// Returns a handle that waits for finished key exchanges.
    pub fn waiter(&self) -> KexWaiter {
        KexWaiter::new(self.slot.clone(), self.config.wait_timeout)
    }

    /// Blocks until at least `min_kex_count` key exchanges have finished.
    ///
    /// This is the same as [`KexWaiter::wait_for_conn_info()`]; it must not be called from the
    /// thread that drives the manager.
    pub fn wait_for_conn_info(&self, min_kex_count: u32) -> Result<ConnectionInfo> {
        self.waiter().wait_for_conn_info(min_kex_count)
    }

    /// Marks the connection as closed and wakes up all waiters with
    /// [`Error::ConnectionClosed`].
    pub fn on_connection_closed(&self, cause: CloseCause) {
        self.slot.close(cause);
    }

    /// The session identifier: the exchange hash of the first key exchange.
    pub fn session_id(&self) -> Option<&[u8]> {
        self.session_id.as_deref()
    }

    /// Number of finished key exchanges.
    pub fn kex_count(&self) -> u32 {
        self.kex_count
    }

    /// Is a key exchange in progress?
    pub fn is_kex_in_progress(&self) -> bool {
        self.kex_st.is_some()
    }

    /// The transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable reference to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn start_kex(&mut self) -> Result<()> {
        let mut algos = self.next_wish_list.clone();
        if let Some(verifier) = self.verifier.as_ref() {
            if let Some(known_algos) = verifier.known_key_algos(&self.host, self.port) {
                algos.filter_host_key_algos(&known_algos);
            }
        }

        let our_kex_init = KexInit::build(algos, &mut *self.rng);
        self.transport.send_kex_message(our_kex_init.payload.clone())?;
        log::debug!("sending SSH_MSG_KEXINIT");

        self.kex_st = Some(KexState {
            our_kex_init,
            their_kex_init: None,
            negotiated: None,
            gex_params: self.next_gex_params.clone(),
            exchange: None,
            step: Step::Init,
            server_host_key: None,
            recv_keys: None,
        });
        Ok(())
    }

    fn recv_kex_init(&mut self, payload: &mut PacketDecode) -> Result<()> {
        let their_kex_init = KexInit::decode(payload)?;
        log::debug!("received SSH_MSG_KEXINIT: {:?}", their_kex_init.algos);

        if self.kex_st.is_none() {
            log::debug!("server started key exchange");
            self.start_kex()?;
        }

        let st = match self.kex_st.as_mut() {
            Some(st) if st.step == Step::Init && st.their_kex_init.is_none() => st,
            _ => return Err(Error::Protocol("received SSH_MSG_KEXINIT during key exchange")),
        };

        let negotiated = negotiate::negotiate(&st.our_kex_init.algos, &their_kex_init.algos)?;
        if their_kex_init.first_kex_packet_follows && !negotiated.guess_ok {
            log::debug!("server guessed wrong algorithms, ignoring its first kex packet");
            self.ignore_next_kex_packet = true;
        }

        let kex_algo = kex::by_name(&negotiated.kex)
            .ok_or_else(|| Error::UnsupportedAlgo(negotiated.kex.clone()))?;
        let (exchange, first_payload) = Exchange::start(kex_algo, &st.gex_params, &mut *self.rng);
        self.transport.send_kex_message(first_payload)?;

        st.their_kex_init = Some(their_kex_init);
        st.negotiated = Some(negotiated);
        st.exchange = Some(exchange);
        st.step = Step::FirstSent;
        Ok(())
    }

    fn recv_kex_method(&mut self, msg_id: u8, payload: &mut PacketDecode) -> Result<()> {
        let st = match self.kex_st.as_mut() {
            Some(st) if matches!(st.step, Step::FirstSent | Step::GroupReceived) => st,
            _ => return Err(Error::Protocol("received unexpected key exchange message")),
        };

        if self.ignore_next_kex_packet {
            log::debug!("ignoring guessed kex message {}", msg_id);
            self.ignore_next_kex_packet = false;
            return Ok(())
        }

        let exchange = st.exchange.as_mut()
            .ok_or(Error::Protocol("received key exchange message before negotiation"))?;
        match exchange.recv_message(msg_id, payload, &mut *self.rng)? {
            ExchangeStep::GroupReceived(init_payload) => {
                self.transport.send_kex_message(init_payload)?;
                st.step = Step::GroupReceived;
                Ok(())
            },
            ExchangeStep::Reply(reply) => self.recv_kex_reply(reply),
        }
    }

    fn recv_kex_reply(&mut self, reply: KexReply) -> Result<()> {
        let st = self.kex_st.as_mut()
            .ok_or(Error::Protocol("received key exchange reply without key exchange"))?;
        let (Some(negotiated), Some(their_kex_init), Some(exchange)) =
            (st.negotiated.as_ref(), st.their_kex_init.as_ref(), st.exchange.as_ref())
            else { return Err(Error::Protocol("received key exchange reply before negotiation")) };

        if let Some(verifier) = self.verifier.as_ref() {
            match verifier.verify(&self.host, self.port, &negotiated.host_key, &reply.server_pubkey) {
                Ok(true) => log::debug!("server host key was accepted"),
                Ok(false) => {
                    log::warn!("server host key of {}:{} was rejected", self.host, self.port);
                    return Err(Error::HostKeyRejected(None))
                },
                Err(err) => {
                    log::warn!("server host key of {}:{} was rejected: {}", self.host, self.port, err);
                    return Err(Error::HostKeyRejected(Some(err)))
                },
            }
        }

        let kex_input = KexInput {
            client_ident: self.transport.client_ident(),
            server_ident: self.transport.server_ident(),
            client_kex_init: &st.our_kex_init.payload,
            server_kex_init: &their_kex_init.payload,
            server_pubkey: &reply.server_pubkey,
        };
        let kex_output = exchange.exchange(&kex_input)?;
        log::debug!("finished kex {:?}", negotiated.kex);

        let pubkey_algo = self.config.registry.pubkey_algo(&negotiated.host_key)
            .ok_or_else(|| Error::UnsupportedAlgo(negotiated.host_key.clone()))?;
        let pubkey = Pubkey::decode(reply.server_pubkey.clone())?;
        pubkey_algo.verify(&pubkey, &kex_output.exchange_hash, reply.server_exchange_hash_sign)?;
        log::debug!("verified signature of the exchange hash by server pubkey {}", pubkey);

        let session_id = self.session_id.get_or_insert_with(|| kex_output.exchange_hash.clone());

        let registry = &self.config.registry;
        let cipher_cts = registry.cipher_algo(&negotiated.cipher_cts)
            .ok_or_else(|| Error::KeyDerivation(negotiated.cipher_cts.clone()))?;
        let cipher_stc = registry.cipher_algo(&negotiated.cipher_stc)
            .ok_or_else(|| Error::KeyDerivation(negotiated.cipher_stc.clone()))?;
        let mac_cts = registry.mac_algo(&negotiated.mac_cts)
            .ok_or_else(|| Error::KeyDerivation(negotiated.mac_cts.clone()))?;
        let mac_stc = registry.mac_algo(&negotiated.mac_stc)
            .ok_or_else(|| Error::KeyDerivation(negotiated.mac_stc.clone()))?;

        let keys = KeyMaterial::derive(
            exchange.hash_algo(),
            &kex_output.exchange_hash,
            &kex_output.shared_secret_be,
            session_id,
            KeyLengths::for_algos(cipher_cts, mac_cts),
            KeyLengths::for_algos(cipher_stc, mac_stc),
        );
        let send_keys = NewKeys {
            cipher_algo: cipher_cts,
            cipher_key: keys.cipher_key_cts,
            cipher_iv: keys.iv_cts,
            mac_algo: mac_cts,
            mac_key: keys.mac_key_cts,
        };
        let recv_keys = NewKeys {
            cipher_algo: cipher_stc,
            cipher_key: keys.cipher_key_stc,
            cipher_iv: keys.iv_stc,
            mac_algo: mac_stc,
            mac_key: keys.mac_key_stc,
        };

        let mut payload = PacketEncode::new();
        payload.put_u8(msg::NEWKEYS);
        self.transport.send_kex_message(payload.finish())?;
        self.transport.change_send_keys(send_keys)?;
        log::debug!("sent SSH_MSG_NEWKEYS and applied new keys");

        st.server_host_key = Some(reply.server_pubkey);
        st.recv_keys = Some(recv_keys);
        st.step = Step::Done;
        self.transport.kex_finished();
        Ok(())
    }

    fn recv_new_keys(&mut self) -> Result<()> {
        let st = match self.kex_st.take() {
            Some(st) if st.step == Step::Done => st,
            st => {
                self.kex_st = st;
                return Err(Error::Protocol("received SSH_MSG_NEWKEYS before the keys were derived"))
            },
        };

        let KexState { negotiated, server_host_key, recv_keys, .. } = st;
        let (Some(negotiated), Some(server_host_key), Some(recv_keys)) = (negotiated, server_host_key, recv_keys)
            else { return Err(Error::Protocol("received SSH_MSG_NEWKEYS before the keys were derived")) };

        self.transport.change_recv_keys(recv_keys)?;
        self.kex_count += 1;
        self.ignore_next_kex_packet = false;
        log::debug!("received SSH_MSG_NEWKEYS and applied new keys, finished key exchange {}", self.kex_count);

        self.slot.publish(ConnectionInfo {
            kex_algo: negotiated.kex,
            host_key_algo: negotiated.host_key,
            cipher_cts: negotiated.cipher_cts,
            cipher_stc: negotiated.cipher_stc,
            mac_cts: negotiated.mac_cts,
            mac_stc: negotiated.mac_stc,
            compression_cts: negotiated.compression_cts,
            compression_stc: negotiated.compression_stc,
            server_host_key,
            kex_count: self.kex_count,
        });
        Ok(())
    }
}
