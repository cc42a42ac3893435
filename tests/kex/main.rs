use base64::Engine as _;
use bytes::Bytes;
use makiko_kex::{
    AlgoWishList, BoxError, Error, GexParams, HostKeyVerifier, KexConfig, KexManager, KexTransport,
    KnownHosts, NewKeys, Result,
};
use makiko_kex::codes::msg;
use rand::SeedableRng as _;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use crate::server::{Server, CLIENT_IDENT, SERVER_IDENT};

mod server;

#[derive(Debug)]
enum Event {
    SendKeys(NewKeys),
    RecvKeys(NewKeys),
    KexFinished,
}

#[derive(Debug, Default)]
struct MockTransport {
    outbox: Vec<Bytes>,
    sent_msg_ids: Vec<u8>,
    events: Vec<Event>,
    fail_send_keys: bool,
}

#[derive(Debug, thiserror::Error)]
#[error("socket is broken")]
struct BrokenSocket;

impl KexTransport for MockTransport {
    fn send_kex_message(&mut self, payload: Bytes) -> Result<()> {
        self.sent_msg_ids.push(payload[0]);
        self.outbox.push(payload);
        Ok(())
    }

    fn change_send_keys(&mut self, keys: NewKeys) -> Result<()> {
        if self.fail_send_keys {
            return Err(Error::Transport(Box::new(BrokenSocket)))
        }
        self.events.push(Event::SendKeys(keys));
        Ok(())
    }

    fn change_recv_keys(&mut self, keys: NewKeys) -> Result<()> {
        self.events.push(Event::RecvKeys(keys));
        Ok(())
    }

    fn kex_finished(&mut self) {
        self.events.push(Event::KexFinished);
    }

    fn client_ident(&self) -> &[u8] { CLIENT_IDENT }
    fn server_ident(&self) -> &[u8] { SERVER_IDENT }
}

struct Verifier(bool);

impl HostKeyVerifier for Verifier {
    fn verify(&self, _host: &str, _port: u16, _algo: &str, _key: &[u8]) -> std::result::Result<bool, BoxError> {
        Ok(self.0)
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|&name| name.into()).collect()
}

fn wish_list(kex: &[&str]) -> AlgoWishList {
    let mut wish_list = AlgoWishList::default();
    wish_list.kex = names(kex);
    wish_list.host_key = names(&["ssh-ed25519"]);
    wish_list
}

fn client(config: KexConfig, verifier: Option<Arc<dyn HostKeyVerifier>>) -> KexManager<MockTransport> {
    let _ = env_logger::builder().is_test(true).try_init();
    KexManager::new(config, MockTransport::default(), verifier, "localhost", 22)
        .expect("could not create manager")
        .with_rng(rand_chacha::ChaCha8Rng::seed_from_u64(42))
}

/// Delivers messages between the client and the server until the client has nothing to send.
fn pump(manager: &mut KexManager<MockTransport>, server: &mut Server) -> Result<()> {
    loop {
        let outbox = std::mem::take(&mut manager.transport_mut().outbox);
        if outbox.is_empty() {
            return Ok(())
        }
        for payload in outbox {
            for response in server.recv(payload) {
                manager.on_message(response)?;
            }
        }
    }
}

/// Runs a key exchange started by the server.
fn server_kex(manager: &mut KexManager<MockTransport>, server: &mut Server) -> Result<()> {
    let kex_init = server.kex_init();
    manager.on_message(kex_init)?;
    pump(manager, server)
}

fn check_full_exchange(kex_algo: &str) {
    let mut manager = client(KexConfig::default().with(|c| c.wish_list = wish_list(&[kex_algo])), None);
    let mut server = Server::new(wish_list(&[kex_algo]));

    manager.initiate(wish_list(&[kex_algo]), GexParams::default()).unwrap();
    pump(&mut manager, &mut server).unwrap();

    assert_eq!(manager.kex_count(), 1);
    assert!(!manager.is_kex_in_progress());
    assert_eq!(server.new_keys_recvd, 1);
    assert_eq!(manager.session_id(), Some(&server.exchange_hashes[0][..]));

    let info = manager.wait_for_conn_info(1).unwrap();
    assert_eq!(info.kex_algo, kex_algo);
    assert_eq!(info.host_key_algo, "ssh-ed25519");
    assert_eq!(info.cipher_cts, "aes128-ctr");
    assert_eq!(info.mac_stc, "hmac-sha2-256-etm@openssh.com");
    assert_eq!(info.server_host_key, server.host_key_blob());
    assert_eq!(info.kex_count, 1);

    let events = &manager.transport().events;
    assert_eq!(events.len(), 3, "{:?}", events);
    let Event::SendKeys(send_keys) = &events[0] else { panic!("expected SendKeys, got {:?}", events[0]) };
    assert!(matches!(events[1], Event::KexFinished));
    let Event::RecvKeys(recv_keys) = &events[2] else { panic!("expected RecvKeys, got {:?}", events[2]) };
    assert_eq!(send_keys.cipher_algo.name, "aes128-ctr");
    assert_eq!(send_keys.cipher_key.len(), 16);
    assert_eq!(send_keys.cipher_iv.len(), 16);
    assert_eq!(send_keys.mac_key.len(), 32);
    assert_ne!(send_keys.cipher_key, recv_keys.cipher_key);
    assert_ne!(send_keys.mac_key, recv_keys.mac_key);
}

#[test] fn test_curve25519() { check_full_exchange("curve25519-sha256"); }
#[test] fn test_curve25519_libssh() { check_full_exchange("curve25519-sha256@libssh.org"); }
#[test] fn test_ecdh_nistp256() { check_full_exchange("ecdh-sha2-nistp256"); }
#[test] fn test_ecdh_nistp384() { check_full_exchange("ecdh-sha2-nistp384"); }
#[test] fn test_ecdh_nistp521() { check_full_exchange("ecdh-sha2-nistp521"); }
#[test] fn test_group1() { check_full_exchange("diffie-hellman-group1-sha1"); }
#[test] fn test_group14() { check_full_exchange("diffie-hellman-group14-sha1"); }
#[test] fn test_group_exchange() { check_full_exchange("diffie-hellman-group-exchange-sha256"); }

#[test]
fn test_group_exchange_legacy_request() {
    let config = KexConfig::default().with(|c| {
        c.wish_list = wish_list(&["diffie-hellman-group-exchange-sha256"]);
        c.gex_params = GexParams::legacy(1024);
    });
    let mut manager = client(config, None);
    let mut server = Server::new(wish_list(&["diffie-hellman-group-exchange-sha256"]));
    server_kex(&mut manager, &mut server).unwrap();

    assert_eq!(manager.transport().sent_msg_ids,
        vec![msg::KEXINIT, msg::KEX_DH_GEX_REQUEST_OLD, msg::KEX_DH_GEX_INIT, msg::NEWKEYS]);
    assert_eq!(manager.kex_count(), 1);
}

#[test]
fn test_rekey_keeps_session_id() {
    let mut manager = client(KexConfig::default(), None);
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));

    server_kex(&mut manager, &mut server).unwrap();
    let session_id = manager.session_id().unwrap().to_vec();
    let first_keys = match &manager.transport().events[0] {
        Event::SendKeys(keys) => keys.cipher_key.clone(),
        event => panic!("unexpected event {:?}", event),
    };

    // second exchange with a different method, started by the client
    server.algos = wish_list(&["diffie-hellman-group1-sha1", "curve25519-sha256"]);
    manager.initiate(wish_list(&["diffie-hellman-group1-sha1"]), GexParams::default()).unwrap();
    pump(&mut manager, &mut server).unwrap();

    assert_eq!(manager.kex_count(), 2);
    assert_eq!(server.exchange_hashes.len(), 2);
    assert_ne!(server.exchange_hashes[0], server.exchange_hashes[1]);
    assert_eq!(manager.session_id().unwrap(), &session_id[..]);
    assert_eq!(session_id, server.exchange_hashes[0]);

    let info = manager.wait_for_conn_info(2).unwrap();
    assert_eq!(info.kex_algo, "diffie-hellman-group1-sha1");
    assert_eq!(info.kex_count, 2);

    let second_keys = match &manager.transport().events[3] {
        Event::SendKeys(keys) => keys.cipher_key.clone(),
        event => panic!("unexpected event {:?}", event),
    };
    assert_ne!(first_keys, second_keys);
}

#[test]
fn test_client_order_wins() {
    let client_list = wish_list(&["diffie-hellman-group-exchange-sha256", "diffie-hellman-group14-sha1"]);
    let server_list = wish_list(&["diffie-hellman-group14-sha1", "diffie-hellman-group-exchange-sha256"]);

    let negotiated = makiko_kex::negotiate::negotiate(&client_list, &server_list).unwrap();
    assert_eq!(negotiated.kex, "diffie-hellman-group-exchange-sha256");
    assert!(!negotiated.guess_ok);

    let mut manager = client(KexConfig::default().with(|c| c.wish_list = client_list), None);
    let mut server = Server::new(server_list);
    server_kex(&mut manager, &mut server).unwrap();
    assert_eq!(manager.wait_for_conn_info(1).unwrap().kex_algo, "diffie-hellman-group-exchange-sha256");
}

#[test]
fn test_wrong_guess_is_ignored() {
    let client_list = wish_list(&["diffie-hellman-group-exchange-sha256", "diffie-hellman-group1-sha1"]);
    let server_list = wish_list(&["diffie-hellman-group1-sha1", "diffie-hellman-group-exchange-sha256"]);
    let mut manager = client(KexConfig::default().with(|c| c.wish_list = client_list), None);
    let mut server = Server::new(server_list);
    server.first_kex_packet_follows = true;

    let kex_init = server.kex_init();
    manager.on_message(kex_init).unwrap();
    // the guessed packet for the wrong method must be dropped without parsing
    manager.on_message(Bytes::from_static(&[msg::KEXDH_REPLY, 0xff, 0xff])).unwrap();
    pump(&mut manager, &mut server).unwrap();

    assert_eq!(manager.kex_count(), 1);
    assert_eq!(manager.wait_for_conn_info(1).unwrap().kex_algo, "diffie-hellman-group-exchange-sha256");
}

#[test]
fn test_right_guess_is_not_ignored() {
    let mut list = AlgoWishList::default();
    list.kex = names(&["curve25519-sha256"]);
    list.host_key = names(&["ssh-ed25519"]);
    list.cipher_cts = names(&["aes256-ctr"]);
    list.cipher_stc = names(&["aes256-ctr"]);
    list.mac_cts = names(&["hmac-sha2-512"]);
    list.mac_stc = names(&["hmac-sha2-512"]);

    let negotiated = makiko_kex::negotiate::negotiate(&list, &list).unwrap();
    assert!(negotiated.guess_ok);

    let mut manager = client(KexConfig::default().with(|c| c.wish_list = list.clone()), None);
    let mut server = Server::new(list);
    server.first_kex_packet_follows = true;
    server_kex(&mut manager, &mut server).unwrap();

    // the reply was processed, so the exchange finished
    assert_eq!(manager.kex_count(), 1);
    let info = manager.wait_for_conn_info(1).unwrap();
    assert_eq!(info.cipher_stc, "aes256-ctr");
    assert_eq!(info.mac_cts, "hmac-sha2-512");
}

#[test]
fn test_host_key_rejected() {
    let mut manager = client(KexConfig::default(), Some(Arc::new(Verifier(false))));
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));

    let res = server_kex(&mut manager, &mut server);
    assert!(matches!(res, Err(Error::HostKeyRejected(None))), "{:?}", res);
    assert!(!manager.transport().sent_msg_ids.contains(&msg::NEWKEYS));
    assert!(manager.transport().events.is_empty());
    assert_eq!(manager.session_id(), None);
}

#[test]
fn test_verifier_error() {
    struct FailingVerifier;
    impl HostKeyVerifier for FailingVerifier {
        fn verify(&self, _: &str, _: u16, _: &str, _: &[u8]) -> std::result::Result<bool, BoxError> {
            Err("verifier has no database".into())
        }
    }

    let mut manager = client(KexConfig::default(), Some(Arc::new(FailingVerifier)));
    let mut server = Server::new(wish_list(&["diffie-hellman-group1-sha1"]));
    let res = server_kex(&mut manager, &mut server);
    match res {
        Err(Error::HostKeyRejected(Some(err))) => assert_eq!(err.to_string(), "verifier has no database"),
        res => panic!("unexpected result {:?}", res),
    }
}

#[test]
fn test_bad_signature() {
    let mut manager = client(KexConfig::default(), Some(Arc::new(Verifier(true))));
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));
    server.sign_wrong_hash = true;

    let res = server_kex(&mut manager, &mut server);
    assert!(matches!(res, Err(Error::Signature)), "{:?}", res);
    assert!(!manager.transport().sent_msg_ids.contains(&msg::NEWKEYS));
}

#[test]
fn test_new_keys_before_keys() {
    let mut manager = client(KexConfig::default(), None);
    let res = manager.on_message(Bytes::from_static(&[msg::NEWKEYS]));
    assert!(matches!(res, Err(Error::Protocol(_))), "{:?}", res);

    let mut server = Server::new(wish_list(&["curve25519-sha256"]));
    manager.on_message(server.kex_init()).unwrap();
    let res = manager.on_message(Bytes::from_static(&[msg::NEWKEYS]));
    assert!(matches!(res, Err(Error::Protocol(_))), "{:?}", res);
    assert!(manager.transport().events.is_empty());
}

#[test]
fn test_waiter_blocks_until_second_kex() {
    let mut manager = client(KexConfig::default(), None);
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));
    server_kex(&mut manager, &mut server).unwrap();

    let waiter = manager.waiter();
    let handle = thread::spawn(move || waiter.wait_for_conn_info(2));
    thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished());

    server_kex(&mut manager, &mut server).unwrap();
    let info = handle.join().unwrap().unwrap();
    assert_eq!(info.kex_count, 2);
}

#[derive(Debug, thiserror::Error)]
#[error("connection reset by peer")]
struct ResetError;

#[test]
fn test_waiter_released_by_close() {
    let manager = client(KexConfig::default(), None);
    let waiter = manager.waiter();
    let handle = thread::spawn(move || waiter.wait_for_conn_info(1));
    thread::sleep(Duration::from_millis(50));

    manager.on_connection_closed(Arc::new(ResetError));
    match handle.join().unwrap() {
        Err(Error::ConnectionClosed(cause)) => assert_eq!(cause.to_string(), "connection reset by peer"),
        res => panic!("unexpected result {:?}", res),
    }
}

#[test]
fn test_waiter_timeout() {
    let config = KexConfig::default().with(|c| c.wait_timeout = Duration::from_millis(30));
    let mut manager = client(config, None);
    assert!(matches!(manager.waiter().wait_for_conn_info(1), Err(Error::Timeout)));

    // the exchange is not affected by the timeout
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));
    server_kex(&mut manager, &mut server).unwrap();
    assert_eq!(manager.waiter().wait_for_conn_info(1).unwrap().kex_count, 1);
}

fn known_hosts_for(blob: &[u8]) -> KnownHosts {
    let line = format!("localhost ssh-ed25519 {} server\n",
        base64::engine::general_purpose::STANDARD.encode(blob));
    KnownHosts::decode(Bytes::from(line))
}

#[test]
fn test_known_hosts_filters_host_key_algos() {
    let server = Server::new(AlgoWishList::empty());
    let known_hosts = known_hosts_for(&server.host_key_blob());

    let mut list = wish_list(&["curve25519-sha256"]);
    list.host_key = names(&["ecdsa-sha2-nistp256", "ssh-ed25519"]);
    let mut manager = client(KexConfig::default().with(|c| c.wish_list = list.clone()), Some(Arc::new(known_hosts)));
    let mut server = Server::new(list);

    // without filtering, "ecdsa-sha2-nistp256" would be negotiated
    server_kex(&mut manager, &mut server).unwrap();
    assert_eq!(manager.wait_for_conn_info(1).unwrap().host_key_algo, "ssh-ed25519");
}

#[test]
fn test_known_hosts_rejects_unknown_key() {
    let other_key = ed25519_dalek::SigningKey::from_bytes(&[7; 32]);
    let mut blob = makiko_kex::PacketEncode::new();
    blob.put_str("ssh-ed25519");
    blob.put_bytes(other_key.verifying_key().as_bytes());
    let known_hosts = known_hosts_for(&blob.finish());

    let mut manager = client(KexConfig::default(), Some(Arc::new(known_hosts)));
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));
    let res = server_kex(&mut manager, &mut server);
    assert!(matches!(res, Err(Error::HostKeyRejected(None))), "{:?}", res);
}

#[test]
fn test_negotiation_failure() {
    let mut manager = client(KexConfig::default(), None);
    let mut server_list = wish_list(&["curve25519-sha256"]);
    server_list.mac_stc = names(&["umac-64@openssh.com"]);
    let mut server = Server::new(server_list);

    match server_kex(&mut manager, &mut server) {
        Err(Error::AlgoNegotiate(err)) => {
            assert_eq!(err.algo_name, "mac server-to-client");
            assert_eq!(err.their_algos, names(&["umac-64@openssh.com"]));
        },
        res => panic!("unexpected result {:?}", res),
    }
}

#[test]
fn test_transport_error() {
    let mut manager = client(KexConfig::default(), None);
    let waiter = manager.waiter();
    manager.transport_mut().fail_send_keys = true;
    let mut server = Server::new(wish_list(&["curve25519-sha256"]));

    let err = server_kex(&mut manager, &mut server).unwrap_err();
    let Error::Transport(source) = err else { panic!("expected transport error, got {:?}", err) };
    assert!(source.is::<BrokenSocket>());
    assert_eq!(manager.kex_count(), 0);

    manager.on_connection_closed(Arc::new(Error::Transport(source)));
    assert!(matches!(waiter.wait_for_conn_info(1), Err(Error::ConnectionClosed(_))));
}
