//! Client side of the SSH transport key exchange in pure Rust.
//!
//! This crate negotiates algorithms with the server, runs one of the Diffie-Hellman key exchange
//! methods, verifies the server host key and derives the keys for the encrypted connection (RFC
//! 4253, sections 7 and 8). It does not do any I/O: the transport layer passes the received key
//! exchange messages to the [`KexManager`] and implements [`KexTransport`] to send messages and
//! switch keys.
//!
//! - Entry point is the [`KexManager`], configured with [`KexConfig`].
//! - Other threads can wait for finished exchanges with a [`KexWaiter`].
//! - Host keys are checked by a [`HostKeyVerifier`], such as [`KnownHosts`].
//! - Supported algorithms are in the [`kex`], [`pubkey`], [`cipher`] and [`mac`] modules.
//!
#![allow(clippy::collapsible_if)]
#![allow(clippy::module_inception)]
#![allow(clippy::type_complexity)]
#![warn(missing_docs)]

pub use crate::codec::{PacketEncode, PacketDecode};
pub use crate::config::{KexConfig, AlgoWishList, GexParams};
pub use crate::conn_info::{ConnectionInfo, KexWaiter};
pub use crate::error::{Result, Error, AlgoNegotiateError, BoxError, CloseCause};
pub use crate::kdf::{KeyMaterial, KeyLengths};
pub use crate::known_hosts::KnownHosts;
pub use crate::manager::KexManager;
pub use crate::negotiate::{Negotiated, KexInit, Category};
pub use crate::registry::{AlgoRegistry, default_host_key_algos};
pub use crate::transport::{KexTransport, NewKeys};
pub use crate::verifier::{HostKeyVerifier, AcceptAll};

pub use self::cipher::CipherAlgo;
pub use self::kex::{KexAlgo, HashAlgo, default_kex_algos};
pub use self::mac::MacAlgo;
pub use self::pubkey::{PubkeyAlgo, Pubkey};

pub use bytes;
pub use ecdsa;
pub use ecdsa::elliptic_curve;
pub use ed25519_dalek;
pub use p256;
pub use p384;
pub use rsa;

pub mod cipher;
mod codec;
pub mod codes;
mod config;
mod conn_info;
mod error;
mod kdf;
pub mod kex;
pub mod known_hosts;
pub mod mac;
mod manager;
pub mod negotiate;
pub mod pubkey;
mod registry;
mod transport;
mod util;
mod verifier;
