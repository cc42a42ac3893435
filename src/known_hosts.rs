//! Host key verification using an OpenSSH-compatible `known_hosts` file.
use base64::Engine as _;
use bytes::Bytes;
use hmac::Mac as _;
use std::str;
use crate::error::BoxError;
use crate::pubkey::Pubkey;
use crate::verifier::HostKeyVerifier;

/// Parsed OpenSSH-compatible `known_hosts` file.
///
/// This file stores information about host keys. It is a list of entries, where each entry has a
/// hostname and a public key. The hostname can be represented in plaintext (`example.com`), as a
/// plaintext pattern (`*.examp?e.com`), as a list of such patterns (`example.com,github.com`) or
/// in a hashed format that hides the hostname (`|1|kRjF0OC...`).
///
/// As a [`HostKeyVerifier`], the file accepts a host key only if an entry for the host contains
/// exactly that key and no `@revoked` entry matches the host and the key. It also reports the
/// algorithms of the known keys, so that the key exchange prefers them.
#[derive(Debug, Clone)]
pub struct KnownHosts {
    entries: Vec<Entry>,
}

/// An entry in [`KnownHosts`].
#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Entry {
    line_i: usize,
    marker: Option<Marker>,
    pattern: Pattern,
    key: Pubkey,
    key_comment: Option<String>,
}

#[derive(Debug, Copy, Clone)]
#[cfg_attr(test, derive(PartialEq))]
enum Marker {
    CertAuthority,
    Revoked,
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
enum Pattern {
    Hashed(HashedPattern),
    List(Vec<PlaintextPattern>),
}

#[derive(Debug, Clone)]
#[cfg_attr(test, derive(PartialEq))]
struct HashedPattern {
    salt: Vec<u8>,
    hash: Vec<u8>,
}

#[derive(Debug, Clone)]
struct PlaintextPattern {
    is_negated: bool,
    regex: regex::Regex,
}

/// A match returned by [`KnownHosts::match_host_port_key()`].
#[derive(Debug, Clone)]
pub enum KeyMatch<'e> {
    /// The key was accepted for this host; the entries are never empty.
    Accepted(Vec<&'e Entry>),
    /// The key was revoked by this entry.
    Revoked(&'e Entry),
    /// The combination of key and host was not found.
    NotFound,
}

impl KnownHosts {
    /// Parses a file in OpenSSH `known_hosts` format.
    ///
    /// This function never fails: invalid lines are logged and ignored.
    pub fn decode(data: Bytes) -> Self {
        let mut entries = Vec::new();
        for (line_i, line) in data.split(|&b| b == b'\n').enumerate() {
            match decode_line(line, line_i) {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => {},
                Err(msg) => log::debug!("ignoring line {} of known_hosts: {}", line_i + 1, msg),
            }
        }
        KnownHosts { entries }
    }

    /// Iterates through all valid entries.
    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// Finds the match for the given host, port and key.
    pub fn match_host_port_key(&self, host: &str, port: u16, pubkey: &Pubkey) -> KeyMatch<'_> {
        let hostname = host_port_to_hostname(host, port);
        let mut accepted = Vec::new();
        for entry in self.entries() {
            if !entry.matches_hostname(&hostname) || entry.pubkey() != pubkey {
                continue
            }

            match entry.marker {
                Some(Marker::Revoked) => return KeyMatch::Revoked(entry),
                Some(Marker::CertAuthority) => {},
                None => accepted.push(entry),
            }
        }

        if !accepted.is_empty() {
            KeyMatch::Accepted(accepted)
        } else {
            KeyMatch::NotFound
        }
    }

    /// Host key algorithms that can be used with the keys stored for the host.
    ///
    /// The algorithms are listed in the order of the entries in the file, without duplicates.
    pub fn key_algos_for_host(&self, host: &str, port: u16) -> Vec<String> {
        let hostname = host_port_to_hostname(host, port);
        let mut algos: Vec<String> = Vec::new();
        for entry in self.entries() {
            if entry.marker.is_some() || !entry.matches_hostname(&hostname) {
                continue
            }
            for &algo in entry.key.algo_names() {
                if !algos.iter().any(|a| a == algo) {
                    algos.push(algo.into());
                }
            }
        }
        algos
    }
}

/// Converts a host and port to an OpenSSH-compatible hostname.
///
/// If the port is not 22, it returns `[host]:port`, otherwise the `host` is returned as-is.
pub fn host_port_to_hostname(host: &str, port: u16) -> String {
    if port == 22 {
        host.into()
    } else {
        format!("[{}]:{}", host, port)
    }
}

impl HostKeyVerifier for KnownHosts {
    fn verify(&self, host: &str, port: u16, algo: &str, key: &[u8]) -> Result<bool, BoxError> {
        let pubkey = Pubkey::decode(Bytes::copy_from_slice(key))?;
        if !pubkey.algo_names().contains(&algo) {
            log::warn!("host key {} cannot be used with algorithm {:?}", pubkey.fingerprint(), algo);
            return Ok(false)
        }

        match self.match_host_port_key(host, port, &pubkey) {
            KeyMatch::Accepted(entries) => {
                log::debug!("host key {} accepted by known_hosts line {}",
                    pubkey.fingerprint(), entries[0].line());
                Ok(true)
            },
            KeyMatch::Revoked(entry) => {
                log::warn!("host key {} of {}:{} is revoked by known_hosts line {}",
                    pubkey.fingerprint(), host, port, entry.line());
                Ok(false)
            },
            KeyMatch::NotFound => {
                log::warn!("host key {} of {}:{} is not in known_hosts", pubkey.fingerprint(), host, port);
                Ok(false)
            },
        }
    }

    fn known_key_algos(&self, host: &str, port: u16) -> Option<Vec<String>> {
        let algos = self.key_algos_for_host(host, port);
        if algos.is_empty() { None } else { Some(algos) }
    }
}

impl Entry {
    /// The line number of this entry, counted from 1.
    pub fn line(&self) -> usize {
        self.line_i + 1
    }

    /// Has this entry been revoked using the `@revoked` marker?
    pub fn is_revoked(&self) -> bool {
        matches!(self.marker, Some(Marker::Revoked))
    }

    /// Is this entry a certificate authority (`@cert-authority`)?
    ///
    /// Certificates are not supported, so these entries never accept a host key.
    pub fn is_cert_authority(&self) -> bool {
        matches!(self.marker, Some(Marker::CertAuthority))
    }

    /// The public key of this entry.
    pub fn pubkey(&self) -> &Pubkey {
        &self.key
    }

    /// The optional comment of the [public key][Self::pubkey()].
    pub fn key_comment(&self) -> Option<&str> {
        self.key_comment.as_deref()
    }

    /// Tests whether the hostname (see [`host_port_to_hostname()`]) matches this entry.
    pub fn matches_hostname(&self, hostname: &str) -> bool {
        pattern_matches(&self.pattern, hostname)
    }
}

fn pattern_matches(pattern: &Pattern, hostname: &str) -> bool {
    match pattern {
        Pattern::Hashed(pattern) => {
            let Ok(mut hmac) = hmac::Hmac::<sha1::Sha1>::new_from_slice(&pattern.salt) else {
                return false
            };
            hmac.update(hostname.as_bytes());
            hmac.verify_slice(&pattern.hash).is_ok()
        },
        Pattern::List(patterns) => {
            let mut matches = false;
            for pattern in patterns.iter() {
                if pattern.regex.is_match(hostname) {
                    if pattern.is_negated {
                        return false
                    }
                    matches = true;
                }
            }
            matches
        },
    }
}

fn decode_line(mut bytes: &[u8], line_i: usize) -> Result<Option<Entry>, &'static str> {
    // empty lines are treated as comments
    let Some(first_field) = read_field(&mut bytes) else { return Ok(None) };

    // first comes the optional marker preceded with '@'
    let (pattern_field, marker) = if first_field[0] == b'@' {
        let marker = decode_marker(first_field)?;
        let pattern_field = read_field(&mut bytes).ok_or("expected host pattern after a @-marker")?;
        (pattern_field, Some(marker))
    } else {
        (first_field, None)
    };

    let pattern = decode_pattern(pattern_field)?;

    let key_type = read_field(&mut bytes).ok_or("expected key type after host pattern")?;
    let key_type = str::from_utf8(key_type).map_err(|_| "key type is not valid utf-8")?;

    let key_base64 = read_field(&mut bytes).ok_or("expected key data in base64 after key type")?;
    let key_blob = BASE64.decode(key_base64).map_err(|_| "key data is invalid base64")?;
    let key = Pubkey::decode(Bytes::from(key_blob)).map_err(|_| "could not decode the public key")?;
    if key.type_str() != key_type {
        return Err("key type is different from the specified type")
    }

    consume_whitespace(&mut bytes);
    let key_comment = match str::from_utf8(bytes) {
        Ok(comment) if !comment.trim_end().is_empty() => Some(comment.trim_end().to_string()),
        _ => None,
    };

    Ok(Some(Entry { line_i, marker, pattern, key, key_comment }))
}

const BASE64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

fn decode_marker(bytes: &[u8]) -> Result<Marker, &'static str> {
    match bytes {
        b"@cert-authority" => Ok(Marker::CertAuthority),
        b"@revoked" => Ok(Marker::Revoked),
        _ => Err("unknown @-marker"),
    }
}

fn decode_pattern(bytes: &[u8]) -> Result<Pattern, &'static str> {
    if let Some(bytes) = bytes.strip_prefix(b"|1|") {
        decode_hashed_pattern(bytes).map(Pattern::Hashed)
    } else {
        decode_list_pattern(bytes).map(Pattern::List)
    }
}

fn decode_hashed_pattern(bytes: &[u8]) -> Result<HashedPattern, &'static str> {
    let mut parts = bytes.splitn(2, |&b| b == b'|');
    let salt_base64 = parts.next().ok_or("invalid format of hashed pattern")?;
    let hash_base64 = parts.next().ok_or("expected a pipe '|' in the hashed pattern")?;

    let salt = BASE64.decode(salt_base64).map_err(|_| "invalid base64 in the salt")?;
    let hash = BASE64.decode(hash_base64).map_err(|_| "invalid base64 in the hash")?;
    Ok(HashedPattern { salt, hash })
}

fn decode_list_pattern(bytes: &[u8]) -> Result<Vec<PlaintextPattern>, &'static str> {
    bytes.split(|&b| b == b',')
        .filter(|bs| !bs.is_empty())
        .map(decode_plaintext_pattern)
        .collect()
}

fn decode_plaintext_pattern(bytes: &[u8]) -> Result<PlaintextPattern, &'static str> {
    let mut pattern = str::from_utf8(bytes).map_err(|_| "host pattern is not valid utf-8")?;

    let mut is_negated = false;
    if let Some(p) = pattern.strip_prefix('!') {
        pattern = p;
        is_negated = true;
    }

    let mut regex = String::new();
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c if regex_syntax::is_meta_character(c) => {
                regex.push('\\');
                regex.push(c);
            },
            c => regex.push(c),
        }
    }
    regex.push('$');

    let regex = regex::Regex::new(&regex).map_err(|_| "host pattern is not valid")?;
    Ok(PlaintextPattern { is_negated, regex })
}

fn read_field<'b>(bytes: &mut &'b [u8]) -> Option<&'b [u8]> {
    consume_whitespace(bytes);

    // '#' starts a comment, which should be ignored
    if matches!(bytes.first(), None | Some(b'#')) {
        return None
    }

    let field_len = bytes.iter().position(|b| b.is_ascii_whitespace()).unwrap_or(bytes.len());
    let field = &bytes[..field_len];
    *bytes = &bytes[field_len..];
    Some(field)
}

fn consume_whitespace(bytes: &mut &[u8]) {
    let white_len = bytes.iter().take_while(|b| b.is_ascii_whitespace()).count();
    *bytes = &bytes[white_len..];
}
