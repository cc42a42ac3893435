use bytes::{Buf as _, Bytes};
use num_bigint_dig::BigUint;
use std::str;
use crate::{Error, Result};

/// Decoding of key exchange payloads (low level API).
///
/// The encoding of SSH data types is described in RFC 4251, section 5. The decoder keeps the whole
/// payload, because some messages (such as `SSH_MSG_KEXINIT`) are hashed exactly as received.
#[derive(Debug)]
pub struct PacketDecode {
    whole: Bytes,
    rest: Bytes,
}

impl PacketDecode {
    /// Wraps the payload into [`PacketDecode`].
    pub fn new(payload: Bytes) -> PacketDecode {
        PacketDecode { whole: payload.clone(), rest: payload }
    }

    /// Decode a `byte`.
    pub fn get_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        Ok(self.rest.get_u8())
    }

    /// Decode a `boolean` (any nonzero byte is true).
    pub fn get_bool(&mut self) -> Result<bool> {
        self.get_u8().map(|x| x != 0)
    }

    /// Decode a `uint32`.
    pub fn get_u32(&mut self) -> Result<u32> {
        self.ensure(4)?;
        Ok(self.rest.get_u32())
    }

    /// Decode a `string` as raw bytes.
    pub fn get_bytes(&mut self) -> Result<Bytes> {
        let len = self.get_u32()? as usize;
        self.get_raw(len)
    }

    /// Read `len` bytes that are not prefixed with a length.
    pub fn get_raw(&mut self, len: usize) -> Result<Bytes> {
        self.ensure(len)?;
        Ok(self.rest.split_to(len))
    }

    /// Read a fixed number of bytes that are not prefixed with a length, such as the `byte[16]`
    /// cookie in `SSH_MSG_KEXINIT`.
    pub fn get_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(&self.get_raw(N)?);
        Ok(array)
    }

    /// Decode a `string` in UTF-8.
    pub fn get_string(&mut self) -> Result<String> {
        let bytes = self.get_bytes()?;
        str::from_utf8(&bytes)
            .map(|s| s.into())
            .map_err(|_| Error::Decode("string is not valid utf-8"))
    }

    /// Decode a `name-list`.
    pub fn get_name_list(&mut self) -> Result<Vec<String>> {
        let list = self.get_string()?;
        if list.is_empty() {
            return Ok(Vec::new())
        }
        Ok(list.split(',').map(|x| x.into()).collect())
    }

    /// Decode a `mpint` as [`BigUint`].
    ///
    /// Key exchange values are never negative, so the sign bit is not checked.
    pub fn get_biguint(&mut self) -> Result<BigUint> {
        self.get_bytes().map(|x| BigUint::from_bytes_be(&x))
    }

    /// Decode a `mpint` as an unsigned big endian number padded to `len` bytes (used for the
    /// scalars in ECDSA signatures).
    pub fn get_scalar(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut bytes = self.get_bytes()?;
        while bytes.first() == Some(&0) {
            bytes.advance(1);
        }
        if bytes.len() > len {
            return Err(Error::Decode("decoded number is too long"))
        }

        let mut digits_be = vec![0; len];
        digits_be[len - bytes.len()..].copy_from_slice(&bytes);
        Ok(digits_be)
    }

    /// The whole payload given to [`PacketDecode::new()`], including the decoded part.
    pub fn whole(&self) -> Bytes {
        self.whole.clone()
    }

    /// Number of bytes that are not decoded yet.
    pub fn remaining_len(&self) -> usize {
        self.rest.len()
    }

    fn ensure(&self, len: usize) -> Result<()> {
        if len <= self.rest.remaining() {
            Ok(())
        } else {
            Err(Error::Decode("unexpected end of packet"))
        }
    }
}
