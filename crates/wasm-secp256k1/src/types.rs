//! Value types shared by the guest ABI and the public operation surface.

use crate::error::Error;

/// Byte lengths of every buffer that crosses the guest boundary.
pub mod lens {
    pub const SECRET_KEY: u32 = 32;
    pub const NONCE_ENTROPY: u32 = 32;
    pub const RANDOM_SEED: u32 = 32;
    pub const ECDH_SHARED_SECRET: u32 = 32;
    pub const MSG_HASH: u32 = 32;
    pub const PUBLIC_KEY_COMPRESSED: u32 = 33;
    pub const PUBLIC_KEY_UNCOMPRESSED: u32 = 65;
    pub const PUBLIC_KEY_MAX: u32 = 65;
    /// `secp256k1_pubkey`.
    pub const PUBLIC_KEY_LIB: u32 = 64;
    pub const SIGNATURE_COMPACT: u32 = 64;
    /// `secp256k1_ecdsa_signature`.
    pub const SIGNATURE_LIB: u32 = 64;
    /// `secp256k1_ecdsa_recoverable_signature`.
    pub const RECOVERABLE_SIGNATURE_LIB: u32 = 65;
    pub const WORD: u32 = 4;
    /// `secp256k1_sha256`.
    pub const SHA256_STATE: u32 = 104;
    pub const SHA256_CHUNK: u32 = 256;
}

/// Flag words understood by the engine.
pub mod flags {
    const FLAGS_TYPE_CONTEXT: i32 = 1;
    const FLAGS_TYPE_COMPRESSION: i32 = 2;
    const FLAGS_BIT_CONTEXT_VERIFY: i32 = 1 << 8;
    const FLAGS_BIT_CONTEXT_SIGN: i32 = 1 << 9;
    const FLAGS_BIT_COMPRESSION: i32 = 1 << 8;

    pub const CONTEXT_VERIFY: i32 = FLAGS_TYPE_CONTEXT | FLAGS_BIT_CONTEXT_VERIFY;
    pub const CONTEXT_SIGN: i32 = FLAGS_TYPE_CONTEXT | FLAGS_BIT_CONTEXT_SIGN;
    pub const COMPRESSION_COMPRESSED: i32 = FLAGS_TYPE_COMPRESSION | FLAGS_BIT_COMPRESSION;
    pub const COMPRESSION_UNCOMPRESSED: i32 = FLAGS_TYPE_COMPRESSION;
}

/// Engine return code, translated at the guest boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    Failure,
}

impl Status {
    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            Status::Success
        } else {
            Status::Failure
        }
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }
}

/// Public key serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// 33 bytes, `0x02`/`0x03` prefix.
    #[default]
    Compressed,
    /// 65 bytes, `0x04` prefix.
    Uncompressed,
}

impl Format {
    pub fn serialized_len(self) -> u32 {
        match self {
            Format::Compressed => lens::PUBLIC_KEY_COMPRESSED,
            Format::Uncompressed => lens::PUBLIC_KEY_UNCOMPRESSED,
        }
    }

    pub fn flags(self) -> i32 {
        match self {
            Format::Compressed => flags::COMPRESSION_COMPRESSED,
            Format::Uncompressed => flags::COMPRESSION_UNCOMPRESSED,
        }
    }
}

/// ECDSA recovery id, 0..=3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoveryId(u8);

impl RecoveryId {
    pub fn to_i32(self) -> i32 {
        self.0 as i32
    }
}

impl TryFrom<i32> for RecoveryId {
    type Error = Error;

    fn try_from(value: i32) -> Result<Self, Error> {
        match value {
            0..=3 => Ok(RecoveryId(value as u8)),
            _ => Err(Error::InvalidRecoveryId(value)),
        }
    }
}

/// Compact ECDSA signature plus its recovery id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// `r || s`, low-S.
    pub compact: [u8; 64],
    pub recovery_id: RecoveryId,
}

impl RecoverableSignature {
    /// `r || s || v`, the 65-byte form common on the wire.
    pub fn to_bytes(&self) -> [u8; 65] {
        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&self.compact);
        out[64] = self.recovery_id.0;
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_values() {
        assert_eq!(flags::CONTEXT_VERIFY, 0x101);
        assert_eq!(flags::CONTEXT_SIGN, 0x201);
        assert_eq!(flags::COMPRESSION_COMPRESSED, 0x102);
        assert_eq!(flags::COMPRESSION_UNCOMPRESSED, 0x2);
    }

    #[test]
    fn status_only_one_is_success() {
        assert_eq!(Status::from_code(1), Status::Success);
        assert_eq!(Status::from_code(0), Status::Failure);
        assert_eq!(Status::from_code(-1), Status::Failure);
        assert_eq!(Status::from_code(2), Status::Failure);
    }

    #[test]
    fn recovery_id_range() {
        for id in 0..4 {
            assert_eq!(RecoveryId::try_from(id).unwrap().to_i32(), id);
        }
        assert_eq!(RecoveryId::try_from(4), Err(Error::InvalidRecoveryId(4)));
        assert_eq!(RecoveryId::try_from(-1), Err(Error::InvalidRecoveryId(-1)));
    }

    #[test]
    fn format_lengths() {
        assert_eq!(Format::default(), Format::Compressed);
        assert_eq!(Format::Compressed.serialized_len(), 33);
        assert_eq!(Format::Uncompressed.serialized_len(), 65);
    }

    #[test]
    fn recoverable_signature_bytes() {
        let sig = RecoverableSignature {
            compact: [7u8; 64],
            recovery_id: RecoveryId::try_from(1).unwrap(),
        };
        let bytes = sig.to_bytes();
        assert_eq!(&bytes[..64], &[7u8; 64]);
        assert_eq!(bytes[64], 1);
    }
}
