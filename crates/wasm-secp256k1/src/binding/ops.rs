//! Public operations. Inputs are copied into the arena, results are copied
//! out; no guest pointer leaves this module.

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, Zeroizing};

use super::{secret_key, Secp256k1};
use crate::error::{Error, Operation, Result};
use crate::guest::{Export, Guest};
use crate::types::{lens, Format, RecoverableSignature, RecoveryId, Status};

impl<G: Guest, R: RngCore + CryptoRng> Secp256k1<G, R> {
    /// Draw a random secret key. A draw the engine rejects (zero or not below
    /// the group order) is reported as `InvalidSecretKey`; callers may retry.
    pub fn generate_secret_key(&mut self) -> Result<[u8; 32]> {
        self.run(|core, rng| {
            let mut sk = Zeroizing::new([0u8; 32]);
            rng.try_fill_bytes(&mut sk[..])
                .map_err(|e| Error::Entropy(e.to_string()))?;
            if !core.seckey_verify(&sk)? {
                return Err(Error::InvalidSecretKey(Operation::GenerateSecretKey));
            }
            Ok(*sk)
        })
    }

    /// Check that `sk` is a valid secret key and return it unchanged.
    pub fn validate_secret_key<'a>(&mut self, sk: &'a [u8]) -> Result<&'a [u8; 32]> {
        let op = Operation::ValidateSecretKey;
        self.run(|core, _| {
            let key = secret_key(op, sk)?;
            if core.seckey_verify(key)? {
                Ok(key)
            } else {
                Err(Error::InvalidSecretKey(op))
            }
        })
    }

    pub fn derive_public_key(&mut self, sk: &[u8], format: Format) -> Result<Vec<u8>> {
        let op = Operation::DerivePublicKey;
        self.run(|core, rng| {
            let key = secret_key(op, sk)?;
            core.randomize(rng)?;
            let (ctx, pk_lib) = (core.ctx.arg(), core.arena.pk_lib.arg());
            let created = core.with_secret_key(key, |core, sk_ptr| {
                core.status(Export::PubkeyCreate, &[ctx, pk_lib, sk_ptr.as_arg()])
            })?;
            if !created.is_success() {
                return Err(Error::InvalidSecretKey(op));
            }
            core.serialize_public_key(op, format)
        })
    }

    /// Sign a 32-byte message hash. The hash is used as given, never
    /// re-hashed. `entropy` is mixed into nonce generation; fresh entropy is
    /// drawn when it is `None`. The signature is always low-S.
    pub fn sign(
        &mut self,
        sk: &[u8],
        msg_hash: &[u8; 32],
        entropy: Option<&[u8; 32]>,
    ) -> Result<RecoverableSignature> {
        let op = Operation::Sign;
        self.run(|core, rng| {
            let key = secret_key(op, sk)?;
            core.randomize(rng)?;

            let mut nonce = Zeroizing::new([0u8; 32]);
            match entropy {
                Some(bytes) => nonce.copy_from_slice(bytes),
                None => rng
                    .try_fill_bytes(&mut nonce[..])
                    .map_err(|e| Error::Entropy(e.to_string()))?,
            }

            let arena = core.arena.clone();
            core.put(msg_hash, arena.msg_hash)?;
            core.put(&nonce[..], arena.entropy)?;

            let ctx = core.ctx.arg();
            let signed = core.with_secret_key(key, |core, sk_ptr| {
                core.status(
                    Export::SignRecoverable,
                    &[
                        ctx,
                        arena.recoverable_sig_lib.arg(),
                        arena.msg_hash.arg(),
                        sk_ptr.as_arg(),
                        0,
                        arena.entropy.arg(),
                    ],
                )
            });
            core.put(&[], arena.entropy)?;
            if !signed?.is_success() {
                return Err(Error::InvalidSecretKey(op));
            }

            let serialized = core.status(
                Export::RecoverableSignatureSerializeCompact,
                &[
                    ctx,
                    arena.sig_scratch.arg(),
                    arena.recovery_id.arg(),
                    arena.recoverable_sig_lib.arg(),
                ],
            )?;
            if !serialized.is_success() {
                return Err(Error::InvalidSignature(op));
            }
            let compact = core.read_array::<64>(arena.sig_scratch.ptr)?;
            let recid = i32::from_le_bytes(core.read_array::<4>(arena.recovery_id.ptr)?);
            Ok(RecoverableSignature {
                compact,
                recovery_id: RecoveryId::try_from(recid)?,
            })
        })
    }

    /// Verify a compact signature. A well-formed signature that does not
    /// match, including a high-S one, yields `Ok(false)`.
    pub fn verify(&mut self, signature: &[u8; 64], msg_hash: &[u8; 32], pk: &[u8]) -> Result<bool> {
        let op = Operation::Verify;
        self.run(|core, _| {
            core.parse_public_key(op, pk)?;

            let arena = core.arena.clone();
            let ctx = core.ctx.arg();
            core.put(signature, arena.sig_scratch)?;
            let parsed = core.status(
                Export::SignatureParseCompact,
                &[ctx, arena.sig_lib.arg(), arena.sig_scratch.arg()],
            )?;
            if !parsed.is_success() {
                return Err(Error::UnparseableSignature(op));
            }

            core.put(msg_hash, arena.msg_hash)?;
            Ok(core
                .status(
                    Export::Verify,
                    &[
                        ctx,
                        arena.sig_lib.arg(),
                        arena.msg_hash.arg(),
                        arena.pk_lib.arg(),
                    ],
                )?
                .is_success())
        })
    }

    /// Recover the signer's public key.
    pub fn recover(
        &mut self,
        signature: &[u8; 64],
        msg_hash: &[u8; 32],
        recovery_id: RecoveryId,
        format: Format,
    ) -> Result<Vec<u8>> {
        let op = Operation::Recover;
        self.run(|core, _| {
            let arena = core.arena.clone();
            let ctx = core.ctx.arg();

            core.put(signature, arena.sig_scratch)?;
            let parsed = core.status(
                Export::RecoverableSignatureParseCompact,
                &[
                    ctx,
                    arena.recoverable_sig_lib.arg(),
                    arena.sig_scratch.arg(),
                    recovery_id.to_i32(),
                ],
            )?;
            if !parsed.is_success() {
                return Err(Error::UnparseableSignature(op));
            }

            core.put(msg_hash, arena.msg_hash)?;
            let recovered = core.status(
                Export::Recover,
                &[
                    ctx,
                    arena.pk_lib.arg(),
                    arena.recoverable_sig_lib.arg(),
                    arena.msg_hash.arg(),
                ],
            )?;
            if !recovered.is_success() {
                return Err(Error::InvalidSignature(op));
            }
            core.serialize_public_key(op, format)
        })
    }

    /// ECDH with the engine's default hash: SHA-256 of the compressed
    /// shared point.
    pub fn ecdh(&mut self, sk: &[u8], pk: &[u8]) -> Result<[u8; 32]> {
        let op = Operation::Ecdh;
        self.run(|core, rng| {
            let key = secret_key(op, sk)?;
            core.parse_public_key(op, pk)?;
            core.randomize(rng)?;

            let arena = core.arena.clone();
            let ctx = core.ctx.arg();
            let shared = core.with_secret_key(key, |core, sk_ptr| {
                let status = core.status(
                    Export::Ecdh,
                    &[
                        ctx,
                        arena.shared_secret.arg(),
                        arena.pk_lib.arg(),
                        sk_ptr.as_arg(),
                        0,
                        0,
                    ],
                )?;
                if !status.is_success() {
                    return Err(Error::InvalidSecretKey(op));
                }
                core.read_array::<32>(arena.shared_secret.ptr)
            });
            core.put(&[], arena.shared_secret)?;
            shared
        })
    }

    /// `sk = sk + tweak mod n`, in place. On failure `sk` is zeroized.
    pub fn tweak_secret_key_add(&mut self, sk: &mut [u8; 32], tweak: &[u8; 32]) -> Result<()> {
        self.tweak_secret_key(Operation::TweakSecretKeyAdd, Export::SeckeyTweakAdd, sk, tweak)
    }

    /// `sk = sk * tweak mod n`, in place. On failure `sk` is zeroized.
    pub fn tweak_secret_key_mul(&mut self, sk: &mut [u8; 32], tweak: &[u8; 32]) -> Result<()> {
        self.tweak_secret_key(Operation::TweakSecretKeyMul, Export::SeckeyTweakMul, sk, tweak)
    }

    /// `P + tweak*G`.
    pub fn tweak_public_key_add(
        &mut self,
        pk: &[u8],
        tweak: &[u8; 32],
        format: Format,
    ) -> Result<Vec<u8>> {
        self.tweak_public_key(
            Operation::TweakPublicKeyAdd,
            Export::PubkeyTweakAdd,
            pk,
            tweak,
            format,
        )
    }

    /// `tweak * P`.
    pub fn tweak_public_key_mul(
        &mut self,
        pk: &[u8],
        tweak: &[u8; 32],
        format: Format,
    ) -> Result<Vec<u8>> {
        self.tweak_public_key(
            Operation::TweakPublicKeyMul,
            Export::PubkeyTweakMul,
            pk,
            tweak,
            format,
        )
    }

    /// Parse `pk` and serialize it again in `format`.
    pub fn reformat_public_key(&mut self, pk: &[u8], format: Format) -> Result<Vec<u8>> {
        let op = Operation::ReformatPublicKey;
        self.run(|core, _| {
            core.parse_public_key(op, pk)?;
            core.serialize_public_key(op, format)
        })
    }

    /// SHA-256 computed by the engine's own hash implementation, streamed
    /// through the arena in fixed-size chunks.
    pub fn sha256(&mut self, data: &[u8]) -> Result<[u8; 32]> {
        self.run(|core, _| {
            let hashing = [
                Export::Sha256Initialize,
                Export::Sha256Write,
                Export::Sha256Finalize,
            ];
            if !hashing.iter().all(|e| core.guest.provides(*e)) {
                return Err(Error::Unsupported(Operation::Sha256.as_str()));
            }

            let (state, chunk) = (core.arena.sha256_state, core.arena.sha256_chunk);
            core.call(Export::Sha256Initialize, &[state.arg()])?;
            for piece in data.chunks(lens::SHA256_CHUNK as usize) {
                core.put(piece, chunk)?;
                core.call(
                    Export::Sha256Write,
                    &[state.arg(), chunk.arg(), piece.len() as i32],
                )?;
            }
            core.call(Export::Sha256Finalize, &[state.arg(), chunk.arg()])?;
            core.read_array::<32>(chunk.ptr)
        })
    }

    fn tweak_secret_key(
        &mut self,
        op: Operation,
        export: Export,
        sk: &mut [u8; 32],
        tweak: &[u8; 32],
    ) -> Result<()> {
        let current: &[u8; 32] = &*sk;
        let result = self.run(|core, rng| {
            core.randomize(rng)?;
            let (ctx, msg_hash) = (core.ctx.arg(), core.arena.msg_hash);
            core.put(tweak, msg_hash)?;
            core.with_secret_key(current, |core, sk_ptr| {
                let status = core.status(export, &[ctx, sk_ptr.as_arg(), msg_hash.arg()])?;
                if status == Status::Failure {
                    return Err(Error::InvalidSecretKey(op));
                }
                Ok(Zeroizing::new(core.read_array::<32>(sk_ptr)?))
            })
        });

        match result {
            Ok(tweaked) => {
                sk.copy_from_slice(&tweaked[..]);
                Ok(())
            }
            Err(err) => {
                // The engine zeroes a key it rejects; mirror that for the caller.
                if err == Error::InvalidSecretKey(op) {
                    sk.zeroize();
                }
                Err(err)
            }
        }
    }

    fn tweak_public_key(
        &mut self,
        op: Operation,
        export: Export,
        pk: &[u8],
        tweak: &[u8; 32],
        format: Format,
    ) -> Result<Vec<u8>> {
        self.run(|core, _| {
            core.parse_public_key(op, pk)?;
            let (ctx, pk_lib, msg_hash) =
                (core.ctx.arg(), core.arena.pk_lib, core.arena.msg_hash);
            core.put(tweak, msg_hash)?;
            if !core
                .status(export, &[ctx, pk_lib.arg(), msg_hash.arg()])?
                .is_success()
            {
                return Err(Error::InvalidPublicKey(op));
            }
            core.serialize_public_key(op, format)
        })
    }
}
