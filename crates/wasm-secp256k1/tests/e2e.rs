//! End-to-end tests: real WebAssembly modules instantiated with Wasmtime.
//!
//! The engine here is a small WAT stand-in for libsecp256k1. It exports the
//! same C ABI and talks to the host through the same imports, so these tests
//! cover loading, import linking and the shim without any curve arithmetic.
//! Its "public key" is the secret key with every bit flipped.

use anyhow::{Context, Result};
use std::io::Cursor;
use wasm_secp256k1::runtime::WasmTrap;
use wasm_secp256k1::{
    Error, Format, Guest, ImportNames, LoadOptions, Operation, RecoveryId, Secp256k1, WasmGuest,
};

const STUB_ENGINE: &str = r#"
(module
  (import "env" "abort" (func $abort))
  (import "env" "emscripten_memcpy_js" (func $memcpy (param i32 i32 i32)))
  (import "env" "emscripten_resize_heap" (func $resize (param i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write" (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_close" (func $fd_close (param i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_seek" (func $fd_seek (param i32 i64 i32 i32) (result i32)))

  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (global $heap_end i32 (i32.const HEAP_END))

  (data (i32.const 512) "[libsecp256k1] illegal argument: seckey")
  (data (i32.const 600) "static constructors ran")

  ;; iovec at 256, nwritten at 264
  (func $log (param $fd i32) (param $ptr i32) (param $len i32)
    (i32.store (i32.const 256) (local.get $ptr))
    (i32.store (i32.const 260) (local.get $len))
    (drop (call $fd_write (local.get $fd) (i32.const 256) (i32.const 1) (i32.const 264))))

  (func (export "__wasm_call_ctors")
    (call $log (i32.const 1) (i32.const 600) (i32.const 23))
    (i32.store (i32.const 272) (call $fd_close (i32.const 1)))
    (i32.store (i32.const 276)
      (call $fd_seek (i32.const 1) (i64.const 0) (i32.const 0) (i32.const 280))))

  (func $malloc (export "malloc") (param $size i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (if (i32.gt_u (i32.add (local.get $ptr) (local.get $size)) (global.get $heap_end))
      (then
        (drop (call $resize (local.get $size)))
        (return (i32.const 0))))
    (global.set $heap
      (i32.and (i32.add (i32.add (local.get $ptr) (local.get $size)) (i32.const 7))
               (i32.const -8)))
    (local.get $ptr))

  (func (export "secp256k1_context_create") (param $flags i32) (result i32)
    (call $malloc (i32.const 16)))

  (func (export "secp256k1_context_randomize") (param i32 i32) (result i32)
    (i32.const 1))

  ;; 0x00 is rejected, 0xEE aborts after logging, 0xAB aborts silently
  (func $seckey_check (param $sk i32) (result i32)
    (local $b i32)
    (local.set $b (i32.load8_u (local.get $sk)))
    (if (i32.eq (local.get $b) (i32.const 0xEE))
      (then
        (call $log (i32.const 2) (i32.const 512) (i32.const 39))
        (call $abort)))
    (if (i32.eq (local.get $b) (i32.const 0xAB))
      (then (call $abort)))
    (i32.ne (local.get $b) (i32.const 0)))

  (func (export "secp256k1_ec_seckey_verify") (param $ctx i32) (param $sk i32) (result i32)
    (call $seckey_check (local.get $sk)))

  (func (export "secp256k1_ec_pubkey_create")
    (param $ctx i32) (param $pk i32) (param $sk i32) (result i32)
    (local $i i32)
    (if (i32.eqz (call $seckey_check (local.get $sk)))
      (then (return (i32.const 0))))
    (call $memcpy (local.get $pk) (local.get $sk) (i32.const 32))
    (call $memcpy (i32.add (local.get $pk) (i32.const 32)) (local.get $sk) (i32.const 32))
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (i32.const 64)))
        (i32.store8 (i32.add (local.get $pk) (local.get $i))
          (i32.xor (i32.load8_u (i32.add (local.get $pk) (local.get $i))) (i32.const 0xFF)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))
    (i32.const 1))

  (func (export "secp256k1_ec_pubkey_parse")
    (param $ctx i32) (param $pk i32) (param $in i32) (param $len i32) (result i32)
    (if (i32.and (i32.eq (i32.load8_u (local.get $in)) (i32.const 2))
                 (i32.eq (local.get $len) (i32.const 33)))
      (then
        (call $memcpy (local.get $pk) (i32.add (local.get $in) (i32.const 1)) (i32.const 32))
        (memory.fill (i32.add (local.get $pk) (i32.const 32)) (i32.const 0) (i32.const 32))
        (return (i32.const 1))))
    (if (i32.and (i32.eq (i32.load8_u (local.get $in)) (i32.const 4))
                 (i32.eq (local.get $len) (i32.const 65)))
      (then
        (call $memcpy (local.get $pk) (i32.add (local.get $in) (i32.const 1)) (i32.const 64))
        (return (i32.const 1))))
    (i32.const 0))

  (func (export "secp256k1_ec_pubkey_serialize")
    (param $ctx i32) (param $out i32) (param $outlen i32) (param $pk i32) (param $flags i32)
    (result i32)
    (if (i32.eq (local.get $flags) (i32.const 0x102))
      (then
        (if (i32.lt_u (i32.load (local.get $outlen)) (i32.const 33)) (then (unreachable)))
        (i32.store8 (local.get $out) (i32.const 2))
        (call $memcpy (i32.add (local.get $out) (i32.const 1)) (local.get $pk) (i32.const 32))
        (i32.store (local.get $outlen) (i32.const 33))
        (return (i32.const 1))))
    (if (i32.lt_u (i32.load (local.get $outlen)) (i32.const 65)) (then (unreachable)))
    (i32.store8 (local.get $out) (i32.const 4))
    (call $memcpy (i32.add (local.get $out) (i32.const 1)) (local.get $pk) (i32.const 64))
    (i32.store (local.get $outlen) (i32.const 65))
    (i32.const 1))

  (func (export "secp256k1_ecdsa_signature_parse_compact") (param i32 i32 i32) (result i32)
    (i32.const 1))
  (func (export "secp256k1_ecdsa_verify") (param i32 i32 i32 i32) (result i32)
    (i32.const 0))
  (func (export "secp256k1_ecdsa_sign_recoverable") (param i32 i32 i32 i32 i32 i32) (result i32)
    (unreachable))
  (func (export "secp256k1_ecdsa_recoverable_signature_serialize_compact")
    (param i32 i32 i32 i32) (result i32)
    (i32.const 1))
  (func (export "secp256k1_ecdsa_recoverable_signature_parse_compact")
    (param i32 i32 i32 i32) (result i32)
    (i32.const 1))
  (func (export "secp256k1_ecdsa_recover") (param i32 i32 i32 i32) (result i32)
    (i32.const 0))

  ;; writes to a descriptor the shim does not route
  (func (export "secp256k1_ecdh") (param i32 i32 i32 i32 i32 i32) (result i32)
    (call $log (i32.const 3) (i32.const 600) (i32.const 23))
    (i32.const 1))

  (func (export "secp256k1_ec_seckey_tweak_add") (param i32 i32 i32) (result i32)
    (i32.const 0))
  (func (export "secp256k1_ec_seckey_tweak_mul") (param $ctx i32) (param $sk i32) (param $t i32)
    (result i32)
    (i32.store8 (local.get $sk) (i32.add (i32.load8_u (local.get $sk)) (i32.const 1)))
    (i32.const 1))
  (func (export "secp256k1_ec_pubkey_tweak_add") (param i32 i32 i32) (result i32)
    (i32.const 1))
  (func (export "secp256k1_ec_pubkey_tweak_mul") (param i32 i32 i32) (result i32)
    (i32.const 1))
)
"#;

fn stub_wat(heap_end: u32) -> String {
    STUB_ENGINE.replace("HEAP_END", &heap_end.to_string())
}

fn stub_engine() -> Result<Vec<u8>> {
    wat::parse_str(stub_wat(65536)).context("stub engine should assemble")
}

fn load() -> Result<Secp256k1<WasmGuest>> {
    Ok(Secp256k1::load(&stub_engine()?)?)
}

/// Whether `needle` occurs anywhere in guest memory.
fn memory_holds(secp: &mut Secp256k1<WasmGuest>, needle: &[u8]) -> bool {
    secp.guest_mut()
        .memory()
        .as_slice()
        .windows(needle.len())
        .any(|w| w == needle)
}

fn compressed(byte: u8) -> Vec<u8> {
    let mut pk = vec![byte; 33];
    pk[0] = 0x02;
    pk
}

#[test]
fn constructors_run_and_unsupported_syscalls_return_errno() -> Result<()> {
    let mut secp = load()?;
    assert!(!secp.is_poisoned());
    assert_eq!(secp.guest().shim().last_error(), None);
    let mem = secp.guest_mut().memory();
    assert_eq!(mem.read_u32(wasm_secp256k1::runtime::Pointer(272))?, 52);
    assert_eq!(mem.read_u32(wasm_secp256k1::runtime::Pointer(276))?, 70);
    Ok(())
}

#[test]
fn from_reader_loads_module() -> Result<()> {
    let mut secp = Secp256k1::from_reader(Cursor::new(stub_engine()?))?;
    assert_eq!(secp.validate_secret_key(&[7; 32])?, &[7; 32]);
    Ok(())
}

#[test]
fn derive_public_key_goes_through_memcpy_import() -> Result<()> {
    let mut secp = load()?;
    let pk = secp.derive_public_key(&[0x11; 32], Format::Compressed)?;
    assert_eq!(pk, compressed(0xEE));

    let pk = secp.derive_public_key(&[0x11; 32], Format::Uncompressed)?;
    assert_eq!(pk[0], 0x04);
    assert_eq!(&pk[1..], &[0xEE; 64][..]);
    Ok(())
}

#[test]
fn secret_key_not_left_in_guest_memory() -> Result<()> {
    let mut secp = load()?;
    let sk = [0x11; 32];
    secp.derive_public_key(&sk, Format::Compressed)?;
    assert!(!memory_holds(&mut secp, &sk));
    secp.validate_secret_key(&sk)?;
    assert!(!memory_holds(&mut secp, &sk));
    Ok(())
}

#[test]
fn reformat_converts_between_encodings() -> Result<()> {
    let mut secp = load()?;
    let short = compressed(0x5A);
    let long = secp.reformat_public_key(&short, Format::Uncompressed)?;
    assert_eq!(long.len(), 65);
    assert_eq!(long[0], 0x04);
    assert_eq!(&long[1..33], &short[1..]);
    assert_eq!(&long[33..], &[0u8; 32][..]);
    assert_eq!(secp.reformat_public_key(&long, Format::Compressed)?, short);
    Ok(())
}

#[test]
fn rejected_inputs_leave_instance_usable() -> Result<()> {
    let mut secp = load()?;
    assert_eq!(
        secp.reformat_public_key(&[5; 33], Format::Compressed),
        Err(Error::InvalidPublicKey(Operation::ReformatPublicKey))
    );
    assert_eq!(
        secp.validate_secret_key(&[0; 32]),
        Err(Error::InvalidSecretKey(Operation::ValidateSecretKey))
    );
    assert_eq!(
        secp.recover(&[1; 64], &[2; 32], RecoveryId::try_from(0)?, Format::Compressed),
        Err(Error::InvalidSignature(Operation::Recover))
    );
    assert!(!secp.verify(&[1; 64], &[2; 32], &compressed(3))?);
    assert!(!secp.is_poisoned());
    assert_eq!(secp.validate_secret_key(&[9; 32])?, &[9; 32]);
    Ok(())
}

#[test]
fn abort_reports_error_channel_text() -> Result<()> {
    let mut secp = load()?;
    let err = secp.validate_secret_key(&[0xEE; 32]).unwrap_err();
    assert_eq!(
        err,
        Error::Runtime(WasmTrap::Abort(
            "wasm-secp256k1: [libsecp256k1] illegal argument: seckey".into()
        ))
    );
    assert_eq!(
        secp.guest().shim().last_error(),
        Some("[libsecp256k1] illegal argument: seckey")
    );
    assert!(secp.is_poisoned());
    assert_eq!(secp.validate_secret_key(&[1; 32]), Err(Error::Poisoned));
    assert!(!memory_holds(&mut secp, &[0xEE; 32]));
    Ok(())
}

#[test]
fn abort_without_text_uses_fallback_message() -> Result<()> {
    let mut secp = load()?;
    assert_eq!(
        secp.validate_secret_key(&[0xAB; 32]),
        Err(Error::Runtime(WasmTrap::Abort(
            "wasm-secp256k1: An unknown error occurred".into()
        )))
    );
    Ok(())
}

#[test]
fn abort_message_carries_configured_tag() -> Result<()> {
    let options = LoadOptions::default().with_tag("wallet");
    let mut secp = Secp256k1::load_with(&stub_engine()?, &options)?;
    assert_eq!(secp.guest().shim().tag(), "wallet");
    assert_eq!(
        secp.validate_secret_key(&[0xAB; 32]),
        Err(Error::Runtime(WasmTrap::Abort(
            "wallet: An unknown error occurred".into()
        )))
    );
    Ok(())
}

#[test]
fn unrouted_descriptor_traps_and_wipes_secret() -> Result<()> {
    let mut secp = load()?;
    let sk = [0x11; 32];
    assert_eq!(
        secp.ecdh(&sk, &compressed(0x22)),
        Err(Error::Runtime(WasmTrap::InvalidDescriptor(3)))
    );
    assert!(secp.is_poisoned());
    assert!(!memory_holds(&mut secp, &sk));
    Ok(())
}

#[test]
fn engine_trap_poisons_instance() -> Result<()> {
    let mut secp = load()?;
    let err = secp.sign(&[0x11; 32], &[0x22; 32], None).unwrap_err();
    assert!(matches!(err, Error::Runtime(WasmTrap::Engine(_))), "{err:?}");
    assert!(err.is_fault());
    assert_eq!(
        secp.derive_public_key(&[0x11; 32], Format::Compressed),
        Err(Error::Poisoned)
    );
    Ok(())
}

#[test]
fn failed_secret_tweak_zeroizes_key() -> Result<()> {
    let mut secp = load()?;
    let mut sk = [0x11; 32];
    assert_eq!(
        secp.tweak_secret_key_add(&mut sk, &[3; 32]),
        Err(Error::InvalidSecretKey(Operation::TweakSecretKeyAdd))
    );
    assert_eq!(sk, [0; 32]);
    assert!(!secp.is_poisoned());
    Ok(())
}

#[test]
fn secret_tweak_reads_key_back() -> Result<()> {
    let mut secp = load()?;
    let mut sk = [0x11; 32];
    secp.tweak_secret_key_mul(&mut sk, &[3; 32])?;
    assert_eq!(sk[0], 0x12);
    assert_eq!(&sk[1..], &[0x11; 31][..]);
    Ok(())
}

#[test]
fn public_tweak_reserializes() -> Result<()> {
    let mut secp = load()?;
    let pk = compressed(0x33);
    assert_eq!(secp.tweak_public_key_add(&pk, &[1; 32], Format::Compressed)?, pk);
    assert_eq!(
        secp.tweak_public_key_mul(&pk, &[1; 32], Format::Uncompressed)?
            .len(),
        65
    );
    Ok(())
}

#[test]
fn sha256_needs_hash_exports() -> Result<()> {
    let mut secp = load()?;
    assert!(!secp.guest().provides(wasm_secp256k1::Export::Sha256Write));
    assert_eq!(secp.sha256(b"abc"), Err(Error::Unsupported("SHA-256")));
    assert!(!secp.is_poisoned());
    Ok(())
}

#[test]
fn exhausted_heap_fails_load() -> Result<()> {
    // Five 32-byte slots fit below 1200; the 64-byte signature slot does not.
    let wasm = wat::parse_str(stub_wat(1200))?;
    match Secp256k1::load(&wasm) {
        Err(err) => assert_eq!(err, Error::Runtime(WasmTrap::OutOfMemory { requested: 64 })),
        Ok(_) => panic!("load should fail when malloc runs out"),
    }
    Ok(())
}

#[test]
fn missing_export_fails_load() -> Result<()> {
    let wat = stub_wat(65536).replace(r#"(export "secp256k1_ecdh") "#, "");
    let wasm = wat::parse_str(wat)?;
    match Secp256k1::load(&wasm) {
        Err(err) => assert_eq!(err, Error::MissingExport("secp256k1_ecdh".into())),
        Ok(_) => panic!("load should fail without secp256k1_ecdh"),
    }
    Ok(())
}

#[test]
fn unknown_import_fails_load() -> Result<()> {
    let wat = stub_wat(65536).replace(
        r#"(import "env" "abort" (func $abort))"#,
        r#"(import "env" "abort" (func $abort))
  (import "env" "__syscall_openat" (func (param i32 i32 i32 i32) (result i32)))"#,
    );
    let wasm = wat::parse_str(wat)?;
    match Secp256k1::load(&wasm) {
        Err(err) => assert_eq!(
            err,
            Error::UnsupportedImport {
                module: "env".into(),
                name: "__syscall_openat".into(),
            }
        ),
        Ok(_) => panic!("load should fail on an unknown import"),
    }
    Ok(())
}

#[test]
fn garbage_bytes_fail_load() {
    match Secp256k1::load(b"not a wasm module") {
        Err(err) => assert!(matches!(err, Error::Load(_)), "{err:?}"),
        Ok(_) => panic!("garbage should not load"),
    }
}

#[test]
fn minified_import_table() -> Result<()> {
    let wat = stub_wat(65536)
        .replace(r#""env" "abort""#, r#""a" "a""#)
        .replace(r#""wasi_snapshot_preview1" "fd_write""#, r#""a" "b""#)
        .replace(r#""wasi_snapshot_preview1" "fd_seek""#, r#""a" "c""#)
        .replace(r#""env" "emscripten_resize_heap""#, r#""a" "d""#)
        .replace(r#""wasi_snapshot_preview1" "fd_close""#, r#""a" "e""#)
        .replace(r#""env" "emscripten_memcpy_js""#, r#""a" "f""#);
    let wasm = wat::parse_str(wat)?;

    assert!(matches!(
        Secp256k1::load(&wasm),
        Err(Error::UnsupportedImport { .. })
    ));

    let options = LoadOptions::default().with_imports(ImportNames::minified());
    let mut secp = Secp256k1::load_with(&wasm, &options)?;
    assert_eq!(
        secp.derive_public_key(&[0x11; 32], Format::Compressed)?,
        compressed(0xEE)
    );
    assert_eq!(
        secp.validate_secret_key(&[0xEE; 32]),
        Err(Error::Runtime(WasmTrap::Abort(
            "wasm-secp256k1: [libsecp256k1] illegal argument: seckey".into()
        )))
    );
    Ok(())
}
