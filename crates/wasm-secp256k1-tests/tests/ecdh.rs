use anyhow::Result;
use wasm_secp256k1::{Error, Export, Format, Operation};
use wasm_secp256k1_tests::vectors::*;
use wasm_secp256k1_tests::{binding, hex_array, hex_vec};

#[test]
fn known_shared_secret() {
    let mut secp = binding(1);
    let expected = hex_array::<32>(SHARED_1_2);
    assert_eq!(
        secp.ecdh(&hex_array::<32>(SK1), &hex_vec(PK2_COMPRESSED))
            .unwrap(),
        expected
    );
    assert_eq!(
        secp.ecdh(&hex_array::<32>(SK2), &hex_vec(PK1_UNCOMPRESSED))
            .unwrap(),
        expected
    );
}

#[test]
fn shared_secret_is_symmetric() -> Result<()> {
    let mut secp = binding(2);
    for _ in 0..12 {
        let a = secp.generate_secret_key()?;
        let b = secp.generate_secret_key()?;
        let pa = secp.derive_public_key(&a, Format::Compressed)?;
        let pb = secp.derive_public_key(&b, Format::Uncompressed)?;
        assert_eq!(secp.ecdh(&a, &pb)?, secp.ecdh(&b, &pa)?);
    }
    Ok(())
}

#[test]
fn invalid_inputs_rejected() {
    let mut secp = binding(3);
    let pk = hex_vec(PK2_COMPRESSED);
    assert_eq!(
        secp.ecdh(&hex_array::<32>(ORDER), &pk),
        Err(Error::InvalidSecretKey(Operation::Ecdh))
    );
    assert_eq!(
        secp.ecdh(&[1; 16], &pk),
        Err(Error::InvalidSecretKey(Operation::Ecdh))
    );
    assert_eq!(
        secp.ecdh(&hex_array::<32>(SK1), &[0x07; 33]),
        Err(Error::InvalidPublicKey(Operation::Ecdh))
    );
    assert_eq!(
        Error::InvalidPublicKey(Operation::Ecdh).to_string(),
        "ECDH: Invalid public key"
    );
    assert_eq!(secp.guest().called(Export::Ecdh), 1);
    assert!(!secp.is_poisoned());
}

#[test]
fn shared_secret_not_left_in_guest_memory() -> Result<()> {
    let mut secp = binding(4);
    let sk = hex_array::<32>(SK1);
    let shared = secp.ecdh(&sk, &hex_vec(PK2_COMPRESSED))?;
    let memory = secp.guest().memory_bytes();
    assert!(!memory.windows(32).any(|w| w == shared));
    assert!(!memory.windows(32).any(|w| w == sk));
    Ok(())
}
