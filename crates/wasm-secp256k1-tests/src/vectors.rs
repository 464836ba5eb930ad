//! Known-answer values, cross-checked against an independent
//! implementation of the curve.

pub const SK1: &str = "30fd578a3e0bd1e6f2b1a7c94d5e8f60718293a4b5c6d7e8f9a0b1c2d3e4f506";
pub const PK1_COMPRESSED: &str =
    "02754b9db46dc562dd2de545b1c9eeb1fb6af3b596d7a08f51c2883daead2330a3";
pub const PK1_UNCOMPRESSED: &str = "04754b9db46dc562dd2de545b1c9eeb1fb6af3b596d7a08f51c2883daead2330a3786d9a4a744bd22adf1278d98542a54e4bf5f2d1fb0bfd60e6be3b5e1d0fd206";

pub const SK2: &str = "7b3a9c1d2e4f5061728394a5b6c7d8e9fa0b1c2d3e4f5a6b7c8d9eafb0c1d2e3";
pub const PK2_COMPRESSED: &str =
    "02f988bf8e90a2d6dbffcec376119eb02771ade3ae7bc2bf48668ed2684e5949f3";
pub const PK2_UNCOMPRESSED: &str = "04f988bf8e90a2d6dbffcec376119eb02771ade3ae7bc2bf48668ed2684e5949f35d5d7d24a6ce2d4fc46452ac80f12a41a9c4a47be0825cf732779fc0e5fd95b8";

/// ECDH(SK1, PK2): SHA-256 of the compressed shared point.
pub const SHARED_1_2: &str = "df79f812dd1a38b297551dbb75a31b8bcce5a308d9c6ab4cb1b905cba39968b9";

/// SHA-256("hello, secp256k1").
pub const MSG_HASH: &str = "9aba83f2c420d6bbeb6d8f6ef2c662a54eee70d5ae371b602ebc22276a6aae10";

/// A low-S signature of `MSG_HASH` by `SK1`, recovery id 0.
pub const SIG_LOW_S: &str = "8b2cbffaabbff0d14fa2fdb142baad1eb41162569dcac67c14a9cf2fb2c0d9b04952dc1637d9ba7522f5aac1c15bc24380a9e1d6f0ec00bf47f4b8f13c5f26bd";
/// The same signature with `s` replaced by `n - s`.
pub const SIG_HIGH_S: &str = "8b2cbffaabbff0d14fa2fdb142baad1eb41162569dcac67c14a9cf2fb2c0d9b0b6ad23e9c826458add0a553e3ea43dbb3a04fb0fbe5c9f7c77dda59b93d71a84";

/// The scalar 3.
pub const TWEAK: &str = "0000000000000000000000000000000000000000000000000000000000000003";
pub const SK1_PLUS_TWEAK: &str =
    "30fd578a3e0bd1e6f2b1a7c94d5e8f60718293a4b5c6d7e8f9a0b1c2d3e4f509";
pub const SK1_TIMES_TWEAK: &str =
    "92f8069eba2375b4d814f75be81bae215487baee215487baece215487baedf12";
/// PK1 + 3G, compressed.
pub const PK1_PLUS_TWEAK: &str =
    "03e381a3bc9ac25f3601a4aefff1a22a1fef323fe61eba475ca61cc404d2e52f91";
/// 3 * PK1, compressed.
pub const PK1_TIMES_TWEAK: &str =
    "0300afc9d576382c61b4b6f8007544cbb07ecaac06bb4fddb3e907d6d97923a93d";

/// The group order n.
pub const ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";
/// n - 1, the largest valid secret key.
pub const ORDER_MINUS_ONE: &str =
    "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140";

pub const SHA256_ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
pub const SHA256_EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
