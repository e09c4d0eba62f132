//! Hash map used for fingerprint grouping
//!
//! With the `gxhash` feature the map uses gxhash, which needs AES-NI/SSE2
//! (or NEON) intrinsics; without it the std SipHash map is used. Construct
//! maps with `HashMap::default()` so both variants work. Never iterate one of
//! these maps to produce output: iteration order is unspecified.

/// Hash map alias switching on the `gxhash` feature
#[cfg(feature = "gxhash")]
pub type HashMap<K, V> = gxhash::HashMap<K, V>;

/// Hash map alias switching on the `gxhash` feature
#[cfg(not(feature = "gxhash"))]
pub type HashMap<K, V> = std::collections::HashMap<K, V>;
