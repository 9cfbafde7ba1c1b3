//! Hasher selection for the sparse tick, bitmap and position tables.
//!
//! The default is `rustc-hash`, which is the fastest option for the small
//! integer keys these tables use. Enable the `ahash` feature for a
//! DoS-resistant hasher, or `std-hash` to fall back to the standard library.

#[cfg(all(
    feature = "rustc-hash",
    not(any(feature = "ahash", feature = "std-hash"))
))]
pub type FastMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[cfg(all(
    feature = "ahash",
    not(any(feature = "rustc-hash", feature = "std-hash"))
))]
pub type FastMap<K, V> = ahash::AHashMap<K, V>;

// Conflicting or absent feature selections resolve to the std hasher.
#[cfg(any(
    feature = "std-hash",
    not(any(feature = "rustc-hash", feature = "ahash")),
    all(feature = "rustc-hash", feature = "ahash"),
))]
pub type FastMap<K, V> = std::collections::HashMap<K, V>;
