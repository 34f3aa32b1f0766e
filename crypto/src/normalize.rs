//! Chain public keys carry a three-character network prefix that the
//! credential store does not keep.

pub const KEY_PREFIXES: [&str; 2] = ["YTA", "EOS"];

/// Strip a recognized network prefix, if present.
pub fn normalize_public_key(raw: &str) -> &str {
    KEY_PREFIXES
        .iter()
        .find_map(|prefix| raw.strip_prefix(prefix))
        .unwrap_or(raw)
}
