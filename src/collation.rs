//! The subset of the collation table a client needs: mapping the configured
//! collation name onto the one-byte id sent during the handshake.

/// Default connection collation.
pub(crate) const DEFAULT_COLLATION: &str = "utf8mb4_general_ci";

pub(crate) const COLLATION_UTF8MB4_GENERAL_CI: u8 = 45;

/// Resolves a collation name to its wire id.
///
/// Only collations a client plausibly connects with are listed; the full
/// table lives in `information_schema.collations`.
pub(crate) fn collation_id(name: &str) -> Option<u8> {
    Some(match name {
        "big5_chinese_ci" => 1,
        "latin1_swedish_ci" => 8,
        "ascii_general_ci" => 11,
        "sjis_japanese_ci" => 13,
        "utf8_general_ci" | "utf8mb3_general_ci" => 33,
        "utf8mb4_general_ci" => 45,
        "utf8mb4_bin" => 46,
        "latin1_bin" => 47,
        "binary" => 63,
        "utf8_bin" | "utf8mb3_bin" => 83,
        "utf8_unicode_ci" | "utf8mb3_unicode_ci" => 192,
        "utf8mb4_unicode_ci" => 224,
        "utf8mb4_0900_ai_ci" => 255,

        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::{collation_id, DEFAULT_COLLATION};

    #[test]
    fn it_resolves_the_default_collation() {
        assert_eq!(collation_id(DEFAULT_COLLATION), Some(45));
    }

    #[test]
    fn it_rejects_unknown_names() {
        assert_eq!(collation_id("klingon_general_ci"), None);
    }
}
