/// Deterministic faction color via CRC32 hash of the faction id.
/// Returns (r, g, b) from first 3 bytes of hash.
pub fn faction_color(id: &str) -> (u8, u8, u8) {
    let hash = crc32fast::hash(id.as_bytes());
    let bytes = hash.to_be_bytes();
    (bytes[0], bytes[1], bytes[2])
}

/// Format RGB as a `#rrggbb` string.
pub fn rgb_hex((r, g, b): (u8, u8, u8)) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Parse a `#rrggbb` (or `rrggbb`) string.
pub fn parse_hex(raw: &str) -> Option<(u8, u8, u8)> {
    let digits = raw.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&digits[range], 16).ok();
    Some((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
