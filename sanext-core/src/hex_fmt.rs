//! Hex rendering of wire bytes for log output

/// Render bytes as upper-case hex pairs separated by spaces (`0A 1B FF`)
pub fn to_hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| hex::encode_upper([*byte]))
        .collect::<Vec<_>>()
        .join(" ")
}
