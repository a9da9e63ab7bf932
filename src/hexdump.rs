//! Hex rendering for debug dumps of attribute payloads.

/// Render `bytes` as classic 16-per-line hex with an ASCII gutter, for
/// debug logging.  Every line is prefixed with a tab and the offset.
pub fn dump(bytes: &[u8]) -> String {
    let mut out = String::new();
    for (line, chunk) in bytes.chunks(16).enumerate() {
        out.push_str(&format!("\t{:08x}:", line * 16));
        for b in chunk {
            out.push(' ');
            out.push_str(&hex::encode([*b]));
        }
        for _ in chunk.len()..16 {
            out.push_str("   ");
        }
        out.push(' ');
        for &b in chunk {
            let c = b & 0x7f;
            out.push(if c < 32 || c == 0x7f { '.' } else { c as char });
        }
        out.push('\n');
    }
    out
}
