//! Escaping for the three nesting contexts a command passes through:
//! single-quoted PowerShell literals, task-definition XML, and the
//! `-EncodedCommand` wire form. Each function is total over all input.
//!
//! When a value crosses more than one boundary, apply the inner escape first:
//! text that lands inside a quoted script literal embedded in XML must be
//! single-quote-escaped and then XML-escaped.

use base64::{engine::general_purpose, Engine as _};

/// Escape text for embedding inside a single-quoted PowerShell string
/// literal. PowerShell reads `''` as one literal quote.
pub fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

/// Escape text for interpolation into XML content or attribute values.
/// `&` is replaced first so entities are not double-escaped.
pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Re-encode a command as UTF-16LE bytes in standard Base64, the form
/// `powershell -EncodedCommand` consumes. Sidesteps shell quoting entirely.
pub fn encode_command(text: &str) -> String {
    let utf16le: Vec<u8> = text
        .encode_utf16()
        .flat_map(|unit| unit.to_le_bytes())
        .collect();
    general_purpose::STANDARD.encode(utf16le)
}
