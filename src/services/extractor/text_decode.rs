//! Byte-to-text decoding shared by the extraction strategies.

/// Decodes file or string bytes, honouring UTF-16 byte order marks and
/// falling back to lossy UTF-8.
pub fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        decode_utf16_be(&bytes[2..])
    } else if bytes.starts_with(&[0xFF, 0xFE]) {
        decode_utf16_le(&bytes[2..])
    } else if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        String::from_utf8_lossy(rest).into_owned()
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

/// Decodes a PDF string operand. Text strings are either UTF-16BE with a
/// BOM or single-byte, which is read as Latin-1 when it isn't valid UTF-8.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        return decode_utf16_be(&bytes[2..]);
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// True when the content looks like binary rather than text.
pub fn looks_binary(bytes: &[u8]) -> bool {
    if bytes.starts_with(&[0xFE, 0xFF]) || bytes.starts_with(&[0xFF, 0xFE]) {
        return false;
    }
    let sample = &bytes[..bytes.len().min(8192)];
    if sample.contains(&0) {
        return true;
    }
    let control = sample
        .iter()
        .filter(|&&b| b < 0x20 && !matches!(b, b'\n' | b'\r' | b'\t' | 0x0C))
        .count();
    control * 10 > sample.len()
}

fn decode_utf16_be(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]));
    collect_utf16(units)
}

fn decode_utf16_le(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]));
    collect_utf16(units)
}

fn collect_utf16(units: impl Iterator<Item = u16>) -> String {
    char::decode_utf16(units)
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .filter(|&ch| ch != '\0')
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_utf16_with_bom() {
        let be = [0xFE, 0xFF, 0x00, b'H', 0x00, b'i'];
        assert_eq!(decode_text(&be), "Hi");
        let le = [0xFF, 0xFE, b'H', 0x00, b'i', 0x00];
        assert_eq!(decode_text(&le), "Hi");
    }

    #[test]
    fn test_decode_strips_utf8_bom() {
        assert_eq!(decode_text(b"\xEF\xBB\xBFhello"), "hello");
    }

    #[test]
    fn test_pdf_string_latin1_fallback() {
        assert_eq!(decode_pdf_string(b"caf\xE9"), "café");
        assert_eq!(decode_pdf_string(b"plain"), "plain");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, b'A']), "A");
    }

    #[test]
    fn test_looks_binary() {
        assert!(!looks_binary(b"name,age\nann,31\n"));
        assert!(looks_binary(&[0xD0, 0xCF, 0x11, 0xE0, 0x00, 0x00]));
        assert!(!looks_binary(&[0xFF, 0xFE, b'a', 0x00]));
    }
}
