/// Characters whose escapes survive decoding, so the URL keeps its structure.
const RESERVED: &[u8] = b";/?:@&=+$,#";

/// Decodes percent-escapes in a full URL the way browsers' `decodeURI` does.
///
/// Escapes of reserved characters are kept verbatim. A malformed escape or an
/// invalid UTF-8 sequence leaves the whole input unchanged.
pub fn decode_uri(input: &str) -> String {
    try_decode(input).unwrap_or_else(|| input.to_string())
}

fn try_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        let lead = escaped_byte(bytes, i)?;
        if lead < 0x80 {
            if RESERVED.contains(&lead) {
                out.extend_from_slice(&bytes[i..i + 3]);
            } else {
                out.push(lead);
            }
            i += 3;
            continue;
        }

        let width = match lead {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return None,
        };
        let mut seq = Vec::with_capacity(width);
        seq.push(lead);
        for k in 1..width {
            let next = escaped_byte(bytes, i + 3 * k)?;
            if next & 0xC0 != 0x80 {
                return None;
            }
            seq.push(next);
        }
        std::str::from_utf8(&seq).ok()?;
        out.extend_from_slice(&seq);
        i += 3 * width;
    }
    String::from_utf8(out).ok()
}

fn escaped_byte(bytes: &[u8], at: usize) -> Option<u8> {
    if *bytes.get(at)? != b'%' {
        return None;
    }
    let hi = char::from(*bytes.get(at + 1)?).to_digit(16)?;
    let lo = char::from(*bytes.get(at + 2)?).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}
