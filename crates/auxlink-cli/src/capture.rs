//! Hex dumps of captured UART traffic.
//!
//! One or more lines of hex byte pairs. Whitespace, `:` and `-` separators
//! are ignored, as is everything after a `#` on a line.

use anyhow::{Result, bail};

/// Parse a hex capture into raw UART bytes.
pub fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.split('#').next().unwrap_or_default();
        let digits: Vec<u8> = line
            .bytes()
            .filter(|c| !c.is_ascii_whitespace() && *c != b':' && *c != b'-')
            .collect();
        if digits.len() % 2 != 0 {
            bail!("line {}: odd number of hex digits", number + 1);
        }
        for pair in digits.chunks_exact(2) {
            let (Some(hi), Some(lo)) = (nibble(pair[0]), nibble(pair[1])) else {
                bail!(
                    "line {}: invalid hex byte {:?}",
                    number + 1,
                    String::from_utf8_lossy(pair)
                );
            };
            bytes.push((hi << 4) | lo);
        }
    }
    Ok(bytes)
}

fn nibble(digit: u8) -> Option<u8> {
    (digit as char).to_digit(16).map(|value| value as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("A5 5A 00 03 09 4B BE", vec![0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B, 0xBE])]
    #[case("a55a:0003-09", vec![0xA5, 0x5A, 0x00, 0x03, 0x09])]
    #[case("# battery\nA5 5A # prefix\n\n00 03", vec![0xA5, 0x5A, 0x00, 0x03])]
    #[case("", vec![])]
    fn test_parse_hex(#[case] text: &str, #[case] expected: Vec<u8>) {
        assert_eq!(parse_hex(text).unwrap(), expected);
    }

    #[rstest]
    #[case("A5 5", "line 1: odd number of hex digits")]
    #[case("00\nZZ", "line 2: invalid hex byte \"ZZ\"")]
    fn test_parse_hex_errors(#[case] text: &str, #[case] message: &str) {
        assert_eq!(parse_hex(text).unwrap_err().to_string(), message);
    }
}
