//! Hex-dump program loader.
//!
//! The input is plain text: `@HHHHHHHH` directives set the load address,
//! and every other whitespace-separated token is one hex byte, stored
//! little-endian at the advancing address. Blank lines are ignored.

use thiserror::Error;

use crate::memory::Ram;

/// A rejected program image.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("line {line}: bad address directive `@{token}`")]
    BadAddress { line: usize, token: String },
    #[error("line {line}: bad byte token `{token}`")]
    BadByte { line: usize, token: String },
    #[error("line {line}: address {addr:#010x} outside memory of {size} bytes")]
    OutOfRange { line: usize, addr: u32, size: usize },
}

/// Parse a hex dump into RAM.
pub fn load_hex_dump(ram: &mut Ram, text: &str) -> Result<(), LoadError> {
    let mut addr: u32 = 0;
    for (i, line) in text.lines().enumerate() {
        let line_no = i + 1;
        for token in line.split_whitespace() {
            if let Some(hex) = token.strip_prefix('@') {
                addr = u32::from_str_radix(hex, 16).map_err(|_| LoadError::BadAddress {
                    line: line_no,
                    token: hex.to_string(),
                })?;
            } else {
                let byte = u8::from_str_radix(token, 16).map_err(|_| LoadError::BadByte {
                    line: line_no,
                    token: token.to_string(),
                })?;
                if addr as usize >= ram.size() {
                    return Err(LoadError::OutOfRange {
                        line: line_no,
                        addr,
                        size: ram.size(),
                    });
                }
                ram.write_byte(addr, byte);
                addr = addr.wrapping_add(1);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_load_little_endian_from_the_directive() {
        let mut ram = Ram::new(64);
        load_hex_dump(&mut ram, "@00000010\n13 05 a0 00\n").expect("valid dump");
        assert_eq!(ram.read_word(0x10), 0x00A0_0513);
    }

    #[test]
    fn directives_may_jump_around() {
        let mut ram = Ram::new(64);
        load_hex_dump(&mut ram, "@00000020\nAA\n@00000004\nbb cc\n").expect("valid dump");
        assert_eq!(ram.read_byte(0x20), 0xAA);
        assert_eq!(ram.read_byte(0x04), 0xBB);
        assert_eq!(ram.read_byte(0x05), 0xCC);
    }

    #[test]
    fn blank_lines_and_stray_whitespace_are_ignored() {
        let mut ram = Ram::new(64);
        load_hex_dump(&mut ram, "\n  @00000000  \n\n 01   02 \n").expect("valid dump");
        assert_eq!(ram.read_byte(0), 1);
        assert_eq!(ram.read_byte(1), 2);
    }

    #[test]
    fn bad_tokens_are_rejected_with_position() {
        let mut ram = Ram::new(64);
        let err = load_hex_dump(&mut ram, "@00000000\n01 xq\n").expect_err("bad byte");
        assert_eq!(
            err,
            LoadError::BadByte {
                line: 2,
                token: "xq".into()
            }
        );
        let err = load_hex_dump(&mut ram, "@zz\n").expect_err("bad address");
        assert!(matches!(err, LoadError::BadAddress { line: 1, .. }));
        // Three-digit tokens do not fit a byte.
        let err = load_hex_dump(&mut ram, "123\n").expect_err("oversized byte");
        assert!(matches!(err, LoadError::BadByte { .. }));
    }

    #[test]
    fn addresses_past_the_end_of_memory_are_rejected() {
        let mut ram = Ram::new(16);
        let err = load_hex_dump(&mut ram, "@00000010\nff\n").expect_err("out of range");
        assert!(matches!(err, LoadError::OutOfRange { addr: 0x10, .. }));
    }
}
