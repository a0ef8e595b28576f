//! Hex dump formatting

/// Bytes shown per dump line
pub const BYTES_PER_LINE: usize = 16;

/// Format `data` as dump lines starting at `addr`
///
/// Each line is `AAAAAAAA: xx xx ... |ascii|`. A short last line keeps the
/// ASCII column aligned.
pub fn format_dump(addr: u32, data: &[u8]) -> Vec<String> {
    data.chunks(BYTES_PER_LINE)
        .enumerate()
        .map(|(i, chunk)| {
            let line_addr = addr.wrapping_add((i * BYTES_PER_LINE) as u32);

            let mut hex = String::with_capacity(BYTES_PER_LINE * 3);
            for b in chunk {
                hex.push_str(&format!("{:02x} ", b));
            }
            for _ in chunk.len()..BYTES_PER_LINE {
                hex.push_str("   ");
            }

            let ascii: String = chunk
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        '.'
                    }
                })
                .collect();

            format!("{:08x}: {}|{}|", line_addr, hex, ascii)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dump_full_line() {
        let data: Vec<u8> = (0x41..0x51).collect();
        let lines = format_dump(0x2000_0000, &data);
        assert_eq!(lines.len(), 1);
        assert_eq!(
            lines[0],
            "20000000: 41 42 43 44 45 46 47 48 49 4a 4b 4c 4d 4e 4f 50 |ABCDEFGHIJKLMNOP|"
        );
    }

    #[test]
    fn test_dump_partial_line_and_nonprintable() {
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&[b'h', b'i', 0x7F]);
        let lines = format_dump(0x10, &data);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("00000010: 00 00"));
        assert!(lines[0].ends_with("|................|"));
        assert_eq!(lines[1], format!("00000020: 68 69 7f {}|hi.|", " ".repeat(39)));
    }

    #[test]
    fn test_dump_empty() {
        assert!(format_dump(0, &[]).is_empty());
    }
}
