//! Key and scalar encodings shared by the tables.

use std::io;

pub(crate) fn parse_height_key(prefix: &str, data: &[u8]) -> io::Result<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.strip_prefix(prefix))
        .and_then(|h| h.parse().ok())
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("bad height key {:?}", String::from_utf8_lossy(data)),
            )
        })
}

/// Zigzag signed varint, byte compatible with Go's `binary.PutVarint`.
pub(crate) fn encode_varint(v: i64) -> Vec<u8> {
    let mut ux = ((v << 1) ^ (v >> 63)) as u64;
    let mut out = Vec::with_capacity(10);
    while ux >= 0x80 {
        out.push((ux as u8) | 0x80);
        ux >>= 7;
    }
    out.push(ux as u8);
    out
}

pub(crate) fn decode_varint(data: &[u8]) -> io::Result<i64> {
    let mut ux: u64 = 0;
    let mut shift = 0u32;
    for (i, b) in data.iter().enumerate() {
        if i == 10 {
            break;
        }
        if *b < 0x80 {
            if i == 9 && *b > 1 {
                break;
            }
            ux |= (*b as u64) << shift;
            let v = (ux >> 1) as i64;
            return Ok(if ux & 1 != 0 { !v } else { v });
        }
        ux |= ((*b & 0x7f) as u64) << shift;
        shift += 7;
    }
    Err(io::Error::new(io::ErrorKind::InvalidData, "bad varint"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_varint_matches_go_encoding() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(-1), vec![0x01]);
        assert_eq!(encode_varint(1), vec![0x02]);
        assert_eq!(encode_varint(64), vec![0x80, 0x01]);
        assert_eq!(encode_varint(300), vec![0xd8, 0x04]);

        for v in [0, 1, -1, 300, 123_456_789, i64::MAX, i64::MIN] {
            assert_eq!(decode_varint(&encode_varint(v)).unwrap(), v);
        }
    }

    #[test]
    fn test_varint_rejects_truncated() {
        assert!(decode_varint(&[]).is_err());
        assert!(decode_varint(&[0x80]).is_err());
    }

    #[test]
    fn test_height_key() {
        let prefix = "txin-process-status-";
        assert_eq!(
            parse_height_key(prefix, b"txin-process-status-42").unwrap(),
            42
        );
        assert!(parse_height_key(prefix, b"txout-process-status-42").is_err());
        assert!(parse_height_key(prefix, b"txin-process-status-x").is_err());
    }
}
