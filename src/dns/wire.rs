//! Minimal DNS wire-protocol codec for CNAME queries.
//!
//! # Responsibilities
//! - Build a single-question query message (RFC 1035 §4)
//! - Parse a response down to its first CNAME answer
//! - Decode names with label-pointer compression
//!
//! # Design Decisions
//! - Every read is bounds-checked; malformed or truncated input yields
//!   `None`, never a panic
//! - Pointer chasing is capped at 256 iterations to survive cyclic or
//!   malformed pointers

use rand::Rng;

/// CNAME record type.
pub const QTYPE_CNAME: u16 = 5;

const HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;
const POINTER_MASK: u8 = 0b1100_0000;
const DECODE_ITERATION_CAP: usize = 256;

/// Build a query message with one question (QCLASS IN, RD set).
pub fn encode_query(name: &str, qtype: u16) -> Vec<u8> {
    let labels: Vec<&str> = name.split('.').filter(|l| !l.is_empty()).collect();
    let qname_len: usize = labels
        .iter()
        .map(|l| 1 + l.len().min(MAX_LABEL_LEN))
        .sum::<usize>()
        + 1;

    let mut msg = Vec::with_capacity(HEADER_LEN + qname_len + 4);
    let id: u16 = rand::thread_rng().gen();
    msg.extend_from_slice(&id.to_be_bytes());
    msg.extend_from_slice(&0x0100u16.to_be_bytes()); // RD
    msg.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
    msg.extend_from_slice(&0u16.to_be_bytes()); // ANCOUNT
    msg.extend_from_slice(&0u16.to_be_bytes()); // NSCOUNT
    msg.extend_from_slice(&0u16.to_be_bytes()); // ARCOUNT

    for label in labels {
        let bytes = &label.as_bytes()[..label.len().min(MAX_LABEL_LEN)];
        msg.push(bytes.len() as u8);
        msg.extend_from_slice(bytes);
    }
    msg.push(0);

    msg.extend_from_slice(&qtype.to_be_bytes());
    msg.extend_from_slice(&1u16.to_be_bytes()); // QCLASS IN
    msg
}

fn read_u16(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset + 2)?;
    Some(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Decode a name at `offset`, following compression pointers.
///
/// Returns the dotted name (no trailing root dot) and the number of bytes
/// the name occupies at the original position.
pub fn decode_name(buf: &[u8], offset: usize) -> Option<(String, usize)> {
    let mut off = offset;
    let mut labels: Vec<String> = Vec::new();
    let mut jumped = false;
    let mut read = 0usize;

    for _ in 0..DECODE_ITERATION_CAP {
        let len = *buf.get(off)?;
        if len & POINTER_MASK == POINTER_MASK {
            let next = *buf.get(off + 1)?;
            if !jumped {
                read += 2;
            }
            off = ((len & !POINTER_MASK) as usize) << 8 | next as usize;
            jumped = true;
        } else if len == 0 {
            if !jumped {
                read += 1;
            }
            return Some((labels.join("."), read));
        } else {
            let label = buf.get(off + 1..off + 1 + len as usize)?;
            labels.push(String::from_utf8_lossy(label).into_owned());
            if !jumped {
                read += 1 + len as usize;
            }
            off += 1 + len as usize;
        }
    }
    // iteration cap hit: cyclic or malformed pointers
    None
}

/// Scan a response message for its first CNAME answer.
pub fn first_cname(buf: &[u8]) -> Option<String> {
    if buf.len() < HEADER_LEN {
        return None;
    }
    let qdcount = read_u16(buf, 4)?;
    let ancount = read_u16(buf, 6)?;

    let mut off = HEADER_LEN;
    for _ in 0..qdcount {
        let (_, read) = decode_name(buf, off)?;
        off += read + 4; // QTYPE + QCLASS
    }

    for _ in 0..ancount {
        let (_, read) = decode_name(buf, off)?;
        off += read;
        let rtype = read_u16(buf, off)?;
        let rdlength = read_u16(buf, off + 8)? as usize;
        off += 10; // TYPE + CLASS + TTL + RDLENGTH
        if rtype == QTYPE_CNAME {
            let (name, _) = decode_name(buf, off)?;
            return Some(name);
        }
        off += rdlength;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_name(name: &str) -> Vec<u8> {
        let mut bytes = Vec::new();
        for label in name.split('.').filter(|l| !l.is_empty()) {
            bytes.push(label.len() as u8);
            bytes.extend_from_slice(label.as_bytes());
        }
        bytes.push(0);
        bytes
    }

    /// Response with one question and optionally one answer whose NAME is a
    /// pointer back to the question name.
    fn make_response(qname: &str, answer: Option<(u16, Vec<u8>)>) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x1234u16.to_be_bytes());
        buf.extend_from_slice(&0x8180u16.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes()); // QDCOUNT
        buf.extend_from_slice(&(answer.is_some() as u16).to_be_bytes()); // ANCOUNT
        buf.extend_from_slice(&0u16.to_be_bytes());
        buf.extend_from_slice(&0u16.to_be_bytes());

        buf.extend_from_slice(&encode_name(qname));
        buf.extend_from_slice(&QTYPE_CNAME.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());

        if let Some((rtype, rdata)) = answer {
            buf.extend_from_slice(&[0xc0, 0x0c]); // pointer to offset 12
            buf.extend_from_slice(&rtype.to_be_bytes());
            buf.extend_from_slice(&1u16.to_be_bytes());
            buf.extend_from_slice(&300u32.to_be_bytes());
            buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata);
        }
        buf
    }

    #[test]
    fn query_layout() {
        let msg = encode_query("foo.example.com", QTYPE_CNAME);
        // header + 3 labels + terminator + QTYPE/QCLASS
        assert_eq!(msg.len(), 12 + (1 + 3) + (1 + 7) + (1 + 3) + 1 + 4);
        assert_eq!(read_u16(&msg, 2), Some(0x0100)); // RD
        assert_eq!(read_u16(&msg, 4), Some(1)); // QDCOUNT
        assert_eq!(msg[12], 3);
        assert_eq!(&msg[13..16], b"foo");
        let qtype_off = msg.len() - 4;
        assert_eq!(read_u16(&msg, qtype_off), Some(QTYPE_CNAME));
        assert_eq!(read_u16(&msg, qtype_off + 2), Some(1));
    }

    #[test]
    fn name_roundtrip_without_compression() {
        let mut buf = vec![0u8; 4];
        buf.extend_from_slice(&encode_name("ref--site--org.domains.orbit.live"));
        let (name, read) = decode_name(&buf, 4).unwrap();
        assert_eq!(name, "ref--site--org.domains.orbit.live");
        assert_eq!(read, buf.len() - 4);
    }

    #[test]
    fn name_roundtrip_with_pointer_compression() {
        // "www" label followed by a pointer into a name stored earlier
        let mut buf = Vec::new();
        buf.extend_from_slice(&encode_name("example.com")); // offset 0
        let pointer_at = buf.len();
        buf.push(3);
        buf.extend_from_slice(b"www");
        buf.extend_from_slice(&[0xc0, 0x00]);

        let (name, read) = decode_name(&buf, pointer_at).unwrap();
        assert_eq!(name, "www.example.com");
        assert_eq!(read, 6); // 1 + 3 + pointer(2)
    }

    #[test]
    fn cname_extracted_from_response() {
        let response = make_response(
            "shop.example.com",
            Some((QTYPE_CNAME, encode_name("ref--site--org.domains.orbit.live"))),
        );
        assert_eq!(
            first_cname(&response).as_deref(),
            Some("ref--site--org.domains.orbit.live")
        );
    }

    #[test]
    fn non_cname_answer_yields_none() {
        let response = make_response("shop.example.com", Some((1, vec![1, 2, 3, 4])));
        assert_eq!(first_cname(&response), None);
    }

    #[test]
    fn empty_answer_section_yields_none() {
        let response = make_response("shop.example.com", None);
        assert_eq!(first_cname(&response), None);
    }

    #[test]
    fn truncated_response_yields_none() {
        let response = make_response(
            "shop.example.com",
            Some((QTYPE_CNAME, encode_name("target.example"))),
        );
        for len in [0, 5, 13, response.len() - 3] {
            assert_eq!(first_cname(&response[..len]), None, "truncated at {len}");
        }
    }

    #[test]
    fn cyclic_pointer_hits_iteration_cap() {
        // pointer at offset 12 jumping to itself
        let mut buf = vec![0u8; 12];
        buf[5] = 1; // QDCOUNT = 1
        buf.extend_from_slice(&[0xc0, 0x0c]);
        assert_eq!(decode_name(&buf, 12), None);
        assert_eq!(first_cname(&buf), None);
    }

    #[test]
    fn query_encode_then_decode_is_lossless() {
        let msg = encode_query("a.very-long.sub.domain.example.net", QTYPE_CNAME);
        let (name, _) = decode_name(&msg, HEADER_LEN).unwrap();
        assert_eq!(name, "a.very-long.sub.domain.example.net");
    }
}
