//! Minimal DNS wire codec: decode the header and first question of a query, encode a
//! wildcard answer for it. Only what the captive-portal responder needs.

use std::net::Ipv4Addr;

const HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;
const MAX_NAME_LEN: usize = 255;

const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_RD: u16 = 0x0100;
const OPCODE_MASK: u16 = 0x7800;
const OPCODE_QUERY: u8 = 0;

pub const TYPE_A: u16 = 1;
pub const TYPE_AAAA: u16 = 28;
pub const TYPE_ANY: u16 = 255;
pub const CLASS_IN: u16 = 1;
pub const CLASS_ANY: u16 = 255;

/// Pointer to offset 12, where the echoed question name starts.
const NAME_POINTER: [u8; 2] = [0xC0, 0x0C];

/// Why a datagram was not answered.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("datagram truncated")]
    Truncated,
    #[error("datagram is a response, not a query")]
    NotAQuery,
    #[error("unsupported opcode {0}")]
    UnsupportedOpcode(u8),
    #[error("query has no question")]
    NoQuestion,
    #[error("malformed question name")]
    BadName,
}

/// The parts of a query the responder echoes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query<'a> {
    pub id: u16,
    pub recursion_desired: bool,
    /// Dotted, as sent (case preserved); empty for the root.
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
    /// Raw bytes of the first question (name, type, class), echoed verbatim.
    question: &'a [u8],
}

impl Query<'_> {
    /// True when an A record is a meaningful answer to this question.
    pub fn wants_a(&self) -> bool {
        matches!(self.qtype, TYPE_A | TYPE_ANY) && matches!(self.qclass, CLASS_IN | CLASS_ANY)
    }
}

fn read_u16(buf: &[u8], at: usize) -> Result<u16, PacketError> {
    buf.get(at..at + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or(PacketError::Truncated)
}

/// Decode the header and first question. Trailing questions and records are ignored.
pub fn parse_query(buf: &[u8]) -> Result<Query<'_>, PacketError> {
    if buf.len() < HEADER_LEN {
        return Err(PacketError::Truncated);
    }
    let id = read_u16(buf, 0)?;
    let flags = read_u16(buf, 2)?;
    if flags & FLAG_QR != 0 {
        return Err(PacketError::NotAQuery);
    }
    let opcode = ((flags & OPCODE_MASK) >> 11) as u8;
    if opcode != OPCODE_QUERY {
        return Err(PacketError::UnsupportedOpcode(opcode));
    }
    if read_u16(buf, 4)? == 0 {
        return Err(PacketError::NoQuestion);
    }

    let mut pos = HEADER_LEN;
    let mut labels: Vec<String> = Vec::new();
    let mut name_len = 0usize;
    loop {
        let len = *buf.get(pos).ok_or(PacketError::Truncated)? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        // Compression pointers and extended label types never appear in a well-formed question.
        if len > MAX_LABEL_LEN {
            return Err(PacketError::BadName);
        }
        name_len += len + 1;
        if name_len > MAX_NAME_LEN {
            return Err(PacketError::BadName);
        }
        let label = buf.get(pos..pos + len).ok_or(PacketError::Truncated)?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos += len;
    }
    let qtype = read_u16(buf, pos)?;
    let qclass = read_u16(buf, pos + 2)?;
    let end = pos + 4;

    Ok(Query {
        id,
        recursion_desired: flags & FLAG_RD != 0,
        name: labels.join("."),
        qtype,
        qclass,
        question: &buf[HEADER_LEN..end],
    })
}

/// Encode the authoritative answer to `query`: one A record pointing at `address` when
/// the question asks for A, otherwise NOERROR with no answers.
pub fn encode_answer(query: &Query<'_>, address: Ipv4Addr, ttl: u32) -> Vec<u8> {
    let answers: u16 = if query.wants_a() { 1 } else { 0 };
    let mut flags = FLAG_QR | FLAG_AA;
    if query.recursion_desired {
        flags |= FLAG_RD;
    }

    let mut out = Vec::with_capacity(HEADER_LEN + query.question.len() + 16);
    out.extend_from_slice(&query.id.to_be_bytes());
    out.extend_from_slice(&flags.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&answers.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(query.question);

    if answers == 1 {
        out.extend_from_slice(&NAME_POINTER);
        out.extend_from_slice(&TYPE_A.to_be_bytes());
        out.extend_from_slice(&CLASS_IN.to_be_bytes());
        out.extend_from_slice(&ttl.to_be_bytes());
        out.extend_from_slice(&4u16.to_be_bytes());
        out.extend_from_slice(&address.octets());
    }
    out
}

/// Decode `buf` and build the wildcard response in one step.
pub fn respond(buf: &[u8], address: Ipv4Addr, ttl: u32) -> Result<Vec<u8>, PacketError> {
    let query = parse_query(buf)?;
    Ok(encode_answer(&query, address, ttl))
}

/// Encode a single-question query. Used by tests and diagnostics.
pub fn encode_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + name.len() + 6);
    out.extend_from_slice(&id.to_be_bytes());
    out.extend_from_slice(&FLAG_RD.to_be_bytes());
    out.extend_from_slice(&1u16.to_be_bytes());
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    out.push(0);
    out.extend_from_slice(&qtype.to_be_bytes());
    out.extend_from_slice(&CLASS_IN.to_be_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

    #[test]
    fn parses_single_question() {
        let buf = encode_query(0x1234, "connectivitycheck.gstatic.com", TYPE_A);
        let q = parse_query(&buf).unwrap();
        assert_eq!(q.id, 0x1234);
        assert!(q.recursion_desired);
        assert_eq!(q.name, "connectivitycheck.gstatic.com");
        assert_eq!(q.qtype, TYPE_A);
        assert_eq!(q.qclass, CLASS_IN);
        assert!(q.wants_a());
    }

    #[test]
    fn a_query_gets_gateway_address() {
        let query = encode_query(7, "play.local", TYPE_A);
        let resp = respond(&query, GATEWAY, 60).unwrap();

        assert_eq!(&resp[0..2], &7u16.to_be_bytes());
        let flags = u16::from_be_bytes([resp[2], resp[3]]);
        assert_ne!(flags & FLAG_QR, 0);
        assert_ne!(flags & FLAG_AA, 0);
        assert_eq!(flags & 0x000F, 0, "rcode must be NOERROR");
        assert_eq!(u16::from_be_bytes([resp[6], resp[7]]), 1);
        // Question echoed verbatim right after the header.
        assert_eq!(&resp[12..query.len()], &query[12..]);

        let answer = &resp[query.len()..];
        assert_eq!(&answer[0..2], &NAME_POINTER);
        assert_eq!(u16::from_be_bytes([answer[2], answer[3]]), TYPE_A);
        assert_eq!(u32::from_be_bytes([answer[6], answer[7], answer[8], answer[9]]), 60);
        assert_eq!(u16::from_be_bytes([answer[10], answer[11]]), 4);
        assert_eq!(&answer[12..16], &GATEWAY.octets());
        assert_eq!(answer.len(), 16);
    }

    #[test]
    fn aaaa_query_gets_empty_noerror() {
        let query = encode_query(9, "example.com", TYPE_AAAA);
        let resp = respond(&query, GATEWAY, 60).unwrap();
        let flags = u16::from_be_bytes([resp[2], resp[3]]);
        assert_eq!(flags & 0x000F, 0);
        assert_eq!(u16::from_be_bytes([resp[6], resp[7]]), 0);
        assert_eq!(resp.len(), query.len());
    }

    #[test]
    fn responses_and_short_datagrams_are_rejected() {
        assert_eq!(parse_query(&[0u8; 5]).unwrap_err(), PacketError::Truncated);

        let mut response = encode_query(1, "a.b", TYPE_A);
        response[2] |= 0x80;
        assert_eq!(parse_query(&response).unwrap_err(), PacketError::NotAQuery);

        let mut no_question = encode_query(1, "a.b", TYPE_A);
        no_question[4] = 0;
        no_question[5] = 0;
        assert_eq!(parse_query(&no_question).unwrap_err(), PacketError::NoQuestion);

        let query = encode_query(1, "arcade.example", TYPE_A);
        assert_eq!(
            parse_query(&query[..query.len() - 3]).unwrap_err(),
            PacketError::Truncated
        );
    }

    #[test]
    fn non_query_opcode_is_rejected() {
        let mut status = encode_query(1, "a.b", TYPE_A);
        status[2] |= 2 << 3;
        assert_eq!(parse_query(&status).unwrap_err(), PacketError::UnsupportedOpcode(2));
    }

    #[test]
    fn compression_pointer_in_question_is_rejected() {
        let mut buf = encode_query(1, "", TYPE_A);
        buf.truncate(HEADER_LEN);
        buf.extend_from_slice(&[0xC0, 0x0C, 0, 1, 0, 1]);
        assert_eq!(parse_query(&buf).unwrap_err(), PacketError::BadName);
    }
}
