use super::{CLASS_IN, MAX_DOMAIN_LEN, TYPE_A, TYPE_AAAA, TYPE_CNAME};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use stubdns_domain::ResolveError;
use tracing::{trace, warn};

const HEADER_LEN: usize = 12;
const MAX_POINTER_JUMPS: usize = 32;

/// A decoded reply datagram: header flags plus the extracted A/AAAA/CNAME
/// records. Record types outside those three are ignored.
#[derive(Debug, Clone)]
pub struct ParsedResponse {
    pub id: u16,
    pub qr: bool,
    pub opcode: u8,
    pub aa: bool,
    pub tc: bool,
    pub rcode: u8,
    pub qdcount: u16,
    pub ancount: u16,
    pub addrs: Vec<(String, IpAddr)>,
    pub cnames: Vec<(String, String)>,
}

pub struct ResponseParser;

impl ResponseParser {
    /// Parses a raw reply.
    ///
    /// Header or question damage fails the whole datagram. Damage inside a
    /// single answer record (bad owner name, bad CNAME target, wrong
    /// RDLENGTH) skips that record and parsing continues; a record whose
    /// frame cannot be delimited ends the answer walk with whatever was
    /// extracted so far.
    pub fn parse(buf: &[u8]) -> Result<ParsedResponse, ResolveError> {
        if buf.len() < HEADER_LEN {
            return Err(ResolveError::InvalidResponse(format!(
                "{} bytes is shorter than the 12-byte header",
                buf.len()
            )));
        }

        let id = u16::from_be_bytes([buf[0], buf[1]]);
        let flags = u16::from_be_bytes([buf[2], buf[3]]);
        let qdcount = u16::from_be_bytes([buf[4], buf[5]]);
        let ancount = u16::from_be_bytes([buf[6], buf[7]]);

        let mut pos = HEADER_LEN;

        for _ in 0..qdcount {
            pos = skip_name(buf, pos)?;
            if pos + 4 > buf.len() {
                return Err(ResolveError::InvalidResponse(
                    "truncated question section".to_string(),
                ));
            }
            pos += 4;
        }

        let mut addrs = Vec::new();
        let mut cnames = Vec::new();

        for record in 0..ancount {
            let name_end = match skip_name(buf, pos) {
                Ok(end) => end,
                Err(error) => {
                    warn!(record, %error, "undelimitable resource record, stopping answer walk");
                    break;
                }
            };
            if name_end + 10 > buf.len() {
                warn!(record, "truncated resource record header, stopping answer walk");
                break;
            }

            let rtype = u16::from_be_bytes([buf[name_end], buf[name_end + 1]]);
            let rclass = u16::from_be_bytes([buf[name_end + 2], buf[name_end + 3]]);
            let rdlength = u16::from_be_bytes([buf[name_end + 8], buf[name_end + 9]]) as usize;

            let rdata_start = name_end + 10;
            let rdata_end = rdata_start + rdlength;
            if rdata_end > buf.len() {
                warn!(record, rdlength, "RDATA runs past end of message, stopping answer walk");
                break;
            }

            match expand_name(buf, pos) {
                Ok(owner) if rclass == CLASS_IN => match rtype {
                    TYPE_A if rdlength == 4 => {
                        let octets: [u8; 4] = buf[rdata_start..rdata_end].try_into().unwrap();
                        addrs.push((owner, IpAddr::V4(Ipv4Addr::from(octets))));
                    }
                    TYPE_AAAA if rdlength == 16 => {
                        let octets: [u8; 16] = buf[rdata_start..rdata_end].try_into().unwrap();
                        addrs.push((owner, IpAddr::V6(Ipv6Addr::from(octets))));
                    }
                    TYPE_A | TYPE_AAAA => {
                        warn!(record, rtype, rdlength, "address record with unexpected RDLENGTH, skipping");
                    }
                    TYPE_CNAME => match expand_name(buf, rdata_start) {
                        Ok(canonical) => cnames.push((owner, canonical)),
                        Err(error) => {
                            warn!(record, %error, "CNAME with undecodable target, skipping");
                        }
                    },
                    _ => trace!(record, rtype, "ignoring record type"),
                },
                Ok(_) => trace!(record, rclass, "ignoring non-IN record"),
                Err(error) => warn!(record, %error, "record with undecodable owner name, skipping"),
            }

            pos = rdata_end;
        }

        Ok(ParsedResponse {
            id,
            qr: flags & 0x8000 != 0,
            opcode: ((flags >> 11) & 0x0F) as u8,
            aa: flags & 0x0400 != 0,
            tc: flags & 0x0200 != 0,
            rcode: (flags & 0x000F) as u8,
            qdcount,
            ancount,
            addrs,
            cnames,
        })
    }
}

/// Advances past a possibly-compressed name without following pointers.
/// A compressed name ends at its first pointer.
fn skip_name(buf: &[u8], start: usize) -> Result<usize, ResolveError> {
    let mut pos = start;
    loop {
        let len = *buf.get(pos).ok_or_else(|| {
            ResolveError::InvalidResponse("name runs past end of message".to_string())
        })?;
        if len == 0 {
            return Ok(pos + 1);
        }
        if len & 0xC0 == 0xC0 {
            if pos + 2 > buf.len() {
                return Err(ResolveError::InvalidResponse(
                    "truncated compression pointer".to_string(),
                ));
            }
            return Ok(pos + 2);
        }
        if len & 0xC0 != 0 {
            return Err(ResolveError::InvalidResponse(format!(
                "unsupported label type 0x{:02x}",
                len & 0xC0
            )));
        }
        pos += 1 + len as usize;
    }
}

/// Decompresses a name starting at `start`, following pointers against the
/// whole datagram. Every pointer must target a strictly earlier offset and
/// the total number of jumps is capped, so chains always terminate.
fn expand_name(buf: &[u8], start: usize) -> Result<String, ResolveError> {
    let mut name = String::new();
    let mut pos = start;
    let mut jumps = 0usize;

    loop {
        let len = *buf
            .get(pos)
            .ok_or(ResolveError::CompressionOutOfRange(pos))?;

        if len == 0 {
            break;
        }

        if len & 0xC0 == 0xC0 {
            let low = *buf
                .get(pos + 1)
                .ok_or(ResolveError::CompressionOutOfRange(pos + 1))?;
            let target = ((len as usize & 0x3F) << 8) | low as usize;
            if target >= pos {
                return Err(ResolveError::CompressionLoop);
            }
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(ResolveError::CompressionLoop);
            }
            pos = target;
            continue;
        }

        if len & 0xC0 != 0 {
            return Err(ResolveError::InvalidResponse(format!(
                "unsupported label type 0x{:02x}",
                len & 0xC0
            )));
        }

        let end = pos + 1 + len as usize;
        if end > buf.len() {
            return Err(ResolveError::InvalidResponse(
                "label runs past end of message".to_string(),
            ));
        }

        if !name.is_empty() {
            name.push('.');
        }
        name.push_str(&String::from_utf8_lossy(&buf[pos + 1..end]));
        if name.len() > MAX_DOMAIN_LEN {
            return Err(ResolveError::InvalidResponse(format!(
                "name exceeds {} octets",
                MAX_DOMAIN_LEN
            )));
        }

        pos = end;
    }

    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_plain_name() {
        let buf = b"\x07example\x03com\x00";
        assert_eq!(expand_name(buf, 0).unwrap(), "example.com");
    }

    #[test]
    fn test_expand_follows_pointer() {
        // "com" at offset 0, "www" + pointer to it at offset 5.
        let buf = b"\x03com\x00\x03www\xc0\x00";
        assert_eq!(expand_name(buf, 5).unwrap(), "www.com");
    }

    #[test]
    fn test_expand_rejects_self_pointer() {
        let buf = b"\xc0\x00";
        assert_eq!(expand_name(buf, 0), Err(ResolveError::CompressionLoop));
    }

    #[test]
    fn test_expand_rejects_forward_pointer() {
        let buf = b"\x01a\xc0\x05\x00\x01b\x00";
        assert_eq!(expand_name(buf, 0), Err(ResolveError::CompressionLoop));
    }

    #[test]
    fn test_expand_rejects_truncated_pointer() {
        let buf = b"\x03abc\xc0";
        assert_eq!(
            expand_name(buf, 0),
            Err(ResolveError::CompressionOutOfRange(5))
        );
    }

    #[test]
    fn test_skip_name_stops_at_pointer() {
        let buf = b"\x03www\xc0\x00rest";
        assert_eq!(skip_name(buf, 0).unwrap(), 6);
    }

    #[test]
    fn test_skip_name_plain() {
        let buf = b"\x03www\x00";
        assert_eq!(skip_name(buf, 0).unwrap(), 5);
    }
}
