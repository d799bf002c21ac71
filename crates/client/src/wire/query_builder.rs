use super::{CLASS_IN, MAX_DOMAIN_LEN};
use stubdns_domain::{RecordType, ResolveError};

const HEADER_LEN: usize = 12;
const MAX_LABEL_LEN: usize = 63;

/// Recursion Desired, everything else clear.
const QUERY_FLAGS: u16 = 0x0100;

pub struct QueryBuilder;

impl QueryBuilder {
    /// Encodes a single-question query message for `domain`.
    ///
    /// The 253-octet name bound keeps every encoded query well under the
    /// 512-octet UDP message cap ([`super::MAX_MESSAGE_SIZE`]).
    ///
    /// The transaction ID field is left as zero; the dispatcher assigns the
    /// real ID with [`QueryBuilder::write_id`] once the query is registered.
    pub fn build_query(domain: &str, record_type: RecordType) -> Result<Vec<u8>, ResolveError> {
        let name = domain.strip_suffix('.').unwrap_or(domain);

        if name.is_empty() {
            return Err(ResolveError::InvalidDomainName("empty name".to_string()));
        }
        if name.len() > MAX_DOMAIN_LEN {
            return Err(ResolveError::InvalidDomainName(format!(
                "'{}' is {} octets, limit is {}",
                domain,
                name.len(),
                MAX_DOMAIN_LEN
            )));
        }

        let mut message = Vec::with_capacity(HEADER_LEN + name.len() + 6);

        message.extend_from_slice(&0u16.to_be_bytes());
        message.extend_from_slice(&QUERY_FLAGS.to_be_bytes());
        message.extend_from_slice(&1u16.to_be_bytes());
        message.extend_from_slice(&0u16.to_be_bytes());
        message.extend_from_slice(&0u16.to_be_bytes());
        message.extend_from_slice(&0u16.to_be_bytes());

        for label in name.split('.') {
            if label.is_empty() {
                return Err(ResolveError::InvalidDomainName(format!(
                    "'{}' contains an empty label",
                    domain
                )));
            }
            if label.len() > MAX_LABEL_LEN {
                return Err(ResolveError::InvalidDomainName(format!(
                    "label '{}' is {} octets, limit is {}",
                    label,
                    label.len(),
                    MAX_LABEL_LEN
                )));
            }
            if !label.bytes().all(|b| b.is_ascii_graphic()) {
                return Err(ResolveError::InvalidDomainName(format!(
                    "'{}' contains non-printable characters",
                    domain
                )));
            }

            message.push(label.len() as u8);
            message.extend_from_slice(label.as_bytes());
        }
        message.push(0);

        message.extend_from_slice(&record_type.to_u16().to_be_bytes());
        message.extend_from_slice(&CLASS_IN.to_be_bytes());

        Ok(message)
    }

    /// Writes `id` into the header of an encoded message.
    pub fn write_id(message: &mut [u8], id: u16) {
        message[0..2].copy_from_slice(&id.to_be_bytes());
    }
}
