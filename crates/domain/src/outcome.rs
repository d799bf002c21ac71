use crate::errors::ResolveError;
use crate::record_type::RecordType;
use std::fmt;
use std::net::IpAddr;

/// The parsed payload of a reply. `rcode` is surfaced verbatim — an
/// NXDOMAIN reply is an `Answer` with `rcode == 3` and empty sections,
/// not an error.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    pub rcode: u8,
    /// `(owner_name, address)` pairs from A and AAAA records.
    pub addrs: Vec<(String, IpAddr)>,
    /// `(owner_name, canonical_name)` pairs from CNAME records.
    pub cnames: Vec<(String, String)>,
}

/// Terminal outcome of one query. Exactly one of these is delivered per
/// submitted query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryResult {
    Success(Answer),
    Timeout,
    Error(ResolveError),
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryResult::Success(_) => write!(f, "SUCCESS"),
            QueryResult::Timeout => write!(f, "TIMEOUT"),
            QueryResult::Error(_) => write!(f, "ERROR"),
        }
    }
}

/// What the completion callback receives.
#[derive(Debug)]
pub struct QueryOutcome {
    pub name: String,
    pub qtype: RecordType,
    pub result: QueryResult,
}
