pub mod client;
pub mod wire;

mod engine;
mod table;
mod transport;

pub use client::StubClient;
pub use table::QueryCallback;
pub use stubdns_domain::{
    Answer, QueryOutcome, QueryResult, RecordType, ResolveError, ResolverConfig,
};
