//! External WHOIS collaborators.
//!
//! Transport (`whois`) and response parsing (`record`) sit behind traits so
//! the resolver and scheduler can be driven by fakes in tests.

/// WHOIS transport: TCP and system-command clients
pub mod whois;

/// WHOIS text → structured record
pub mod record;

pub use record::{RecordError, TextRecordParser, WhoisRecord, WhoisRecordParser};
pub use whois::{
    parse_iana_refer_response, parse_registrar_referral, CommandWhoisClient, TcpWhoisClient,
    WhoisClient,
};
