pub mod address;
pub mod flatten;
pub mod record;

pub use address::{parse_account_information, Address, AddressParse};
pub use flatten::{flatten_record, records_from_response};
pub use record::SourceRecord;
