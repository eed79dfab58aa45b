//! Request parsing: query strings, payload field lookup and XML conversion.

pub mod payload;
pub mod query;
pub mod xml;

pub use payload::{parse_field, Payload};
pub use query::{parse_query, QueryMap};
