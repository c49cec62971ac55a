//! Bookmark file processing: schema validation, parsing and merging.

pub mod merge;
pub mod parser;
pub mod schema;

pub use merge::{group_by_category, merge};
pub use parser::parse_dataset;
pub use schema::SchemaValidator;
