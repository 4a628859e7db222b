//! Code mapping: 4-letter codes to descriptions

mod book;
mod code;
mod store;

pub use book::CodeBook;
pub use code::{normalize, parse_code, CodeFormatError, CODE_LEN};
pub use store::{sample_codes, CodeMap, CodeStore, CodeStoreError, JsonCodeStore};
