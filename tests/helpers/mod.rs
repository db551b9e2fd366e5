#![allow(dead_code)]
pub mod chat_helpers;
pub mod test_db;

pub use chat_helpers::*;
pub use test_db::*;
