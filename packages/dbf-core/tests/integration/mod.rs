//! Integration test suite for the DBF codec.
//!
//! 1. Table files: create, append, reopen, replace, delete
//! 2. Corrupt data: structural failures and ignore-errors decoding
//! 3. Memo fields through an attached memo store

pub mod corrupt_data_tests;
pub mod helpers;
pub mod memo_tests;
pub mod table_file_tests;
