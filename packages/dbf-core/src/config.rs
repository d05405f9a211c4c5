//! Table configuration.

/// Signature of a plain dBase III table without memo file.
pub const SIGNATURE_DBASE3: u8 = 0x03;

/// Table configuration used when opening or creating a table.
#[derive(Debug, Clone)]
pub struct DbfConfig {
    /// Replace undecodable field values with invalid cells instead of failing
    pub ignore_errors: bool,
    /// Refuse every write to the table stream
    pub read_only: bool,
    /// Signature byte for newly created tables
    pub signature: u8,
    /// Code page id for newly created tables (0 = default encoding)
    pub code_page: u8,
    /// Write the 0x1A end-of-file marker after the last record
    pub write_eof_marker: bool,
}

impl Default for DbfConfig {
    fn default() -> Self {
        Self {
            ignore_errors: false,
            read_only: false,
            signature: SIGNATURE_DBASE3,
            code_page: 0,
            write_eof_marker: true,
        }
    }
}
