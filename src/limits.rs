//! Hard caps enforced by the engine and the server. Exceeding any of them is a
//! `LimitExceeded` error, never a panic.

pub const MAX_BOOKINGS_PER_RESOURCE: usize = 10_000;
pub const MAX_ENTITIES_PER_KIND: usize = 1_000_000;

/// Longest accepted request line on the wire, in bytes.
pub const MAX_REQUEST_LINE_LEN: usize = 64 * 1024;

pub const MAX_EMAIL_LEN: usize = 254;

/// Largest WAL record payload. A longer length prefix is treated as corruption.
pub const MAX_WAL_RECORD_LEN: usize = 1024 * 1024;
