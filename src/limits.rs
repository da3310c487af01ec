//! Hard caps on user-supplied data. Everything here is checked at
//! validation time; none of these are tunable per deployment.

/// Max length of a user's display name (mirrors the catalog column width).
pub const MAX_NAME_LEN: usize = 100;

/// Max length of a user's email address.
pub const MAX_EMAIL_LEN: usize = 150;

/// Max length of a student id.
pub const MAX_STUDENT_ID_LEN: usize = 50;

/// Max length of the free-text special requests field.
pub const MAX_SPECIAL_REQUESTS_LEN: usize = 1_000;

/// Max bookings held in one ledger (confirmed + cancelled history).
pub const MAX_BOOKINGS: usize = 100_000;

/// Max bytes in a single wire-protocol line.
pub const MAX_LINE_LEN: usize = 8 * 1024;
