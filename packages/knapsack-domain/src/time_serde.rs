//! RFC 3339 timestamps for every `OffsetDateTime` crossing the JSON boundary.

pub use time::serde::rfc3339::{deserialize, serialize};
