use chrono::Utc;
use uuid::Uuid;

/// Current time as epoch milliseconds.
///
/// Every persisted timestamp uses a 64-bit epoch-millisecond representation.
pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Fresh 36-character user/key identifier.
pub(crate) fn new_uuid() -> String {
    Uuid::new_v4().to_string()
}
