/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// New random resource ID (UUID v4, hyphenated)
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Start of the UTC day containing `millis`, in milliseconds
pub fn day_start_millis(millis: i64) -> i64 {
    const DAY_MS: i64 = 86_400_000;
    millis - millis.rem_euclid(DAY_MS)
}
