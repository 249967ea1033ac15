use chrono::Utc;

/// Get current date as days since Unix epoch (UTC)
pub fn get_current_date() -> i32 {
    let now_ts = Utc::now().timestamp();
    (now_ts / 86400) as i32
}

/// Get current timestamp in milliseconds (UTC)
pub fn get_current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ms_is_plausible() {
        // 2024-01-01 in ms
        assert!(get_current_timestamp_ms() > 1_704_067_200_000);
    }

    #[test]
    fn test_current_date_matches_timestamp() {
        let days = get_current_date() as i64;
        let ts = Utc::now().timestamp();
        assert_eq!(days, ts / 86400);
    }
}
