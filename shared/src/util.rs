/// 获取当前 UTC 时间戳（毫秒）
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Current UTC timestamp in epoch seconds (marketplace wire unit).
pub fn now_secs() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Marketplace epoch seconds → storage millis.
pub fn secs_to_millis(secs: i64) -> i64 {
    secs.saturating_mul(1000)
}

/// Same conversion threaded through an optional wire field.
/// Zero is treated as absent (the marketplace sends 0 for unset timestamps).
pub fn opt_secs_to_millis(secs: Option<i64>) -> Option<i64> {
    match secs {
        Some(s) if s > 0 => Some(secs_to_millis(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secs_to_millis() {
        assert_eq!(secs_to_millis(1_747_267_200), 1_747_267_200_000);
        assert_eq!(secs_to_millis(0), 0);
    }

    #[test]
    fn test_opt_secs_treats_zero_as_absent() {
        assert_eq!(opt_secs_to_millis(Some(0)), None);
        assert_eq!(opt_secs_to_millis(None), None);
        assert_eq!(opt_secs_to_millis(Some(5)), Some(5000));
    }
}
