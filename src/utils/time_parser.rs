//! 过期时间解析
//!
//! 支持：
//! - RFC3339：2030-10-01T12:00:00Z
//! - 相对时间：1d, 2w, 1h30m, 1y（月按 30 天、年按 365 天计）
//! - 0 / never：永不过期

use chrono::{DateTime, Duration, Utc};

use crate::errors::{LinkShortenerError, Result};

/// Parse an expiry relative to `now` into unix seconds; `0` means never.
pub fn parse_expire(input: &str, now: DateTime<Utc>) -> Result<i64> {
    let input = input.trim();
    if input.is_empty() || input == "0" || input.eq_ignore_ascii_case("never") {
        return Ok(0);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        let at = dt.with_timezone(&Utc);
        if at <= now {
            return Err(LinkShortenerError::validation(format!(
                "expire time {} is in the past",
                input
            )));
        }
        return Ok(at.timestamp());
    }

    let offset = parse_relative(input)?;
    now.checked_add_signed(offset)
        .map(|at| at.timestamp())
        .ok_or_else(|| LinkShortenerError::validation("计算的过期时间超出了有效范围"))
}

fn parse_relative(input: &str) -> Result<Duration> {
    let invalid = || LinkShortenerError::validation(format!("无效的时间格式: '{}'", input));
    let out_of_range = || LinkShortenerError::validation(format!("时间间隔超出范围: '{}'", input));
    let mut total = Duration::zero();
    let mut rest = input;

    while !rest.is_empty() {
        let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if digits == 0 {
            return Err(invalid());
        }
        let num: i64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        // 大写 M 表示月，小写 m 表示分钟
        let step = match unit {
            "M" => num.checked_mul(30).and_then(Duration::try_days),
            _ => match unit.to_lowercase().as_str() {
                "s" | "sec" | "second" | "seconds" => Duration::try_seconds(num),
                "m" | "min" | "minute" | "minutes" => Duration::try_minutes(num),
                "h" | "hour" | "hours" => Duration::try_hours(num),
                "d" | "day" | "days" => Duration::try_days(num),
                "w" | "week" | "weeks" => Duration::try_weeks(num),
                "month" | "months" => num.checked_mul(30).and_then(Duration::try_days),
                "y" | "year" | "years" => num.checked_mul(365).and_then(Duration::try_days),
                "" => {
                    return Err(LinkShortenerError::validation(format!(
                        "缺少时间单位，数字 '{}' 后应跟时间单位",
                        num
                    )));
                }
                _ => {
                    return Err(LinkShortenerError::validation(format!(
                        "不支持的时间单位: '{}'",
                        unit
                    )));
                }
            },
        };
        total = step
            .and_then(|step| total.checked_add(&step))
            .ok_or_else(out_of_range)?;
    }

    if total == Duration::zero() {
        return Err(LinkShortenerError::validation("时间间隔不能为零"));
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_never() {
        assert_eq!(parse_expire("0", now()).unwrap(), 0);
        assert_eq!(parse_expire("never", now()).unwrap(), 0);
        assert_eq!(parse_expire("", now()).unwrap(), 0);
    }

    #[test]
    fn test_relative() {
        let base = now().timestamp();
        assert_eq!(parse_expire("1d", now()).unwrap(), base + 86_400);
        assert_eq!(parse_expire("1h30m", now()).unwrap(), base + 5_400);
        assert_eq!(parse_expire("1M", now()).unwrap(), base + 30 * 86_400);
        assert_eq!(parse_expire("2w", now()).unwrap(), base + 14 * 86_400);
    }

    #[test]
    fn test_rfc3339() {
        let at = parse_expire("2030-01-01T00:00:00Z", now()).unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap().timestamp());
        assert!(parse_expire("2020-01-01T00:00:00Z", now()).is_err());
    }

    #[test]
    fn test_invalid() {
        assert!(parse_expire("abc", now()).is_err());
        assert!(parse_expire("10", now()).is_err());
        assert!(parse_expire("5x", now()).is_err());
        assert!(parse_expire("0d", now()).is_err());
    }

    #[test]
    fn test_oversized_interval_is_rejected() {
        for input in [
            "999999999999999d",
            "999999999999999999M",
            "99999999999999999y",
            "999999999999999999w",
            "9223372036854775807s9223372036854775807s",
            "99999999999999999999d",
        ] {
            let err = parse_expire(input, now()).unwrap_err();
            assert!(
                matches!(err, LinkShortenerError::Validation(_)),
                "{}: {:?}",
                input,
                err
            );
        }
    }
}
