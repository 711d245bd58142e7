use chrono::{TimeZone, Utc};

use linkshortener::errors::LinkShortenerError;
use linkshortener::utils::password::{process_new_password, verify_password};
use linkshortener::utils::time_parser::parse_expire;
use linkshortener::utils::{encode_base62, generate_random_code, secure_token_eq};

#[cfg(test)]
mod base62_tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(encode_base62(0), "0");
        assert_eq!(encode_base62(61), "Z");
        assert_eq!(encode_base62(62), "10");
        assert_eq!(encode_base62(u32::MAX), "4GFfc3");
    }

    #[test]
    fn test_digit_boundaries() {
        assert_eq!(encode_base62(3843), "ZZ");
        assert_eq!(encode_base62(3844), "100");
        for value in [1, 61, 62, 3843, 3844, u32::MAX - 1, u32::MAX] {
            let code = encode_base62(value);
            assert!(code.len() <= 6);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }
}

#[cfg(test)]
mod token_tests {
    use super::*;

    #[test]
    fn test_random_code_length_and_charset() {
        for len in [1, 6, 16, 64] {
            let code = generate_random_code(len);
            assert_eq!(code.len(), len);
            assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
        }
        assert_ne!(generate_random_code(16), generate_random_code(16));
    }

    #[test]
    fn test_secure_token_eq() {
        assert!(secure_token_eq("abc", "abc"));
        assert!(!secure_token_eq("abc", "abd"));
        assert!(!secure_token_eq("abc", "abcd"));
        assert!(!secure_token_eq("", "abc"));
    }
}

#[cfg(test)]
mod password_tests {
    use super::*;

    #[test]
    fn test_no_password() {
        assert_eq!(process_new_password(None).unwrap(), "");
        assert_eq!(process_new_password(Some("")).unwrap(), "");
    }

    #[test]
    fn test_password_is_hashed() {
        let hash = process_new_password(Some("hunter2")).unwrap();
        assert_ne!(hash, "hunter2");
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
        assert!(!verify_password("hunter2", "not-a-hash"));
    }
}

#[cfg(test)]
mod expire_tests {
    use super::*;

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_never() {
        for input in ["", "0", "never", "NEVER"] {
            assert_eq!(parse_expire(input, now()).unwrap(), 0);
        }
    }

    #[test]
    fn test_year_and_units_combine() {
        let base = now().timestamp();
        assert_eq!(parse_expire("1y2d", now()).unwrap(), base + 367 * 86400);
    }

    #[test]
    fn test_invalid() {
        for input in ["abc", "5", "1x", "h1"] {
            let err = parse_expire(input, now()).unwrap_err();
            assert!(matches!(err, LinkShortenerError::Validation(_)), "{}", input);
        }
    }
}
