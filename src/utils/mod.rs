pub mod password;
pub mod time_parser;
pub mod url_validator;

/// base62 字母表：数字、小写、大写
const BASE62_ALPHABET: &[u8; 62] =
    b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

pub fn generate_random_code(length: usize) -> String {
    use std::iter;

    // 随机选择字母和数字
    let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    // 生成指定长度的随机字符串
    iter::repeat_with(|| chars[rand::random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}

/// Encode `value` in base62 without padding; `0` encodes as `"0"`.
pub fn encode_base62(mut value: u32) -> String {
    if value == 0 {
        return "0".to_string();
    }

    // u32::MAX 在 base62 下为 6 位
    let mut buf = [0u8; 6];
    let mut pos = buf.len();
    while value > 0 {
        pos -= 1;
        buf[pos] = BASE62_ALPHABET[(value % 62) as usize];
        value /= 62;
    }
    buf[pos..].iter().map(|&b| b as char).collect()
}

/// 常量时间比较令牌，避免时序侧信道
pub fn secure_token_eq(provided: &str, expected: &str) -> bool {
    use subtle::ConstantTimeEq;
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}
