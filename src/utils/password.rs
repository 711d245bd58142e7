//! 链接访问密码
//!
//! 使用 Argon2id 哈希保存，空字符串表示链接没有密码

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

use crate::errors::{LinkShortenerError, Result};

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| LinkShortenerError::encoding(format!("Password hash error: {}", e)))
}

/// 存储的哈希无法解析时视为不匹配
pub fn verify_password(password: &str, hash: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is invalid: {}", e);
            false
        }
    }
}

/// 新建链接时的密码：为空则不设密码
pub fn process_new_password(password: Option<&str>) -> Result<String> {
    match password {
        Some(pwd) if !pwd.is_empty() => hash_password(pwd),
        _ => Ok(String::new()),
    }
}
