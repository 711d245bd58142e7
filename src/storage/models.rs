use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use super::record::{Record, RecordField};

pub const LINK_TABLE: &str = "links";
pub const ACCESS_TABLE: &str = "link_access";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    #[serde(rename = "_id", default)]
    pub short_hash: String,
    pub url: String,
    /// 管理令牌（查看统计、删除）
    pub token: String,
    /// argon2 哈希，空字符串表示无密码
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub memo: String,
    /// Unix 秒，0 表示永不过期
    #[serde(default)]
    pub expire: i64,
    pub created: i64,
    #[serde(default)]
    pub delete: bool,
}

impl Link {
    pub fn has_password(&self) -> bool {
        !self.password.is_empty()
    }

    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expire > 0 && self.expire <= now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LinkField {
    #[strum(serialize = "_id")]
    ShortHash,
    Url,
    Token,
    Password,
    Memo,
    Expire,
    Created,
    Delete,
}

impl RecordField for LinkField {
    fn name(self) -> &'static str {
        self.into()
    }
}

impl Record for Link {
    type Field = LinkField;
}

/// One visit of a short link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLog {
    #[serde(rename = "_id", default)]
    pub id: String,
    pub hash: String,
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub area: String,
    #[serde(default)]
    pub browser: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub device: String,
    pub created: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum AccessLogField {
    #[strum(serialize = "_id")]
    Id,
    Hash,
    Ip,
    UserAgent,
    Country,
    Area,
    Browser,
    Os,
    Device,
    Created,
}

impl RecordField for AccessLogField {
    fn name(self) -> &'static str {
        self.into()
    }
}

impl Record for AccessLog {
    type Field = AccessLogField;
}
