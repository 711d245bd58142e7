use std::fmt;

#[derive(Debug, Clone)]
pub enum LinkShortenerError {
    NotFound(String),
    Validation(String),
    Transport(String),
    DuplicateKey(String),
    Storage(String),
    Encoding(String),
    Configuration(String),
}

impl LinkShortenerError {
    /// 获取错误代码
    pub fn code(&self) -> &'static str {
        match self {
            LinkShortenerError::NotFound(_) => "E001",
            LinkShortenerError::Validation(_) => "E002",
            LinkShortenerError::Transport(_) => "E003",
            LinkShortenerError::DuplicateKey(_) => "E004",
            LinkShortenerError::Storage(_) => "E005",
            LinkShortenerError::Encoding(_) => "E006",
            LinkShortenerError::Configuration(_) => "E007",
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            LinkShortenerError::NotFound(_) => "Resource Not Found",
            LinkShortenerError::Validation(_) => "Validation Error",
            LinkShortenerError::Transport(_) => "Transport Error",
            LinkShortenerError::DuplicateKey(_) => "Duplicate Key Error",
            LinkShortenerError::Storage(_) => "Storage Engine Error",
            LinkShortenerError::Encoding(_) => "Encoding Error",
            LinkShortenerError::Configuration(_) => "Configuration Error",
        }
    }

    /// 获取错误详情
    pub fn message(&self) -> &str {
        match self {
            LinkShortenerError::NotFound(msg) => msg,
            LinkShortenerError::Validation(msg) => msg,
            LinkShortenerError::Transport(msg) => msg,
            LinkShortenerError::DuplicateKey(msg) => msg,
            LinkShortenerError::Storage(msg) => msg,
            LinkShortenerError::Encoding(msg) => msg,
            LinkShortenerError::Configuration(msg) => msg,
        }
    }

    /// 网络后端的连接、服务端、超时错误（重复主键也归入此类）
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            LinkShortenerError::Transport(_) | LinkShortenerError::DuplicateKey(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LinkShortenerError::NotFound(_))
    }

    /// Only configuration errors are allowed to terminate the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LinkShortenerError::Configuration(_))
    }

    /// 格式化为彩色输出（用于 CLI 模式）
    #[cfg(feature = "cli")]
    pub fn format_colored(&self) -> String {
        use colored::Colorize;
        format!(
            "{} {} {}\n  {}",
            "[ERROR]".red().bold(),
            self.code().yellow(),
            self.error_type().red(),
            self.message().white()
        )
    }

    /// 格式化为简洁输出
    pub fn format_simple(&self) -> String {
        format!("{}: {}", self.error_type(), self.message())
    }
}

impl fmt::Display for LinkShortenerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_simple())
    }
}

impl std::error::Error for LinkShortenerError {}

// 便捷的构造函数
impl LinkShortenerError {
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::NotFound(msg.into())
    }

    pub fn validation<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::Validation(msg.into())
    }

    pub fn transport<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::Transport(msg.into())
    }

    pub fn duplicate_key<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::DuplicateKey(msg.into())
    }

    pub fn storage<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::Storage(msg.into())
    }

    pub fn encoding<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::Encoding(msg.into())
    }

    pub fn configuration<T: Into<String>>(msg: T) -> Self {
        LinkShortenerError::Configuration(msg.into())
    }
}

// 为常见的错误类型实现 From trait
impl From<serde_json::Error> for LinkShortenerError {
    fn from(err: serde_json::Error) -> Self {
        LinkShortenerError::Encoding(err.to_string())
    }
}

impl From<std::io::Error> for LinkShortenerError {
    fn from(err: std::io::Error) -> Self {
        LinkShortenerError::Storage(err.to_string())
    }
}

impl From<rocksdb::Error> for LinkShortenerError {
    fn from(err: rocksdb::Error) -> Self {
        LinkShortenerError::Storage(err.into_string())
    }
}

/// MongoDB 重复主键错误码
const MONGO_DUPLICATE_KEY: i32 = 11000;

impl From<mongodb::error::Error> for LinkShortenerError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::{ErrorKind, WriteFailure};

        match err.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(we)) if we.code == MONGO_DUPLICATE_KEY => {
                LinkShortenerError::DuplicateKey(we.message.clone())
            }
            ErrorKind::BsonSerialization(_) | ErrorKind::BsonDeserialization(_) => {
                LinkShortenerError::Encoding(err.to_string())
            }
            _ => LinkShortenerError::Transport(err.to_string()),
        }
    }
}

impl From<mongodb::bson::ser::Error> for LinkShortenerError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        LinkShortenerError::Encoding(err.to_string())
    }
}

impl From<mongodb::bson::de::Error> for LinkShortenerError {
    fn from(err: mongodb::bson::de::Error) -> Self {
        LinkShortenerError::Encoding(err.to_string())
    }
}

impl From<tokio::task::JoinError> for LinkShortenerError {
    fn from(err: tokio::task::JoinError) -> Self {
        if err.is_panic() {
            LinkShortenerError::Storage(format!("storage task panicked: {}", err))
        } else {
            LinkShortenerError::Storage(format!("storage task cancelled: {}", err))
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkShortenerError>;
