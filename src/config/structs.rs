use serde::{Deserialize, Serialize};

use crate::errors::{LinkShortenerError, Result};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
pub const ENV_PREFIX: &str = "LS";

/// 静态配置（从 TOML 加载，启动时使用）
///
/// - database: 存储后端选择与连接参数
/// - shorten: 短链生成参数
/// - logging: 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StaticConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub shorten: ShortenConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl StaticConfig {
    /// 从 TOML 文件和环境变量加载配置
    ///
    /// 优先级：ENV > 配置文件 > 默认值
    /// ENV 前缀：LS，分隔符：__
    /// 示例：LS__DATABASE__BACKEND=networked
    pub fn load_from(path: &str) -> Result<Self> {
        use config::{Config, Environment, File};

        let builder = Config::builder()
            // 1. 从 TOML 文件加载（可选）
            .add_source(File::with_name(path).required(false))
            // 2. 从环境变量覆盖
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("database.networked.hosts")
                    .try_parsing(true),
            );

        let settings = builder.build().map_err(|e| {
            LinkShortenerError::configuration(format!("Failed to build config: {}", e))
        })?;
        let config = settings.try_deserialize::<StaticConfig>().map_err(|e| {
            LinkShortenerError::configuration(format!("Failed to deserialize config: {}", e))
        })?;

        if std::path::Path::new(path).exists() {
            eprintln!("[INFO] Configuration loaded from: {}", path);
        }
        Ok(config)
    }

    /// 生成示例 TOML 配置文件
    pub fn generate_sample_config() -> String {
        let sample_config = Self::default();
        toml::to_string_pretty(&sample_config)
            .unwrap_or_else(|e| format!("Error generating sample config: {}", e))
    }

    /// 保存配置到 TOML 文件
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            LinkShortenerError::configuration(format!("Failed to serialize config: {}", e))
        })?;

        if let Some(parent) = path.as_ref().parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// embedded | networked（别名：rocksdb, badgerdb, mongodb）
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub embedded: EmbeddedConfig,
    #[serde(default)]
    pub networked: NetworkedConfig,
}

/// 嵌入式 RocksDB 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddedConfig {
    #[serde(default = "default_embedded_path")]
    pub path: String,
    /// 仅内存模式（进程退出后数据丢失）
    #[serde(default)]
    pub in_memory: bool,
    /// 事务锁等待时间（毫秒）
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

/// MongoDB 连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkedConfig {
    /// 连接名，用于连接池索引
    #[serde(default = "default_connection_name")]
    pub name: String,
    /// host:port 列表，多于一个时按集群连接
    #[serde(default = "default_hosts")]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_database_name")]
    pub database: String,
    #[serde(default)]
    pub replica_set: Option<String>,
    /// 秒
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,
    /// 单次操作超时（秒）
    #[serde(default = "default_execute_timeout")]
    pub execute_timeout: u64,
    #[serde(default = "default_min_pool_size")]
    pub min_pool_size: u32,
    #[serde(default = "default_max_pool_size")]
    pub max_pool_size: u32,
    /// 空闲连接回收时间（分钟）
    #[serde(default = "default_max_conn_idle_time")]
    pub max_conn_idle_time: u64,
    /// 关闭连接池的最长等待时间（秒）
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
}

/// 短链生成配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShortenConfig {
    /// xxh32 种子
    #[serde(default = "default_seed")]
    pub seed: u32,
    /// 管理令牌长度
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    /// 短码冲突时的最大尝试次数
    #[serde(default = "default_max_insert_attempts")]
    pub max_insert_attempts: u32,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
    #[serde(default = "default_log_file")]
    pub file: Option<String>,
    #[serde(default = "default_max_backups")]
    pub max_backups: u32,
    #[serde(default = "default_enable_rotation")]
    pub enable_rotation: bool,
}

// ============================================================
// Default value functions
// ============================================================

fn default_backend() -> String {
    "embedded".to_string()
}

fn default_embedded_path() -> String {
    "data/linkshortener".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    5000
}

fn default_connection_name() -> String {
    "default".to_string()
}

fn default_hosts() -> Vec<String> {
    vec!["127.0.0.1:27017".to_string()]
}

fn default_database_name() -> String {
    "linkshortener".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_execute_timeout() -> u64 {
    10
}

fn default_min_pool_size() -> u32 {
    1
}

fn default_max_pool_size() -> u32 {
    50
}

fn default_max_conn_idle_time() -> u64 {
    5
}

fn default_shutdown_grace_secs() -> u64 {
    20
}

fn default_seed() -> u32 {
    0x5eed_1157
}

fn default_token_length() -> usize {
    16
}

fn default_max_insert_attempts() -> u32 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_log_file() -> Option<String> {
    None
}

fn default_max_backups() -> u32 {
    5
}

fn default_enable_rotation() -> bool {
    true
}

// ============================================================
// Default implementations
// ============================================================

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            embedded: EmbeddedConfig::default(),
            networked: NetworkedConfig::default(),
        }
    }
}

impl Default for EmbeddedConfig {
    fn default() -> Self {
        Self {
            path: default_embedded_path(),
            in_memory: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl Default for NetworkedConfig {
    fn default() -> Self {
        Self {
            name: default_connection_name(),
            hosts: default_hosts(),
            user: String::new(),
            password: String::new(),
            database: default_database_name(),
            replica_set: None,
            connect_timeout: default_connect_timeout(),
            execute_timeout: default_execute_timeout(),
            min_pool_size: default_min_pool_size(),
            max_pool_size: default_max_pool_size(),
            max_conn_idle_time: default_max_conn_idle_time(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
        }
    }
}

impl Default for ShortenConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            token_length: default_token_length(),
            max_insert_attempts: default_max_insert_attempts(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: default_log_file(),
            max_backups: default_max_backups(),
            enable_rotation: default_enable_rotation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_config_round_trips() {
        let sample = StaticConfig::generate_sample_config();
        assert!(sample.contains("[database]"));
        let parsed: StaticConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.database.backend, "embedded");
        assert_eq!(parsed.shorten.token_length, 16);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: StaticConfig = toml::from_str(
            r#"
            [database]
            backend = "mongodb"

            [database.networked]
            hosts = ["db1:27017", "db2:27017"]
            replica_set = "rs0"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.database.backend, "mongodb");
        assert_eq!(parsed.database.networked.hosts.len(), 2);
        assert_eq!(parsed.database.networked.execute_timeout, 10);
        assert_eq!(parsed.database.embedded.lock_timeout_ms, 5000);
        assert_eq!(parsed.logging.level, "info");
    }
}
