//! Link workflow
//!
//! Create, resolve, soft delete, access logging and paginated access stats,
//! written once against [`Table`] handles so it runs unchanged on either
//! storage backend.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::shorten::HashGenerator;
use crate::config::ShortenConfig;
use crate::errors::{LinkShortenerError, Result};
use crate::storage::codec::group_key;
use crate::storage::{
    ACCESS_TABLE, AccessLog, AccessLogField, Filter, FindOptions, IndexOrder, IndexSpec,
    LINK_TABLE, Link, LinkField, StoreContext, Table, Update,
};
use crate::utils::password::{process_new_password, verify_password};
use crate::utils::url_validator::validate_url;
use crate::utils::{generate_random_code, secure_token_eq};

/// 统计分页的最大页大小
pub const MAX_PAGE_SIZE: u64 = 100;

pub const ACCESS_HASH_INDEX: &str = "hash_index";

/// 健康检查使用的哨兵短链
pub const HEALTH_SENTINEL_HASH: &str = "000000";
const HEALTH_SENTINEL_URL: &str = "http://www.example.com/";

// ============ Request/Response DTOs ============

#[derive(Debug, Clone, Default)]
pub struct CreateLinkRequest {
    pub url: String,
    /// 明文密码，None 或空字符串表示不设密码
    pub password: Option<String>,
    pub memo: String,
    /// Unix 秒，0 表示永不过期
    pub expire: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedLink {
    pub hash: String,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveOutcome {
    Target(String),
    PasswordRequired,
    PasswordMismatch,
}

/// Visitor information of one access, already enriched by the caller.
#[derive(Debug, Clone, Default)]
pub struct AccessEvent {
    pub ip: String,
    pub user_agent: String,
    pub country: String,
    pub area: String,
    pub browser: String,
    pub os: String,
    pub device: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPage {
    pub current: u64,
    pub size: u64,
    pub pages: u64,
    pub total: u64,
    pub records: Vec<AccessLog>,
}

pub struct LinkService {
    links: Table<Link>,
    access: Table<AccessLog>,
    generator: HashGenerator,
    token_length: usize,
    max_insert_attempts: u32,
}

impl LinkService {
    pub fn new(ctx: &StoreContext, config: &ShortenConfig) -> Result<Self> {
        Ok(Self {
            links: ctx.table(LINK_TABLE)?,
            access: ctx.table(ACCESS_TABLE)?,
            generator: HashGenerator::new(config.seed, ctx.counter()),
            token_length: config.token_length.max(1),
            max_insert_attempts: config.max_insert_attempts.max(1),
        })
    }

    /// Secondary index used by access stats (networked backend only).
    pub async fn init_indexes(&self) -> Result<()> {
        let index = IndexSpec::new()
            .key(AccessLogField::Hash, IndexOrder::Asc)
            .name(ACCESS_HASH_INDEX);
        self.access.create_one_index(&index).await
    }

    /// Create a link under a freshly generated hash.
    ///
    /// A generated hash that is already taken is regenerated, up to
    /// `max_insert_attempts` times.
    pub async fn create_link(&self, req: CreateLinkRequest) -> Result<CreatedLink> {
        let url = validate_url(&req.url)?;
        if req.expire < 0 {
            return Err(LinkShortenerError::validation("expire cannot be negative"));
        }
        let password = process_new_password(req.password.as_deref())?;
        let token = generate_random_code(self.token_length);

        for attempt in 1..=self.max_insert_attempts {
            let hash = self.generator.generate(&url);

            if self.hash_taken(&hash).await? {
                warn!("Short hash collision on '{}' (attempt {})", hash, attempt);
                continue;
            }

            let link = Link {
                short_hash: hash.clone(),
                url: url.clone(),
                token: token.clone(),
                password: password.clone(),
                memo: req.memo.clone(),
                expire: req.expire,
                created: Utc::now().timestamp(),
                delete: false,
            };

            match self.links.insert_one(&link, &hash, false).await {
                Ok(_) => {
                    info!("LinkService: created '{}' -> '{}'", hash, url);
                    return Ok(CreatedLink { hash, token });
                }
                // 存在性检查与插入之间被抢占
                Err(LinkShortenerError::DuplicateKey(msg)) => {
                    warn!("Duplicate short hash '{}' on insert: {}", hash, msg);
                }
                Err(e) => return Err(e),
            }
        }

        Err(LinkShortenerError::duplicate_key(format!(
            "could not allocate a unique short hash after {} attempts",
            self.max_insert_attempts
        )))
    }

    /// Round trip through the link table: read the sentinel link and write
    /// it when absent. Works the same on both backends.
    pub async fn health_check(&self) -> Result<()> {
        if self.hash_taken(HEALTH_SENTINEL_HASH).await? {
            debug!("Health check: sentinel '{}' present", HEALTH_SENTINEL_HASH);
            return Ok(());
        }

        let sentinel = Link {
            short_hash: HEALTH_SENTINEL_HASH.to_string(),
            url: HEALTH_SENTINEL_URL.to_string(),
            token: generate_random_code(self.token_length),
            memo: "Test Hash".to_string(),
            created: Utc::now().timestamp(),
            ..Link::default()
        };
        match self
            .links
            .insert_one(&sentinel, HEALTH_SENTINEL_HASH, false)
            .await
        {
            // 并发的健康检查已经写入
            Ok(_) | Err(LinkShortenerError::DuplicateKey(_)) => {
                info!("Health check: sentinel '{}' written", HEALTH_SENTINEL_HASH);
                Ok(())
            }
            Err(e) => {
                warn!("Health check failed: {}", e);
                Err(e)
            }
        }
    }

    /// Whether any record (deleted or not) already uses `hash`.
    async fn hash_taken(&self, hash: &str) -> Result<bool> {
        let filter = Filter::new().eq(LinkField::ShortHash, hash);
        let n = self
            .links
            .count_documents(&filter, &FindOptions::by_key(hash))
            .await?;
        Ok(n > 0)
    }

    /// Non-deleted link by hash.
    pub async fn get_link(&self, hash: &str) -> Result<Link> {
        let filter = Filter::new()
            .eq(LinkField::ShortHash, hash)
            .eq(LinkField::Delete, false);
        self.links
            .find_one(&filter, &FindOptions::by_key(hash))
            .await
            .map_err(|e| match e {
                LinkShortenerError::NotFound(_) => {
                    LinkShortenerError::not_found(format!("Link '{}' not found", hash))
                }
                other => other,
            })
    }

    /// Resolve `hash` to its target, checking expiry and password.
    pub async fn resolve(&self, hash: &str, password: Option<&str>) -> Result<ResolveOutcome> {
        let link = self.get_link(hash).await?;

        if link.is_expired_at(Utc::now().timestamp()) {
            debug!("Link '{}' expired at {}", hash, link.expire);
            return Err(LinkShortenerError::not_found(format!(
                "Link '{}' has expired",
                hash
            )));
        }

        if link.has_password() {
            match password.filter(|p| !p.is_empty()) {
                None => return Ok(ResolveOutcome::PasswordRequired),
                Some(p) if !verify_password(p, &link.password) => {
                    info!("Password mismatch for '{}'", hash);
                    return Ok(ResolveOutcome::PasswordMismatch);
                }
                Some(_) => {}
            }
        }

        Ok(ResolveOutcome::Target(link.url))
    }

    /// Append an access record under `hash`. Returns the record id.
    pub async fn record_access(&self, hash: &str, event: AccessEvent) -> Result<String> {
        if hash.is_empty() {
            return Err(LinkShortenerError::validation("hash cannot be empty"));
        }
        let log = AccessLog {
            id: String::new(),
            hash: hash.to_string(),
            ip: event.ip,
            user_agent: event.user_agent,
            country: event.country,
            area: event.area,
            browser: event.browser,
            os: event.os,
            device: event.device,
            created: Utc::now().timestamp(),
        };
        self.access.insert_one(&log, hash, true).await
    }

    /// One page of access records, oldest first.
    pub async fn access_stats(
        &self,
        hash: &str,
        token: &str,
        page: u64,
        size: u64,
    ) -> Result<StatsPage> {
        if page == 0 || size == 0 || size > MAX_PAGE_SIZE {
            return Err(LinkShortenerError::validation(format!(
                "invalid pagination: page must be >= 1 and size in 1..={}",
                MAX_PAGE_SIZE
            )));
        }

        let link = self.links.find_by_id(hash).await?;
        self.check_token(&link, token)?;

        let filter = Filter::new().eq(AccessLogField::Hash, hash);
        let scan = FindOptions::by_prefix(group_key(hash));
        let total = self.access.count_documents(&filter, &scan).await?;
        let pages = total.div_ceil(size);

        if total == 0 || page > pages {
            return Ok(StatsPage {
                current: page,
                size,
                pages: 0,
                total: 0,
                records: Vec::new(),
            });
        }

        let opts = scan.skip((page - 1) * size).limit(size);
        let records = self.access.find(&filter, &opts).await?;
        Ok(StatsPage {
            current: page,
            size,
            pages,
            total,
            records,
        })
    }

    /// Soft delete: the record stays, `delete` is set.
    pub async fn delete_link(&self, hash: &str, token: &str) -> Result<()> {
        let link = self.get_link(hash).await?;
        self.check_token(&link, token)?;

        self.links
            .update_by_id(hash, &Update::new().set(LinkField::Delete, true))
            .await?;
        info!("LinkService: deleted '{}'", hash);
        Ok(())
    }

    fn check_token(&self, link: &Link, token: &str) -> Result<()> {
        if secure_token_eq(token, &link.token) {
            Ok(())
        } else {
            warn!("Token mismatch for '{}'", link.short_hash);
            Err(LinkShortenerError::validation("token does not match"))
        }
    }
}
