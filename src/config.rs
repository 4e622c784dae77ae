//! 配置系统
//! 从环境变量加载所有配置，使用 Secret 包装敏感信息

use config::{Config, ConfigError, Environment};
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;

use crate::policy::is_valid_identifier;

/// 默认允许访问的表（`表名:主键列`）
pub const DEFAULT_ALLOWED_TABLES: &str = "users:username,\
products:product_id,\
categories:category_id,\
departments:department_id,\
suppliers:supplier_id,\
employees:employee_id,\
delivery_documents:document_id,\
issue_documents:document_id,\
assignment_documents:document_id,\
delivery_document_items:item_id,\
issue_document_items:item_id,\
assignment_document_items:item_id,\
product_suppliers:product_supplier_id,\
employee_departments:employee_department_id";

/// 默认日期列
pub const DEFAULT_DATE_COLUMNS: &str = "stock_date";

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址，例如 "0.0.0.0:3000"
    pub addr: String,
    /// 优雅关闭超时时间（秒）
    pub graceful_shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库连接 URL（使用 Secret 包装，防止日志泄露）
    pub url: Secret<String>,
    /// 最大连接数
    pub max_connections: u32,
    /// 最小连接数
    pub min_connections: u32,
    /// 获取连接超时时间（秒）
    pub acquire_timeout_secs: u64,
    /// 空闲连接超时时间（秒）
    pub idle_timeout_secs: u64,
    /// 连接最大生命周期（秒）
    pub max_lifetime_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// 日志级别: trace, debug, info, warn, error
    pub level: String,
    /// 日志格式: json, pretty
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    /// JWT 签名密钥，无默认值，缺失时拒绝启动
    pub jwt_secret: Secret<String>,
    /// 会话令牌有效期（秒）
    pub token_exp_secs: u64,
    /// 是否接受旧版无盐 SHA-256 摘要
    pub accept_legacy_digests: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TablesConfig {
    /// 逗号分隔的 `表名:主键列` 列表
    pub allowed: String,
    /// 逗号分隔的日期列名
    pub date_columns: String,
}

impl TablesConfig {
    /// 解析允许访问的表及其主键列
    pub fn entries(&self) -> Result<Vec<(String, String)>, ConfigError> {
        split_list(&self.allowed)
            .map(|entry| {
                let (table, key) = entry.split_once(':').ok_or_else(|| {
                    ConfigError::Message(format!(
                        "Invalid table entry '{}': expected table:key_column",
                        entry
                    ))
                })?;
                Ok((table.trim().to_string(), key.trim().to_string()))
            })
            .collect()
    }

    /// 解析日期列名
    pub fn date_column_names(&self) -> Vec<String> {
        split_list(&self.date_columns).map(str::to_string).collect()
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub security: SecurityConfig,
    pub tables: TablesConfig,
}

impl AppConfig {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut settings = Config::builder();

        // 添加默认配置（jwt_secret 与 database.url 必须显式提供）
        settings = settings
            .set_default("server.addr", "0.0.0.0:3000")?
            .set_default("server.graceful_shutdown_timeout_secs", 30)?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 1)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("database.idle_timeout_secs", 600)?
            .set_default("database.max_lifetime_secs", 1800)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "json")?
            .set_default("security.token_exp_secs", 3600)?
            .set_default("security.accept_legacy_digests", false)?
            .set_default("tables.allowed", DEFAULT_ALLOWED_TABLES)?
            .set_default("tables.date_columns", DEFAULT_DATE_COLUMNS)?;

        // 从环境变量加载配置（前缀为 GATEWAY_）
        settings = settings.add_source(
            Environment::with_prefix("GATEWAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = settings.build()?.try_deserialize()?;

        // 验证配置
        config.validate()?;

        Ok(config)
    }

    /// 验证配置合法性
    pub fn validate(&self) -> Result<(), ConfigError> {
        // 验证端口范围
        if let Some(port_str) = self.server.addr.split(':').next_back() {
            if let Ok(port) = port_str.parse::<u16>() {
                if port != 0 && port < 1024 {
                    return Err(ConfigError::Message("Server port should be >= 1024".to_string()));
                }
            }
        }

        // 验证日志级别
        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                    self.logging.level
                )))
            }
        }

        // 验证日志格式
        match self.logging.format.to_lowercase().as_str() {
            "json" | "pretty" => {}
            _ => {
                return Err(ConfigError::Message(format!(
                    "Invalid log format: {}. Must be one of: json, pretty",
                    self.logging.format
                )))
            }
        }

        // 验证数据库连接池配置
        if self.database.max_connections < self.database.min_connections {
            return Err(ConfigError::Message(
                "max_connections must be >= min_connections".to_string(),
            ));
        }

        // 验证 JWT 密钥长度（至少 32 字符）
        if self.security.jwt_secret.expose_secret().trim().len() < 32 {
            return Err(ConfigError::Message(
                "JWT secret must be at least 32 characters long".to_string(),
            ));
        }

        // 验证令牌过期时间
        if self.security.token_exp_secs < 60 || self.security.token_exp_secs > 86400 {
            return Err(ConfigError::Message(
                "token_exp_secs must be between 60 and 86400 (1 minute to 24 hours)".to_string(),
            ));
        }

        // 验证表白名单
        let entries = self.tables.entries()?;
        if entries.is_empty() {
            return Err(ConfigError::Message("tables.allowed must not be empty".to_string()));
        }
        let mut seen = std::collections::HashSet::new();
        for (table, key) in &entries {
            for ident in [table, key] {
                if !is_valid_identifier(ident) {
                    return Err(ConfigError::Message(format!("Invalid identifier: '{}'", ident)));
                }
            }
            if !seen.insert(table.as_str()) {
                return Err(ConfigError::Message(format!("Duplicate table: '{}'", table)));
            }
        }

        for column in self.tables.date_column_names() {
            if !is_valid_identifier(&column) {
                return Err(ConfigError::Message(format!("Invalid date column: '{}'", column)));
            }
        }

        Ok(())
    }
}
