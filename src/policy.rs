//! 表访问策略
//! 固定的表白名单，启动时加载，运行期只读共享

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use crate::config::TablesConfig;

/// 合法 SQL 标识符
static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// 判断字符串是否可以安全地作为表名或列名写入语句
pub fn is_valid_identifier(name: &str) -> bool {
    name.len() <= 63 && IDENTIFIER.is_match(name)
}

/// 系统目录给出的类型名，例如 `integer`、`timestamp with time zone`、`text[]`
static TYPE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_ .]*(\[\])*$").expect("type name pattern is valid")
});

/// 判断类型名是否可以写入 `CAST(... AS <type>)`
pub fn is_valid_type_name(name: &str) -> bool {
    name.len() <= 128 && TYPE_NAME.is_match(name)
}

/// 白名单中的表定义
#[derive(Debug, Clone, PartialEq, Eq)]
struct TableEntry {
    key_column: String,
}

/// 已通过白名单校验的表
///
/// 只能由 [`TableAllowList::resolve`] 构造，语句构建器只接受该类型，
/// 因此任何语句引用的表都必然在白名单内。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedTable<'a> {
    name: &'a str,
    key_column: &'a str,
}

impl<'a> AllowedTable<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// UPDATE / DELETE 的 WHERE 条件使用的主键列
    pub fn key_column(&self) -> &'a str {
        self.key_column
    }
}

/// 表白名单
#[derive(Debug, Clone, Default)]
pub struct TableAllowList {
    tables: HashMap<String, TableEntry>,
}

impl TableAllowList {
    /// 从 `(表名, 主键列)` 列表构建，非法标识符会被丢弃并记录警告
    pub fn new<I, T, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (T, K)>,
        T: Into<String>,
        K: Into<String>,
    {
        let mut tables = HashMap::new();
        for (table, key) in entries {
            let (table, key_column) = (table.into(), key.into());
            if !is_valid_identifier(&table) || !is_valid_identifier(&key_column) {
                tracing::warn!(table = %table, key_column = %key_column, "Skipping invalid allow-list entry");
                continue;
            }
            tables.insert(table, TableEntry { key_column });
        }
        Self { tables }
    }

    /// 从配置构建
    pub fn from_config(config: &TablesConfig) -> Result<Self, config::ConfigError> {
        let allow_list = Self::new(config.entries()?);
        tracing::info!(tables = allow_list.len(), "Table allow-list loaded");
        Ok(allow_list)
    }

    /// 精确、大小写敏感的成员判断
    pub fn is_allowed(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// 校验表名并返回可用于构建语句的句柄
    pub fn resolve(&self, name: &str) -> Option<AllowedTable<'_>> {
        self.tables
            .get_key_value(name)
            .map(|(name, entry)| AllowedTable {
                name: name.as_str(),
                key_column: entry.key_column.as_str(),
            })
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
