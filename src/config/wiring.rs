//! 声明式装配配置
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "compact"
//!
//! [services.cache]
//! class = "MemoryCache"
//! scope = "process"
//! tags = ["warmup"]
//!
//! [arguments.Mailer]
//! host = "smtp.local"
//! port = 2525
//!
//! [[contexts]]
//! consumer = "AuditService"
//! interface = "Logger"
//! implementation = "FileLogger"
//! ```

use crate::errors::{ConfigError, Result};
use crate::infrastructure::container::Scope;
use crate::infrastructure::ContainerBuilder;
use crate::logging::{LogFormat, LoggingConfig};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

/// 日志段
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: String,
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl LoggingSection {
    /// 转换为日志系统配置
    pub fn to_logging_config(&self) -> std::result::Result<LoggingConfig, ConfigError> {
        let level = tracing::Level::from_str(&self.level).map_err(|_| {
            ConfigError::Invalid("logging.level".to_string(), format!("unknown level '{}'", self.level))
        })?;
        let format = match self.format.as_str() {
            "pretty" => LogFormat::Pretty,
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            other => {
                return Err(ConfigError::Invalid(
                    "logging.format".to_string(),
                    format!("unknown format '{}'", other),
                ))
            }
        };
        Ok(LoggingConfig {
            level,
            format,
            ..LoggingConfig::default()
        })
    }
}

/// 单个服务的声明
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceEntry {
    /// 绑定到的具体类型（或另一个服务ID）
    pub class: Option<String>,
    pub scope: Option<Scope>,
    pub tags: Vec<String>,
}

impl ServiceEntry {
    fn is_empty(&self) -> bool {
        self.class.is_none() && self.scope.is_none() && self.tags.is_empty()
    }
}

/// 上下文绑定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextEntry {
    pub consumer: String,
    pub interface: String,
    pub implementation: String,
}

/// 装配配置文件
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct WiringConfig {
    pub logging: LoggingSection,
    /// 保持文件中的顺序，标签按出现顺序登记
    pub services: IndexMap<String, ServiceEntry>,
    /// 具体类型 => 参数名 => 字面值
    pub arguments: BTreeMap<String, BTreeMap<String, Value>>,
    pub contexts: Vec<ContextEntry>,
}

impl WiringConfig {
    pub fn from_toml_str(content: &str) -> std::result::Result<Self, ConfigError> {
        Self::parse(content, "<inline>")
    }

    pub(crate) fn parse(content: &str, origin: &str) -> std::result::Result<Self, ConfigError> {
        let config: WiringConfig = toml::from_str(content)
            .map_err(|e| ConfigError::TomlParse(origin.to_string(), e))?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> std::result::Result<(), ConfigError> {
        for (id, entry) in &self.services {
            if entry.is_empty() {
                return Err(ConfigError::Invalid(
                    format!("services.{}", id),
                    "entry declares no class, scope or tags".to_string(),
                ));
            }
        }
        for (index, context) in self.contexts.iter().enumerate() {
            if context.consumer.is_empty()
                || context.interface.is_empty()
                || context.implementation.is_empty()
            {
                return Err(ConfigError::Invalid(
                    format!("contexts[{}]", index),
                    "consumer, interface and implementation must be non-empty".to_string(),
                ));
            }
        }
        self.logging.to_logging_config()?;
        Ok(())
    }

    /// 通过普通注册接口写入构建器（锁定规则照常生效）
    pub fn apply(&self, builder: &mut ContainerBuilder) -> Result<()> {
        for (id, entry) in &self.services {
            if let Some(class) = &entry.class {
                builder.bind(id, class)?;
            }
            if let Some(scope) = entry.scope {
                builder.set_scope(id, scope)?;
            }
            for tag in &entry.tags {
                builder.tag(tag, id)?;
            }
        }
        for (type_name, params) in &self.arguments {
            for (parameter, value) in params {
                builder.bind_argument(type_name, parameter, value.clone())?;
            }
        }
        for context in &self.contexts {
            builder.bind_context(&context.interface, &context.implementation, &context.consumer)?;
        }
        tracing::debug!(
            services = self.services.len(),
            argument_types = self.arguments.len(),
            contexts = self.contexts.len(),
            "装配配置已应用"
        );
        Ok(())
    }
}
