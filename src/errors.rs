// scopewire 错误处理模块
//
// 所有错误都是同步、本地且不可恢复的；每个错误都带上出错的服务ID，
// 必要时附带依赖链或模块对。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 容器错误
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContainerError {
    /// 没有绑定，也不是可构造的具体类型
    #[error("Service '{id}' is not registered and is not a constructible type")]
    NotFound { id: String },

    /// 服务ID在构造栈上再次出现
    #[error("Circular dependency detected for '{id}': {}", .chain.join(" -> "))]
    CircularDependency { id: String, chain: Vec<String> },

    /// 标量参数既没有参数绑定，也没有默认值
    #[error("Cannot resolve scalar parameter '{parameter}' of '{type_name}': bind an argument or declare a default")]
    UnresolvableScalar { type_name: String, parameter: String },

    /// 构造参数的类型是容器本身
    #[error("Injecting the container into '{consumer}' (parameter '{parameter}') is forbidden; declare the real dependencies instead")]
    ContainerInjectionForbidden { consumer: String, parameter: String },

    /// PROCESS 作用域的服务依赖了 TICK 作用域的服务
    #[error("Unsafe scope injection: process-scoped '{consumer}' cannot depend on tick-scoped '{dependency}'")]
    UnsafeScopeInjection { consumer: String, dependency: String },

    /// 跨模块访问未公开的服务
    #[error("{}", module_boundary_message(.id, .module, .consumer_module.as_deref()))]
    ModuleBoundary {
        id: String,
        module: String,
        consumer_module: Option<String>,
    },

    /// 构建器锁定后仍被修改
    #[error("Container builder is locked; '{operation}' is not allowed after build()")]
    BuilderImmutable { operation: String },

    /// 实例类型与请求的类型不一致
    #[error("Type cast failed for '{id}': expected '{expected}'")]
    TypeCastFailed { id: String, expected: String },

    /// 构造参数缺失或类型不匹配
    #[error("Argument '{parameter}' of '{type_name}' is invalid: {reason}")]
    ArgumentMismatch {
        type_name: String,
        parameter: String,
        reason: String,
    },

    /// 工厂或构造函数返回了错误
    #[error("Failed to create service '{id}': {reason}")]
    CreationFailed { id: String, reason: String },

    /// 配置文件应用失败
    #[error("Configuration error: {message}")]
    Config { message: String },
}

fn module_boundary_message(id: &str, module: &str, consumer: Option<&str>) -> String {
    match consumer {
        Some(consumer) => format!(
            "Service '{}' (internal to module '{}') cannot be accessed by module '{}'",
            id, module, consumer
        ),
        None => format!(
            "Service '{}' is internal to module '{}' and cannot be accessed from the outside",
            id, module
        ),
    }
}

impl ContainerError {
    pub fn not_found(id: impl Into<String>) -> Self {
        ContainerError::NotFound { id: id.into() }
    }

    pub fn creation_failed(id: impl Into<String>, reason: impl ToString) -> Self {
        ContainerError::CreationFailed {
            id: id.into(),
            reason: reason.to_string(),
        }
    }

    /// 在构建阶段就必须报告的错误（编译器不会把它们推迟到运行时）
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            ContainerError::ContainerInjectionForbidden { .. }
                | ContainerError::UnsafeScopeInjection { .. }
        )
    }

    /// 记录错误到日志
    pub fn log(&self) {
        match self {
            ContainerError::CircularDependency { .. }
            | ContainerError::ContainerInjectionForbidden { .. }
            | ContainerError::UnsafeScopeInjection { .. }
            | ContainerError::BuilderImmutable { .. } => {
                tracing::error!(error = %self, "container definition error");
            }
            ContainerError::ModuleBoundary { .. } => {
                tracing::warn!(error = %self, "module boundary violation");
            }
            _ => {
                tracing::warn!(error = %self, "service resolution failed");
            }
        }
    }
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Invalid configuration entry '{0}': {1}")]
    Invalid(String, String),
}

impl From<ConfigError> for ContainerError {
    fn from(err: ConfigError) -> Self {
        ContainerError::Config {
            message: err.to_string(),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_dependency_message_names_chain() {
        let err = ContainerError::CircularDependency {
            id: "a".to_string(),
            chain: vec!["a".to_string(), "b".to_string(), "a".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Circular dependency detected for 'a': a -> b -> a"
        );
    }

    #[test]
    fn test_module_boundary_message_with_and_without_consumer() {
        let external = ContainerError::ModuleBoundary {
            id: "repo".to_string(),
            module: "storage".to_string(),
            consumer_module: None,
        };
        assert!(external
            .to_string()
            .contains("is internal to module 'storage'"));

        let cross = ContainerError::ModuleBoundary {
            id: "repo".to_string(),
            module: "storage".to_string(),
            consumer_module: Some("billing".to_string()),
        };
        assert!(cross.to_string().contains("cannot be accessed by module 'billing'"));
    }

    #[test]
    fn test_error_survives_json_round_trip() {
        let err = ContainerError::UnresolvableScalar {
            type_name: "Mailer".to_string(),
            parameter: "host".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"kind\":\"unresolvable_scalar\""));
        let back: ContainerError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_definition_errors() {
        assert!(ContainerError::UnsafeScopeInjection {
            consumer: "a".into(),
            dependency: "b".into()
        }
        .is_definition_error());
        assert!(!ContainerError::not_found("x").is_definition_error());
    }

    #[test]
    fn test_config_error_converts() {
        let err: ContainerError =
            ConfigError::Invalid("services.x".to_string(), "bad scope".to_string()).into();
        assert!(matches!(err, ContainerError::Config { .. }));
    }
}
