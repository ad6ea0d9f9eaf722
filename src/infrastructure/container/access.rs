//! 模块访问策略
//!
//! 注册第一个模块之前不做任何检查；之后永久开启。

use super::Registry;
use crate::errors::ContainerError;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct ModuleAccessPolicy {
    /// 模块名 => 公开的服务ID
    exposed: HashMap<String, HashSet<String>>,
    enforced: bool,
}

impl ModuleAccessPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// 开启边界检查（不可关闭）
    pub fn enable_enforcement(&mut self) {
        self.enforced = true;
    }

    pub fn is_enforced(&self) -> bool {
        self.enforced
    }

    /// 把服务登记为模块的公开服务
    pub fn expose(&mut self, module: &str, id: &str) {
        self.exposed
            .entry(module.to_string())
            .or_default()
            .insert(id.to_string());
    }

    pub fn is_exposed(&self, module: &str, id: &str) -> bool {
        self.exposed
            .get(module)
            .map_or(false, |ids| ids.contains(id))
    }

    /// 不属于任何模块的服务不受边界限制
    pub fn can_access(&self, registry: &Registry, id: &str, consumer_module: Option<&str>) -> bool {
        if !self.enforced {
            return true;
        }

        let Some(owner) = registry.module(id) else {
            return true;
        };

        if self.is_exposed(owner, id) {
            return true;
        }

        consumer_module == Some(owner)
    }

    /// `can_access` 为假时构造对应的边界错误
    pub fn check(
        &self,
        registry: &Registry,
        id: &str,
        consumer_module: Option<&str>,
    ) -> Result<(), ContainerError> {
        if self.can_access(registry, id, consumer_module) {
            return Ok(());
        }
        Err(ContainerError::ModuleBoundary {
            id: id.to_string(),
            module: registry.module(id).unwrap_or("unknown").to_string(),
            consumer_module: consumer_module.map(str::to_string),
        })
    }
}
