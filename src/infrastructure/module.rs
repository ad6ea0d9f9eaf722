//! 模块抽象层
//!
//! 模块是一组服务的命名边界：`configure` 里注册的服务归属该模块，
//! 只有 `exposed_services` 列出的ID对模块外可见。

use super::builder::ContainerBuilder;
use crate::errors::Result;

/// 模块接口
pub trait Module: Send + Sync {
    /// 模块名称，同时用作边界错误里的模块名
    fn name(&self) -> &str;

    /// 在构建器上注册本模块的服务
    fn configure(&self, builder: &mut ContainerBuilder) -> Result<()>;

    /// 对模块外公开的服务ID
    fn exposed_services(&self) -> Vec<String> {
        Vec::new()
    }
}

/// 用闭包快速定义模块
pub struct FnModule<F> {
    name: String,
    exposed: Vec<String>,
    configure: F,
}

impl<F> FnModule<F>
where
    F: Fn(&mut ContainerBuilder) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, configure: F) -> Self {
        Self {
            name: name.into(),
            exposed: Vec::new(),
            configure,
        }
    }

    pub fn expose(mut self, id: impl Into<String>) -> Self {
        self.exposed.push(id.into());
        self
    }
}

impl<F> Module for FnModule<F>
where
    F: Fn(&mut ContainerBuilder) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn configure(&self, builder: &mut ContainerBuilder) -> Result<()> {
        (self.configure)(builder)
    }

    fn exposed_services(&self) -> Vec<String> {
        self.exposed.clone()
    }
}

impl<F> std::fmt::Debug for FnModule<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnModule")
            .field("name", &self.name)
            .field("exposed", &self.exposed)
            .finish_non_exhaustive()
    }
}
