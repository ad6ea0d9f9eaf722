//! Container module
//!
//! 解析引擎：注册表、构造计划、解析器，以及根容器/作用域容器。

pub mod access;
pub mod cache;
pub mod context;
pub mod metadata;
pub mod plan;
pub mod registry;
pub mod resolver;
pub mod root;
pub mod scoped;

pub use access::ModuleAccessPolicy;
pub use context::ResolutionContext;
pub use metadata::{Args, Argument, Constructor, ParamKind, ParamSpec, TypeCatalog, TypeMetadata};
pub use plan::{ArgumentPlan, ConstructionPlan};
pub use registry::{Binding, ContextualBinding, Registry};
pub use root::{Container, ContainerStats};
pub use scoped::{ScopeManager, ScopedContainer};

use crate::errors::{ContainerError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// 类型擦除后的服务实例
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 服务生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 整个进程生命周期只有一个实例
    Process,
    /// 在一个工作单元（tick/请求）内共享
    Tick,
    /// 每次请求都创建新实例
    #[default]
    Prototype,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Process => "process",
            Scope::Tick => "tick",
            Scope::Prototype => "prototype",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 以 Rust 类型名作为服务ID
pub fn service_id<T: ?Sized + 'static>() -> String {
    std::any::type_name::<T>().to_string()
}

/// 解析入口（容器、作用域容器与编译产物共同的公开契约）
pub trait Resolve: Send + Sync {
    /// 按ID获取实例
    fn get(&self, id: &str) -> Result<Instance>;

    /// 存在显式绑定，或ID是可构造的具体类型
    fn has(&self, id: &str) -> bool;

    /// 惰性解析某个标签下的全部服务
    fn get_tagged(&self, tag: &str) -> TaggedServices<'_>;
}

/// 带类型的解析
pub trait ResolveExt: Resolve {
    fn get_as<T: Send + Sync + 'static>(&self, id: &str) -> Result<Arc<T>> {
        downcast_instance(id, self.get(id)?)
    }
}

impl<R: Resolve + ?Sized> ResolveExt for R {}

pub(crate) fn downcast_instance<T: Send + Sync + 'static>(id: &str, instance: Instance) -> Result<Arc<T>> {
    instance
        .downcast::<T>()
        .map_err(|_| ContainerError::TypeCastFailed {
            id: id.to_string(),
            expected: std::any::type_name::<T>().to_string(),
        })
}

type TaggedFetch<'a> = Box<dyn FnMut(&str) -> Result<Instance> + 'a>;

/// `get_tagged` 返回的惰性序列：只能遍历一次，每一步才真正解析
pub struct TaggedServices<'a> {
    ids: std::vec::IntoIter<String>,
    fetch: Option<TaggedFetch<'a>>,
}

impl<'a> TaggedServices<'a> {
    pub fn new(ids: Vec<String>, fetch: impl FnMut(&str) -> Result<Instance> + 'a) -> Self {
        Self {
            ids: ids.into_iter(),
            fetch: Some(Box::new(fetch)),
        }
    }

    pub fn empty() -> Self {
        Self {
            ids: Vec::new().into_iter(),
            fetch: None,
        }
    }

    /// 剩余未解析的ID数量
    pub fn remaining(&self) -> usize {
        self.ids.len()
    }
}

impl Iterator for TaggedServices<'_> {
    type Item = Result<Instance>;

    fn next(&mut self) -> Option<Self::Item> {
        let fetch = self.fetch.as_mut()?;
        let id = self.ids.next()?;
        Some(fetch(&id))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.ids.len()))
    }
}

impl fmt::Debug for TaggedServices<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaggedServices")
            .field("remaining", &self.ids.as_slice())
            .finish()
    }
}

/// 作用域节点：在公开契约之外，提供跳过模块边界检查的内部获取
pub(crate) trait ResolutionScope: Resolve {
    fn fetch(&self, id: &str, internal: bool) -> Result<Instance>;

    fn as_resolve(&self) -> &dyn Resolve;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_defaults_to_prototype() {
        assert_eq!(Scope::default(), Scope::Prototype);
        assert_eq!(Scope::Tick.to_string(), "tick");
    }

    #[test]
    fn test_scope_deserializes_lowercase() {
        let scope: Scope = serde_json::from_str("\"process\"").unwrap();
        assert_eq!(scope, Scope::Process);
    }

    #[test]
    fn test_tagged_services_is_lazy() {
        let mut calls = 0;
        {
            let mut seq = TaggedServices::new(vec!["a".into(), "b".into()], |id| {
                calls += 1;
                Ok(Arc::new(id.to_string()) as Instance)
            });
            assert_eq!(seq.remaining(), 2);
            let first = seq.next().unwrap().unwrap();
            assert_eq!(first.downcast_ref::<String>().unwrap(), "a");
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_empty_tagged_services() {
        assert_eq!(TaggedServices::empty().count(), 0);
    }

    #[test]
    fn test_downcast_failure_reports_expected_type() {
        let instance: Instance = Arc::new(42u32);
        let err = downcast_instance::<String>("answer", instance).unwrap_err();
        assert!(matches!(err, ContainerError::TypeCastFailed { ref id, .. } if id == "answer"));
    }
}
