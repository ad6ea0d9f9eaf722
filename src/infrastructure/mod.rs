//! 基础设施层
//!
//! 提供依赖解析引擎，包括：
//! - 注册表、构造计划与解析器
//! - 根容器、作用域容器与作用域管理器
//! - 模块边界
//! - 编译器与依赖图

pub mod builder;
pub mod compiler;
pub mod container;
pub mod introspection;
pub mod module;
pub mod provider;

// 重新导出API
pub use builder::ContainerBuilder;
pub use compiler::{CompiledContainer, CompiledSlots, Compiler};
pub use container::{
    service_id, Container, ContainerStats, Instance, Resolve, ResolveExt, Scope, ScopeManager,
    ScopedContainer, TaggedServices,
};
pub use introspection::{DependencyGraph, ServiceKind, ServiceNode};
pub use module::{FnModule, Module};
pub use provider::{factory, instance_factory, ServiceFactory, SharedFactory};
