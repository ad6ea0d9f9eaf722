//! 编译容器的运行时
//!
//! 内存中的编译容器和生成的源码共用这一套缓存与循环检测。
//! 根运行时服务所有ID；子运行时只服务与自身作用域一致的 TICK 服务，
//! 其余交回根运行时。

use crate::errors::{ContainerError, Result};
use crate::infrastructure::container::cache::InstanceCache;
use crate::infrastructure::container::{
    Args, Constructor, Instance, Resolve, ResolutionContext, Scope,
};
use crate::infrastructure::provider::SharedFactory;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct Runtime {
    context: Arc<ResolutionContext>,
    process: Arc<InstanceCache>,
    local: Option<(Scope, Arc<InstanceCache>)>,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            context: Arc::new(ResolutionContext::new()),
            process: Arc::new(InstanceCache::new()),
            local: None,
        }
    }

    /// 子运行时：共享进程缓存和解析上下文，拥有自己的作用域缓存
    pub fn child(&self, scope: Scope) -> Self {
        Self {
            context: self.context.clone(),
            process: self.process.clone(),
            local: Some((scope, Arc::new(InstanceCache::new()))),
        }
    }

    /// 同一进程的根运行时
    pub fn root(&self) -> Self {
        Self {
            context: self.context.clone(),
            process: self.process.clone(),
            local: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.local.is_none()
    }

    pub fn scope(&self) -> Scope {
        self.local
            .as_ref()
            .map_or(Scope::Process, |(scope, _)| *scope)
    }

    /// 本运行时是否负责声明作用域为 `scope` 的服务
    pub fn serves(&self, scope: Scope) -> bool {
        match &self.local {
            None => true,
            Some((own, _)) => *own == Scope::Tick && scope == *own,
        }
    }

    /// 按作用域规则取缓存或构造；`build` 在入栈后执行
    pub fn get_or_build<F>(&self, id: &str, scope: Scope, build: F) -> Result<Instance>
    where
        F: FnOnce() -> Result<Instance>,
    {
        self.context.ensure_not_building(id)?;

        let cache = match (scope, &self.local) {
            (Scope::Process, None) => Some(self.process.as_ref()),
            (Scope::Tick, Some((Scope::Tick, local))) => Some(local.as_ref()),
            _ => None,
        };
        let construct = || {
            let _guard = self.context.enter(id)?;
            build()
        };

        match cache {
            Some(cache) => Ok(cache
                .get_or_try_insert(id, &self.context, construct)?
                .into_instance()),
            None => construct(),
        }
    }

    /// 正在构造的ID绑定到了另一个具体类型；两者在循环检测中算同一帧
    pub fn building_as(&self, concrete: &str) -> Result<()> {
        self.context.building_as(concrete)
    }

    pub fn current_consumer(&self) -> Option<String> {
        self.context.current_consumer()
    }

    /// 本运行时自己的缓存中已构造的ID
    pub fn resolved_ids(&self) -> Vec<String> {
        match &self.local {
            None => self.process.resolved_ids(),
            Some((_, local)) => local.resolved_ids(),
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("scope", &self.scope())
            .field("resolved", &self.resolved_ids())
            .finish()
    }
}

/// 生成的源码所需的构造函数、工厂与参数对象
#[derive(Clone, Default)]
pub struct CompiledSlots {
    constructors: HashMap<String, Constructor>,
    factories: HashMap<String, SharedFactory>,
    parameter_objects: HashMap<String, Instance>,
}

impl CompiledSlots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_constructor(&mut self, type_name: &str, constructor: Constructor) {
        self.constructors.insert(type_name.to_string(), constructor);
    }

    /// 工厂槽位：服务ID，或上下文工厂的 `context:<消费者>:<依赖>`
    pub fn insert_factory(&mut self, slot: &str, factory: SharedFactory) {
        self.factories.insert(slot.to_string(), factory);
    }

    pub fn insert_parameter_object(&mut self, type_name: &str, instance: Instance) {
        self.parameter_objects.insert(type_name.to_string(), instance);
    }

    pub fn construct(&self, type_name: &str, args: Args) -> Result<Instance> {
        let constructor = self.constructors.get(type_name).ok_or_else(|| {
            ContainerError::creation_failed(type_name, "no constructor slot was provided")
        })?;
        constructor(args)
    }

    pub fn call(&self, slot: &str, container: &dyn Resolve) -> Result<Instance> {
        let factory = self.factories.get(slot).ok_or_else(|| {
            ContainerError::creation_failed(slot, "no factory slot was provided")
        })?;
        factory.create(container)
    }

    pub fn parameter_object(&self, type_name: &str) -> Result<Instance> {
        self.parameter_objects.get(type_name).cloned().ok_or_else(|| {
            ContainerError::creation_failed(type_name, "no parameter object was provided")
        })
    }

    pub fn has_factory(&self, slot: &str) -> bool {
        self.factories.contains_key(slot)
    }

    pub fn has_constructor(&self, type_name: &str) -> bool {
        self.constructors.contains_key(type_name)
    }
}

impl std::fmt::Debug for CompiledSlots {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut constructors: Vec<_> = self.constructors.keys().collect();
        constructors.sort();
        let mut factories: Vec<_> = self.factories.keys().collect();
        factories.sort();
        f.debug_struct("CompiledSlots")
            .field("constructors", &constructors)
            .field("factories", &factories)
            .field("parameter_objects", &self.parameter_objects.len())
            .finish()
    }
}

/// 生成代码中的字面值
pub fn literal(json: &str) -> Result<Value> {
    serde_json::from_str(json).map_err(|e| ContainerError::Config {
        message: format!("invalid literal in compiled container: {}", e),
    })
}

/// 生成代码中编译期记录下来的错误
pub fn deferred(json: &str) -> ContainerError {
    serde_json::from_str(json).unwrap_or_else(|e| ContainerError::Config {
        message: format!("invalid deferred error in compiled container: {}", e),
    })
}
