//! 内存中的编译容器
//!
//! 所有构造计划在编译时求出；运行期只按计划执行，不再查询注册表的绑定。
//! 对外分发只暴露访问策略允许的ID。

use super::runtime::Runtime;
use crate::errors::{ContainerError, Result};
use crate::infrastructure::container::{
    ConstructionPlan, Instance, ModuleAccessPolicy, Registry, Resolve, ResolutionScope, Scope,
    TaggedServices,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// 编译结果中的一项
#[derive(Debug, Clone)]
pub enum CompiledEntry {
    Plan(Arc<ConstructionPlan>),
    /// 推迟到调用时才报告的错误（与解释执行路径首次调用时一致）
    Deferred(ContainerError),
}

#[derive(Debug)]
pub(crate) struct CompiledDefinition {
    pub(crate) entries: BTreeMap<String, CompiledEntry>,
    pub(crate) registry: Registry,
    pub(crate) policy: ModuleAccessPolicy,
}

impl CompiledDefinition {
    fn consumer_module(&self, runtime: &Runtime) -> Option<String> {
        let consumer = runtime.current_consumer()?;
        self.registry.module(&consumer).map(str::to_string)
    }
}

/// 编译容器（根或子作用域）
#[derive(Clone)]
pub struct CompiledContainer {
    definition: Arc<CompiledDefinition>,
    runtime: Runtime,
    root: Option<Box<CompiledContainer>>,
}

impl CompiledContainer {
    pub(crate) fn new(definition: CompiledDefinition) -> Self {
        Self {
            definition: Arc::new(definition),
            runtime: Runtime::new(),
            root: None,
        }
    }

    /// 创建子作用域；子作用域与根共享进程缓存和解析上下文
    pub fn create_scope(&self, scope: Scope) -> CompiledContainer {
        let root = self.root().clone();
        CompiledContainer {
            definition: self.definition.clone(),
            runtime: root.runtime.child(scope),
            root: Some(Box::new(root)),
        }
    }

    fn root(&self) -> &CompiledContainer {
        self.root.as_deref().unwrap_or(self)
    }

    pub fn scope(&self) -> Scope {
        self.runtime.scope()
    }

    /// 编译出的全部服务ID
    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.definition.entries.keys().map(String::as_str)
    }

    /// 通过分发入口可以从外部获取的ID
    pub fn exposed_ids(&self) -> Vec<&str> {
        self.service_ids()
            .filter(|id| {
                self.definition
                    .policy
                    .can_access(&self.definition.registry, id, None)
            })
            .collect()
    }

    pub fn entry(&self, id: &str) -> Option<&CompiledEntry> {
        self.definition.entries.get(id)
    }

    /// 本容器缓存中已构造的ID
    pub fn resolved_ids(&self) -> Vec<String> {
        self.runtime.resolved_ids()
    }

    /// 分发入口的访问检查：外部请求看不到未公开的ID，
    /// 工厂内部跨模块请求报告边界错误
    fn dispatch_check(&self, id: &str) -> Result<()> {
        let definition = &self.definition;
        let consumer_module = definition.consumer_module(&self.runtime);
        if definition
            .policy
            .can_access(&definition.registry, id, consumer_module.as_deref())
        {
            return Ok(());
        }
        match consumer_module {
            None => Err(ContainerError::not_found(id)),
            Some(_) => definition
                .policy
                .check(&definition.registry, id, consumer_module.as_deref()),
        }
    }
}

impl ResolutionScope for CompiledContainer {
    fn fetch(&self, id: &str, internal: bool) -> Result<Instance> {
        if !internal {
            self.dispatch_check(id)?;
        }

        let entry = self
            .definition
            .entries
            .get(id)
            .ok_or_else(|| ContainerError::not_found(id))?;
        let scope = self.definition.registry.scope(id);
        if !self.runtime.serves(scope) {
            return self.root().fetch(id, internal);
        }

        self.runtime.get_or_build(id, scope, || match entry {
            CompiledEntry::Plan(plan) => {
                if let Some(concrete) = plan.constructed_as() {
                    self.runtime.building_as(concrete)?;
                }
                plan.execute(self)
            }
            CompiledEntry::Deferred(err) => Err(err.clone()),
        })
    }

    fn as_resolve(&self) -> &dyn Resolve {
        self
    }
}

impl Resolve for CompiledContainer {
    fn get(&self, id: &str) -> Result<Instance> {
        self.fetch(id, false).map_err(|err| {
            err.log();
            err
        })
    }

    fn has(&self, id: &str) -> bool {
        self.definition.entries.contains_key(id)
    }

    fn get_tagged(&self, tag: &str) -> TaggedServices<'_> {
        let definition = &self.definition;
        let consumer_module = definition.consumer_module(&self.runtime);
        let ids: Vec<String> = definition
            .registry
            .tagged(tag)
            .iter()
            .filter(|id| {
                definition
                    .policy
                    .can_access(&definition.registry, id, consumer_module.as_deref())
            })
            .cloned()
            .collect();
        if ids.is_empty() {
            return TaggedServices::empty();
        }
        TaggedServices::new(ids, move |id| self.fetch(id, true))
    }
}

impl std::fmt::Debug for CompiledContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledContainer")
            .field("services", &self.definition.entries.len())
            .field("runtime", &self.runtime)
            .finish()
    }
}
