//! 作用域容器与作用域管理器
//!
//! 作用域容器只缓存 TICK 作用域且与自身作用域一致的服务，
//! 其它一律整体委托给根容器。丢弃作用域容器即丢弃它的缓存。

use super::cache::InstanceCache;
use super::{Container, Instance, Resolve, ResolutionScope, Scope, TaggedServices};
use crate::errors::Result;
use crate::logging::OperationTimer;
use uuid::Uuid;

/// 一个工作单元内的子容器
pub struct ScopedContainer<'a> {
    parent: &'a Container,
    scope: Scope,
    id: Uuid,
    instances: InstanceCache,
}

impl<'a> ScopedContainer<'a> {
    pub(crate) fn new(parent: &'a Container, scope: Scope) -> Self {
        let id = Uuid::new_v4();
        tracing::debug!(scope = %scope, scope_id = %id, "创建作用域容器");
        Self {
            parent,
            scope,
            id,
            instances: InstanceCache::new(),
        }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// 作用域实例ID（日志关联用）
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn parent(&self) -> &'a Container {
        self.parent
    }

    /// 本作用域缓存中已构造的ID
    pub fn resolved_ids(&self) -> Vec<String> {
        self.instances.resolved_ids()
    }

    /// 由本容器管理：声明作用域与自身一致，且不是进程级或原型
    fn manages(&self, id: &str) -> bool {
        self.scope == Scope::Tick && self.parent.registry().scope(id) == self.scope
    }
}

impl ResolutionScope for ScopedContainer<'_> {
    fn fetch(&self, id: &str, internal: bool) -> Result<Instance> {
        if !self.manages(id) {
            return self.parent.fetch(id, internal);
        }

        self.parent.count_resolution();
        if !internal {
            self.parent.check_access(id)?;
        }
        self.parent.context().ensure_not_building(id)?;

        let lookup = self
            .instances
            .get_or_try_insert(id, self.parent.context(), || self.parent.construct(id, self))?;
        Ok(lookup.into_instance())
    }

    fn as_resolve(&self) -> &dyn Resolve {
        self
    }
}

impl Resolve for ScopedContainer<'_> {
    fn get(&self, id: &str) -> Result<Instance> {
        self.fetch(id, false).map_err(|err| {
            err.log();
            err
        })
    }

    fn has(&self, id: &str) -> bool {
        self.parent.has(id)
    }

    fn get_tagged(&self, tag: &str) -> TaggedServices<'_> {
        let ids = self.parent.visible_tagged(tag);
        if ids.is_empty() {
            return TaggedServices::empty();
        }
        TaggedServices::new(ids, move |id| self.fetch(id, true))
    }
}

impl std::fmt::Debug for ScopedContainer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedContainer")
            .field("scope", &self.scope)
            .field("id", &self.id)
            .field("instances", &self.instances)
            .finish()
    }
}

impl Drop for ScopedContainer<'_> {
    fn drop(&mut self) {
        tracing::debug!(
            scope = %self.scope,
            scope_id = %self.id,
            released = self.instances.len(),
            "释放作用域容器"
        );
    }
}

/// 作用域管理器：创建作用域容器，执行工作单元，然后丢弃它
#[derive(Debug, Clone, Copy)]
pub struct ScopeManager<'a> {
    container: &'a Container,
}

impl<'a> ScopeManager<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// 在新的作用域内同步执行 `unit_of_work`
    pub fn run<T, F>(&self, scope: Scope, unit_of_work: F) -> T
    where
        F: FnOnce(&ScopedContainer<'a>) -> T,
    {
        let scoped = self.container.create_scope(scope);
        let scope_id = scoped.id().to_string();
        let timer = OperationTimer::new("scope.run")
            .with_metadata("scope", scope.as_str())
            .with_metadata("scope_id", &scope_id);

        let result = unit_of_work(&scoped);
        drop(scoped);
        timer.finish();
        result
    }
}
