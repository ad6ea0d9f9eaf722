//! 根容器
//!
//! 持有进程级实例缓存，应用模块访问策略，把构造交给解析器。
//! 锁定后的注册表只读，可以在线程间共享。

use super::cache::{InstanceCache, Lookup};
use super::resolver::Resolver;
use super::scoped::ScopedContainer;
use super::{
    Binding, Instance, ModuleAccessPolicy, Registry, Resolve, ResolutionContext, ResolutionScope,
    Scope, TaggedServices, TypeCatalog,
};
use crate::errors::Result;
use crate::infrastructure::introspection::DependencyGraph;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// 内部容器统计信息（原子计数器）
#[derive(Default)]
struct InnerStats {
    total_resolutions: AtomicUsize,
    cache_hits: AtomicUsize,
    cache_misses: AtomicUsize,
    constructions: AtomicUsize,
}

impl InnerStats {
    fn record(&self, lookup: &Lookup) {
        let counter = match lookup {
            Lookup::Hit(_) => &self.cache_hits,
            Lookup::Built(_) => &self.cache_misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct ContainerCore {
    resolver: Resolver,
    policy: ModuleAccessPolicy,
    context: ResolutionContext,
    instances: InstanceCache,
    stats: InnerStats,
}

/// 不可变的根容器
#[derive(Clone)]
pub struct Container {
    core: Arc<ContainerCore>,
}

impl Container {
    pub(crate) fn new(registry: Registry, catalog: TypeCatalog, policy: ModuleAccessPolicy) -> Self {
        Self {
            core: Arc::new(ContainerCore {
                resolver: Resolver::new(registry, catalog),
                policy,
                context: ResolutionContext::new(),
                instances: InstanceCache::new(),
                stats: InnerStats::default(),
            }),
        }
    }

    /// 创建子作用域容器；子容器借用根容器，离开作用域即丢弃
    pub fn create_scope(&self, scope: Scope) -> ScopedContainer<'_> {
        ScopedContainer::new(self, scope)
    }

    pub fn registry(&self) -> &Registry {
        self.core.resolver.registry()
    }

    pub fn catalog(&self) -> &TypeCatalog {
        self.core.resolver.catalog()
    }

    pub fn policy(&self) -> &ModuleAccessPolicy {
        &self.core.policy
    }

    pub(crate) fn context(&self) -> &ResolutionContext {
        &self.core.context
    }

    /// 当前消费者（构造栈顶）所属的模块
    pub(crate) fn consumer_module(&self) -> Option<String> {
        let consumer = self.core.context.current_consumer()?;
        self.registry().module(&consumer).map(str::to_string)
    }

    /// 外部请求的模块边界检查
    pub(crate) fn check_access(&self, id: &str) -> Result<()> {
        let consumer_module = self.consumer_module();
        self.core
            .policy
            .check(self.registry(), id, consumer_module.as_deref())
    }

    /// 标签下对当前消费者可见的ID
    pub(crate) fn visible_tagged(&self, tag: &str) -> Vec<String> {
        let registry = self.registry();
        let consumer_module = self.consumer_module();
        registry
            .tagged(tag)
            .iter()
            .filter(|id| {
                self.core
                    .policy
                    .can_access(registry, id, consumer_module.as_deref())
            })
            .cloned()
            .collect()
    }

    pub(crate) fn count_resolution(&self) {
        self.core
            .stats
            .total_resolutions
            .fetch_add(1, Ordering::Relaxed);
    }

    /// 由 `owner` 执行构造，`owner` 决定依赖从哪个作用域取
    pub(crate) fn construct(&self, id: &str, owner: &dyn ResolutionScope) -> Result<Instance> {
        self.core.stats.constructions.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(service_id = id, scope = %self.registry().scope(id), "构造服务实例");
        self.core.resolver.resolve(id, &self.core.context, owner)
    }

    /// 全部显式绑定
    pub fn definitions(&self) -> &BTreeMap<String, Binding> {
        self.registry().bindings()
    }

    /// 根缓存中已构造的ID
    pub fn resolved_ids(&self) -> Vec<String> {
        self.core.instances.resolved_ids()
    }

    /// 当前状态的依赖图快照
    pub fn dependency_graph(&self) -> DependencyGraph {
        let instances = &self.core.instances;
        DependencyGraph::snapshot(self.registry(), self.catalog(), |id| instances.contains(id))
    }

    /// 获取容器统计信息
    pub fn get_stats(&self) -> ContainerStats {
        let stats = &self.core.stats;
        ContainerStats {
            total_resolutions: stats.total_resolutions.load(Ordering::Relaxed),
            cache_hits: stats.cache_hits.load(Ordering::Relaxed),
            cache_misses: stats.cache_misses.load(Ordering::Relaxed),
            constructions: stats.constructions.load(Ordering::Relaxed),
        }
    }
}

impl ResolutionScope for Container {
    fn fetch(&self, id: &str, internal: bool) -> Result<Instance> {
        self.count_resolution();
        if !internal {
            self.check_access(id)?;
        }

        // 进入槽位之前先查本线程的循环
        self.core.context.ensure_not_building(id)?;

        if self.registry().scope(id) != Scope::Process {
            return self.construct(id, self);
        }

        let lookup = self
            .core
            .instances
            .get_or_try_insert(id, &self.core.context, || self.construct(id, self))?;
        if matches!(lookup, Lookup::Hit(_)) {
            tracing::trace!(service_id = id, "命中进程级缓存");
        }
        self.core.stats.record(&lookup);
        Ok(lookup.into_instance())
    }

    fn as_resolve(&self) -> &dyn Resolve {
        self
    }
}

impl Resolve for Container {
    fn get(&self, id: &str) -> Result<Instance> {
        self.fetch(id, false).map_err(|err| {
            err.log();
            err
        })
    }

    fn has(&self, id: &str) -> bool {
        self.core.resolver.can_resolve(id)
    }

    fn get_tagged(&self, tag: &str) -> TaggedServices<'_> {
        let ids = self.visible_tagged(tag);
        if ids.is_empty() {
            return TaggedServices::empty();
        }
        TaggedServices::new(ids, move |id| self.fetch(id, true))
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("resolver", &self.core.resolver)
            .field("resolved", &self.core.instances.resolved_ids())
            .field("enforced", &self.core.policy.is_enforced())
            .finish()
    }
}

/// 容器统计信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStats {
    pub total_resolutions: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub constructions: usize,
}

impl ContainerStats {
    /// 获取总解析次数
    pub fn total(&self) -> usize {
        self.total_resolutions
    }

    /// 进程级缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.cache_hits + self.cache_misses;
        if lookups == 0 {
            0.0
        } else {
            self.cache_hits as f64 / lookups as f64
        }
    }
}
