//! 解析器
//!
//! 把服务ID变成实例：进入解析上下文（循环检测）→ 取构造计划 → 执行。
//! 计划按ID记忆；失败的规划不缓存，下次调用重新报告同样的错误。

use super::plan::Planner;
use super::{ConstructionPlan, Instance, Registry, ResolutionContext, ResolutionScope, TypeCatalog};
use crate::errors::Result;
use dashmap::DashMap;
use std::sync::Arc;

pub struct Resolver {
    registry: Registry,
    catalog: TypeCatalog,
    plans: DashMap<String, Arc<ConstructionPlan>>,
}

impl Resolver {
    pub fn new(registry: Registry, catalog: TypeCatalog) -> Self {
        Self {
            registry,
            catalog,
            plans: DashMap::new(),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// 显式绑定或可自动装配的具体类型
    pub fn can_resolve(&self, id: &str) -> bool {
        self.registry.binding(id).is_some() || self.catalog.contains(id)
    }

    /// 取（或推导并记住）某个ID的构造计划
    pub fn plan(&self, id: &str) -> Result<Arc<ConstructionPlan>> {
        if let Some(plan) = self.plans.get(id) {
            return Ok(plan.clone());
        }

        let plan = Arc::new(Planner::new(&self.registry, &self.catalog).plan(id)?);
        self.plans.insert(id.to_string(), plan.clone());
        Ok(plan)
    }

    /// 已推导出计划的ID数量
    pub fn planned(&self) -> usize {
        self.plans.len()
    }

    pub(crate) fn resolve(
        &self,
        id: &str,
        context: &ResolutionContext,
        owner: &dyn ResolutionScope,
    ) -> Result<Instance> {
        let _guard = context.enter(id)?;
        let plan = self.plan(id)?;
        if let Some(concrete) = plan.constructed_as() {
            context.building_as(concrete)?;
        }
        tracing::trace!(service = id, plan = ?plan, "执行构造计划");
        plan.execute(owner)
    }
}

impl std::fmt::Debug for Resolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resolver")
            .field("registry", &self.registry)
            .field("types", &self.catalog.len())
            .field("plans", &self.plans.len())
            .finish()
    }
}
