//! 编译器
//!
//! 在构建阶段为每个服务ID求出与解析器相同的构造计划。
//! 定义错误（注入容器、不安全的作用域注入）在编译时直接失败；
//! 其它规划错误记录下来，调用该ID时再报告。

mod codegen;
mod compiled;
mod runtime;

pub use compiled::{CompiledContainer, CompiledEntry};
pub use runtime::{deferred, literal, CompiledSlots, Runtime};

use crate::errors::Result;
use crate::infrastructure::container::plan::Planner;
use crate::infrastructure::container::{
    ArgumentPlan, ConstructionPlan, ModuleAccessPolicy, Registry, TypeCatalog,
};
use crate::logging::OperationTimer;
use codegen::Renderer;
use compiled::CompiledDefinition;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub struct Compiler<'a> {
    registry: &'a Registry,
    catalog: &'a TypeCatalog,
    policy: &'a ModuleAccessPolicy,
}

impl<'a> Compiler<'a> {
    pub fn new(
        registry: &'a Registry,
        catalog: &'a TypeCatalog,
        policy: &'a ModuleAccessPolicy,
    ) -> Self {
        Self {
            registry,
            catalog,
            policy,
        }
    }

    /// 需要编译的ID：显式绑定 + 可自动装配的具体类型
    fn service_ids(&self) -> BTreeSet<&'a str> {
        self.registry
            .service_ids()
            .chain(self.catalog.type_names())
            .collect()
    }

    /// 求出全部构造计划
    pub fn entries(&self) -> Result<BTreeMap<String, CompiledEntry>> {
        let planner = Planner::new(self.registry, self.catalog);
        let mut entries = BTreeMap::new();
        for id in self.service_ids() {
            let entry = match planner.plan(id) {
                Ok(plan) => CompiledEntry::Plan(Arc::new(plan)),
                Err(err) if err.is_definition_error() => {
                    err.log();
                    return Err(err);
                }
                Err(err) => {
                    tracing::debug!(service_id = id, error = %err, "规划失败，推迟到调用时报告");
                    CompiledEntry::Deferred(err)
                }
            };
            entries.insert(id.to_string(), entry);
        }
        Ok(entries)
    }

    /// 编译出内存中的容器
    pub fn compile(&self) -> Result<CompiledContainer> {
        let timer = OperationTimer::new("compiler.compile");
        let entries = self.entries()?;
        let timer = timer.with_metadata("services", &entries.len().to_string());
        let container = CompiledContainer::new(CompiledDefinition {
            entries,
            registry: self.registry.clone(),
            policy: self.policy.clone(),
        });
        timer.finish();
        Ok(container)
    }

    /// 生成编译容器的 Rust 源码；构造函数和工厂通过 [`CompiledSlots`] 注入
    pub fn render_source(&self, struct_name: &str) -> Result<String> {
        let timer = OperationTimer::new("compiler.render_source")
            .with_metadata("struct", struct_name);
        let entries = self.entries()?;
        let source = Renderer::new(struct_name, &entries, self.registry, self.policy).render()?;
        timer.finish();
        Ok(source)
    }

    /// 生成的源码运行所需的槽位
    pub fn slots(&self) -> CompiledSlots {
        let mut slots = CompiledSlots::new();
        let planner = Planner::new(self.registry, self.catalog);
        for id in self.service_ids() {
            let Ok(plan) = planner.plan(id) else {
                continue;
            };
            match plan {
                ConstructionPlan::Factory { id, factory } => slots.insert_factory(&id, factory),
                ConstructionPlan::Alias { .. } => {}
                ConstructionPlan::Construct { metadata, args, .. } => {
                    slots.insert_constructor(metadata.type_name(), metadata.constructor().clone());
                    for arg in args {
                        match arg {
                            ArgumentPlan::ContextFactory { slot, factory, .. } => {
                                slots.insert_factory(&slot, factory)
                            }
                            ArgumentPlan::ParameterObject {
                                type_name, instance, ..
                            } => slots.insert_parameter_object(&type_name, instance),
                            ArgumentPlan::Literal { .. } | ArgumentPlan::Service { .. } => {}
                        }
                    }
                }
            }
        }
        slots
    }
}

impl std::fmt::Debug for Compiler<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("registry", self.registry)
            .field("types", &self.catalog.len())
            .finish()
    }
}
