//! 容器构建器
//!
//! 注册面：所有 setter 都是对注册表的薄包装。`build()` 之后构建器被锁定，
//! 任何修改都返回 `BuilderImmutable`。

use super::compiler::{CompiledContainer, CompiledSlots, Compiler};
use super::container::plan::Planner;
use super::container::{
    service_id, Binding, Container, ContextualBinding, Instance, ModuleAccessPolicy, Registry,
    Resolve, Scope, TypeCatalog, TypeMetadata,
};
use super::module::Module;
use super::provider::{factory, instance_factory, SharedFactory};
use crate::config::WiringConfig;
use crate::errors::{ContainerError, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;

/// 容器构建器
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    registry: Registry,
    catalog: TypeCatalog,
    policy: ModuleAccessPolicy,
    locked: bool,
    current_module: Option<String>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_unlocked(&self, operation: &str) -> Result<()> {
        if self.locked {
            return Err(ContainerError::BuilderImmutable {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }

    /// 把服务ID绑定到具体类型（或另一个已绑定的ID）
    pub fn bind(&mut self, id: &str, concrete: &str) -> Result<&mut Self> {
        self.ensure_unlocked("bind")?;
        self.registry.bind(
            id,
            Binding::Concrete(concrete.to_string()),
            self.current_module.as_deref(),
        );
        Ok(self)
    }

    /// 以 Rust 类型名绑定：`I` 的请求由 `T` 满足
    pub fn bind_type<I: ?Sized + 'static, T: 'static>(&mut self) -> Result<&mut Self> {
        self.bind(&service_id::<I>(), &service_id::<T>())
    }

    /// 绑定工厂
    pub fn bind_factory<T, F>(&mut self, id: &str, factory_fn: F) -> Result<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
    {
        self.bind_shared_factory(id, factory(factory_fn))
    }

    pub fn bind_shared_factory(&mut self, id: &str, factory: SharedFactory) -> Result<&mut Self> {
        self.ensure_unlocked("bind")?;
        self.registry
            .bind(id, Binding::Factory(factory), self.current_module.as_deref());
        Ok(self)
    }

    /// 绑定一个预先构造好的实例（每次 `get` 返回同一个对象）
    pub fn bind_instance<T: Send + Sync + 'static>(&mut self, id: &str, value: T) -> Result<&mut Self> {
        self.bind_shared_factory(id, instance_factory(value))
    }

    /// 登记可自动装配的具体类型
    pub fn register_type(&mut self, metadata: TypeMetadata) -> Result<&mut Self> {
        self.ensure_unlocked("register_type")?;
        self.catalog.register(metadata);
        Ok(self)
    }

    pub fn set_scope(&mut self, id: &str, scope: Scope) -> Result<&mut Self> {
        self.ensure_unlocked("set_scope")?;
        self.registry.set_scope(id, scope);
        Ok(self)
    }

    /// 进程级单例
    pub fn singleton(&mut self, id: &str) -> Result<&mut Self> {
        self.set_scope(id, Scope::Process)
    }

    /// 每次都新建（默认行为，显式声明也允许）
    pub fn prototype(&mut self, id: &str) -> Result<&mut Self> {
        self.set_scope(id, Scope::Prototype)
    }

    /// 在一个 tick 内共享
    pub fn scoped(&mut self, id: &str) -> Result<&mut Self> {
        self.set_scope(id, Scope::Tick)
    }

    /// 为具体类型的某个构造参数绑定字面值
    pub fn bind_argument(
        &mut self,
        type_name: &str,
        parameter: &str,
        value: impl Into<Value>,
    ) -> Result<&mut Self> {
        self.ensure_unlocked("bind_argument")?;
        self.registry.bind_argument(type_name, parameter, value.into());
        Ok(self)
    }

    /// `consumer` 的构造参数 `interface` 改用 `implementation`
    pub fn bind_context(
        &mut self,
        interface: &str,
        implementation: &str,
        consumer: &str,
    ) -> Result<&mut Self> {
        self.ensure_unlocked("bind_context")?;
        self.registry.bind_context(
            interface,
            ContextualBinding::Service(implementation.to_string()),
            consumer,
        );
        Ok(self)
    }

    /// `consumer` 的构造参数 `interface` 改由工厂创建
    pub fn bind_context_factory<T, F>(
        &mut self,
        interface: &str,
        consumer: &str,
        factory_fn: F,
    ) -> Result<&mut Self>
    where
        T: Send + Sync + 'static,
        F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
    {
        self.ensure_unlocked("bind_context")?;
        self.registry.bind_context(
            interface,
            ContextualBinding::Factory(factory(factory_fn)),
            consumer,
        );
        Ok(self)
    }

    pub fn tag(&mut self, tag: &str, id: &str) -> Result<&mut Self> {
        self.ensure_unlocked("tag")?;
        self.registry.tag(tag, id);
        Ok(self)
    }

    /// 绑定不可变的参数对象，按类型名注入
    pub fn bind_parameter_object(&mut self, type_name: &str, instance: Instance) -> Result<&mut Self> {
        self.ensure_unlocked("bind_parameter_object")?;
        self.registry.bind_parameter_object(type_name, instance);
        Ok(self)
    }

    /// 以值的 Rust 类型名作为参数对象的类型
    pub fn parameter_object<T: Send + Sync + 'static>(&mut self, value: T) -> Result<&mut Self> {
        self.bind_parameter_object(&service_id::<T>(), Arc::new(value))
    }

    /// 加入模块：开启边界检查，模块内注册的服务归属该模块
    pub fn add_module(&mut self, module: &dyn Module) -> Result<&mut Self> {
        self.ensure_unlocked("add_module")?;
        self.policy.enable_enforcement();

        let previous = self.current_module.replace(module.name().to_string());
        let configured = module.configure(self);
        self.current_module = previous;
        configured?;

        for id in module.exposed_services() {
            self.policy.expose(module.name(), &id);
        }
        tracing::debug!(
            module = module.name(),
            exposed = ?module.exposed_services(),
            "模块已注册"
        );
        Ok(self)
    }

    /// 应用声明式配置
    pub fn apply_config(&mut self, config: &WiringConfig) -> Result<&mut Self> {
        self.ensure_unlocked("apply_config")?;
        config.apply(self)?;
        Ok(self)
    }

    /// 全图校验：从每个绑定出发，检查可达的计划、依赖是否存在以及循环
    pub fn validate(&self) -> Result<()> {
        let planner = Planner::new(&self.registry, &self.catalog);
        let mut done = HashSet::new();
        let mut stack = Vec::new();
        for id in self.registry.service_ids() {
            self.validate_from(&planner, id, &mut stack, &mut done)?;
        }
        Ok(())
    }

    fn validate_from(
        &self,
        planner: &Planner<'_>,
        id: &str,
        stack: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> Result<()> {
        if done.contains(id) {
            return Ok(());
        }
        if let Some(start) = stack.iter().position(|entry| entry == id) {
            let mut chain = stack[start..].to_vec();
            chain.push(id.to_string());
            return Err(ContainerError::CircularDependency {
                id: id.to_string(),
                chain,
            });
        }

        let plan = planner.plan(id)?;
        stack.push(id.to_string());
        for dependency in plan.service_dependencies() {
            if self.registry.binding(dependency).is_none() && !self.catalog.contains(dependency) {
                return Err(ContainerError::not_found(dependency));
            }
            self.validate_from(planner, dependency, stack, done)?;
        }
        stack.pop();
        done.insert(id.to_string());
        Ok(())
    }

    /// 在内存中编译出无反射的容器
    pub fn compile(&self) -> Result<CompiledContainer> {
        self.compiler().compile()
    }

    /// 生成编译容器的 Rust 源码
    pub fn compile_source(&self, struct_name: &str) -> Result<String> {
        self.compiler().render_source(struct_name)
    }

    /// 生成的源码所需的构造函数与工厂
    pub fn compiler_slots(&self) -> CompiledSlots {
        self.compiler().slots()
    }

    fn compiler(&self) -> Compiler<'_> {
        Compiler::new(&self.registry, &self.catalog, &self.policy)
    }

    /// 锁定构建器并产出根容器
    pub fn build(&mut self) -> Container {
        self.locked = true;
        tracing::info!(
            services = self.registry.bindings().len(),
            types = self.catalog.len(),
            modules_enforced = self.policy.is_enforced(),
            "容器已构建"
        );
        Container::new(
            self.registry.clone(),
            self.catalog.clone(),
            self.policy.clone(),
        )
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn policy(&self) -> &ModuleAccessPolicy {
        &self.policy
    }

    /// 当前正在配置的模块
    pub fn current_module(&self) -> Option<&str> {
        self.current_module.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::module::FnModule;

    fn unit(name: &str) -> TypeMetadata {
        TypeMetadata::named(name).build(|_| Ok(()))
    }

    #[test]
    fn test_locked_after_build() {
        let mut builder = ContainerBuilder::new();
        builder.bind("a", "A").unwrap();
        let _container = builder.build();
        assert!(builder.is_locked());

        let err = builder.singleton("a").err().unwrap();
        assert_eq!(
            err,
            ContainerError::BuilderImmutable {
                operation: "set_scope".into()
            }
        );
        assert!(builder.bind("b", "B").is_err());
        assert!(builder.register_type(unit("B")).is_err());
    }

    #[test]
    fn test_module_ownership_and_exposure() {
        let mut builder = ContainerBuilder::new();
        builder.bind("outside", "Outside").unwrap();
        let module = FnModule::new("storage", |b: &mut ContainerBuilder| {
            assert_eq!(b.current_module(), Some("storage"));
            b.bind("repo", "Repo")?.bind("store", "Store")?;
            Ok(())
        })
        .expose("store");
        builder.add_module(&module).unwrap();

        assert_eq!(builder.current_module(), None);
        assert_eq!(builder.registry().module("repo"), Some("storage"));
        assert_eq!(builder.registry().module("outside"), None);
        assert!(builder.policy().is_enforced());
        assert!(builder.policy().is_exposed("storage", "store"));
        assert!(!builder.policy().is_exposed("storage", "repo"));
    }

    #[test]
    fn test_failed_module_restores_current_module() {
        let mut builder = ContainerBuilder::new();
        let module = FnModule::new("broken", |_: &mut ContainerBuilder| {
            Err(ContainerError::Config {
                message: "boom".into(),
            })
        });
        assert!(builder.add_module(&module).is_err());
        assert_eq!(builder.current_module(), None);
    }

    #[test]
    fn test_validate_reports_missing_dependency() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_type(
                TypeMetadata::named("Application")
                    .dependency("cache", "CacheInterface")
                    .build(|_| Ok(())),
            )
            .unwrap()
            .bind("app", "Application")
            .unwrap();
        assert_eq!(
            builder.validate().unwrap_err(),
            ContainerError::not_found("CacheInterface")
        );

        builder.register_type(unit("MemoryCache")).unwrap();
        builder.bind("CacheInterface", "MemoryCache").unwrap();
        builder.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_cycle() {
        let mut builder = ContainerBuilder::new();
        builder
            .register_type(TypeMetadata::named("A").dependency("b", "B").build(|_| Ok(())))
            .unwrap()
            .register_type(TypeMetadata::named("B").dependency("a", "A").build(|_| Ok(())))
            .unwrap()
            .bind("A", "A")
            .unwrap();

        let err = builder.validate().unwrap_err();
        assert_eq!(
            err,
            ContainerError::CircularDependency {
                id: "A".into(),
                chain: vec!["A".into(), "B".into(), "A".into()],
            }
        );
    }
}
