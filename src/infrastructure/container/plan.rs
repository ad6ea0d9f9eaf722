//! 构造计划
//!
//! 解释执行路径和编译路径共用同一份计划：规则检查（标量、容器注入、作用域安全、
//! 上下文绑定）全部在这里完成，两条路径只负责执行。

use super::scoped::{ScopeManager, ScopedContainer};
use super::{
    service_id, Args, Argument, Binding, Container, ContextualBinding, Instance, ParamKind,
    Registry, Resolve, ResolutionScope, Scope, TypeCatalog, TypeMetadata,
};
use crate::errors::{ContainerError, Result};
use crate::infrastructure::compiler::CompiledContainer;
use crate::infrastructure::provider::{FactoryDebug, SharedFactory};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// 单个构造参数的来源
#[derive(Clone)]
pub enum ArgumentPlan {
    /// 参数绑定或默认值
    Literal { name: String, value: Value },
    /// 通过容器解析另一个服务（内部调用，不做模块边界检查）
    Service { name: String, id: String },
    /// 预先绑定的参数对象
    ParameterObject {
        name: String,
        type_name: String,
        instance: Instance,
    },
    /// 由上下文绑定的工厂创建
    ContextFactory {
        name: String,
        slot: String,
        factory: SharedFactory,
    },
}

impl ArgumentPlan {
    pub fn name(&self) -> &str {
        match self {
            ArgumentPlan::Literal { name, .. }
            | ArgumentPlan::Service { name, .. }
            | ArgumentPlan::ParameterObject { name, .. }
            | ArgumentPlan::ContextFactory { name, .. } => name,
        }
    }
}

impl fmt::Debug for ArgumentPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentPlan::Literal { name, value } => write!(f, "{} = {}", name, value),
            ArgumentPlan::Service { name, id } => write!(f, "{} = get({})", name, id),
            ArgumentPlan::ParameterObject { name, type_name, .. } => {
                write!(f, "{} = object({})", name, type_name)
            }
            ArgumentPlan::ContextFactory { name, factory, .. } => {
                write!(f, "{} = {:?}", name, FactoryDebug(factory))
            }
        }
    }
}

/// 一个服务ID的构造计划
#[derive(Clone)]
pub enum ConstructionPlan {
    /// 调用工厂
    Factory { id: String, factory: SharedFactory },
    /// 绑定指向另一个已绑定的ID
    Alias { id: String, target: String },
    /// 用解析后的参数调用构造函数
    Construct {
        id: String,
        metadata: Arc<TypeMetadata>,
        args: Vec<ArgumentPlan>,
    },
}

impl ConstructionPlan {
    pub fn id(&self) -> &str {
        match self {
            ConstructionPlan::Factory { id, .. }
            | ConstructionPlan::Alias { id, .. }
            | ConstructionPlan::Construct { id, .. } => id,
        }
    }

    /// 具体类型名；工厂返回 None
    pub fn concrete(&self) -> Option<&str> {
        match self {
            ConstructionPlan::Construct { metadata, .. } => Some(metadata.type_name()),
            ConstructionPlan::Alias { target, .. } => Some(target),
            ConstructionPlan::Factory { .. } => None,
        }
    }

    /// 构造的具体类型与请求的ID不同时返回该类型
    pub fn constructed_as(&self) -> Option<&str> {
        match self {
            ConstructionPlan::Construct { id, metadata, .. } if metadata.type_name() != id => {
                Some(metadata.type_name())
            }
            _ => None,
        }
    }

    /// 计划中需要通过容器解析的服务ID
    pub fn service_dependencies(&self) -> Vec<&str> {
        match self {
            ConstructionPlan::Construct { args, .. } => args
                .iter()
                .filter_map(|arg| match arg {
                    ArgumentPlan::Service { id, .. } => Some(id.as_str()),
                    _ => None,
                })
                .collect(),
            ConstructionPlan::Alias { target, .. } => vec![target.as_str()],
            ConstructionPlan::Factory { .. } => Vec::new(),
        }
    }

    pub(crate) fn execute(&self, scope: &dyn ResolutionScope) -> Result<Instance> {
        match self {
            ConstructionPlan::Factory { factory, .. } => factory.create(scope.as_resolve()),
            ConstructionPlan::Alias { target, .. } => scope.fetch(target, true),
            ConstructionPlan::Construct { metadata, args, .. } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    let value = match arg {
                        ArgumentPlan::Literal { value, .. } => Argument::Scalar(value.clone()),
                        ArgumentPlan::Service { id, .. } => Argument::Service(scope.fetch(id, true)?),
                        ArgumentPlan::ParameterObject { instance, .. } => {
                            Argument::Service(instance.clone())
                        }
                        ArgumentPlan::ContextFactory { factory, .. } => {
                            Argument::Service(factory.create(scope.as_resolve())?)
                        }
                    };
                    values.push((arg.name().to_string(), value));
                }
                metadata.construct(Args::new(metadata.type_name(), values))
            }
        }
    }
}

impl fmt::Debug for ConstructionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionPlan::Factory { id, factory } => f
                .debug_struct("Factory")
                .field("id", id)
                .field("factory", &FactoryDebug(factory))
                .finish(),
            ConstructionPlan::Alias { id, target } => f
                .debug_struct("Alias")
                .field("id", id)
                .field("target", target)
                .finish(),
            ConstructionPlan::Construct { id, metadata, args } => f
                .debug_struct("Construct")
                .field("id", id)
                .field("concrete", &metadata.type_name())
                .field("args", args)
                .finish(),
        }
    }
}

/// 容器自身的类型名：这些类型不允许作为构造参数注入
pub fn container_ids() -> [String; 5] {
    [
        service_id::<Container>(),
        service_id::<ScopedContainer<'static>>(),
        service_id::<ScopeManager<'static>>(),
        service_id::<CompiledContainer>(),
        service_id::<dyn Resolve>(),
    ]
}

pub fn is_container_id(id: &str) -> bool {
    container_ids().iter().any(|name| name == id)
}

/// 上下文工厂在编译产物中的槽位名
pub fn context_slot(consumer: &str, dependency: &str) -> String {
    format!("context:{}:{}", consumer, dependency)
}

/// 从注册表和类型目录推导构造计划
pub(crate) struct Planner<'a> {
    registry: &'a Registry,
    catalog: &'a TypeCatalog,
}

impl<'a> Planner<'a> {
    pub(crate) fn new(registry: &'a Registry, catalog: &'a TypeCatalog) -> Self {
        Self { registry, catalog }
    }

    pub(crate) fn plan(&self, id: &str) -> Result<ConstructionPlan> {
        let concrete = match self.registry.binding(id) {
            Some(Binding::Factory(factory)) => {
                return Ok(ConstructionPlan::Factory {
                    id: id.to_string(),
                    factory: factory.clone(),
                })
            }
            Some(Binding::Concrete(concrete)) => concrete.as_str(),
            None => id,
        };

        let Some(metadata) = self.catalog.get(concrete) else {
            if concrete != id && self.registry.binding(concrete).is_some() {
                return Ok(ConstructionPlan::Alias {
                    id: id.to_string(),
                    target: concrete.to_string(),
                });
            }
            // 抽象类型没有显式绑定时绝不猜测实现
            return Err(ContainerError::not_found(concrete));
        };

        let long_lived = self.registry.scope(id) == Scope::Process
            || self.registry.scope(concrete) == Scope::Process;

        let mut args = Vec::with_capacity(metadata.params().len());
        for param in metadata.params() {
            if let Some(value) = self.registry.argument(concrete, &param.name) {
                args.push(ArgumentPlan::Literal {
                    name: param.name.clone(),
                    value: value.clone(),
                });
                continue;
            }

            let dependency = match &param.kind {
                ParamKind::Scalar { default: Some(value) } => {
                    args.push(ArgumentPlan::Literal {
                        name: param.name.clone(),
                        value: value.clone(),
                    });
                    continue;
                }
                ParamKind::Scalar { default: None } => {
                    return Err(ContainerError::UnresolvableScalar {
                        type_name: concrete.to_string(),
                        parameter: param.name.clone(),
                    })
                }
                ParamKind::Service { type_id } => type_id.as_str(),
            };

            if is_container_id(dependency) {
                return Err(ContainerError::ContainerInjectionForbidden {
                    consumer: concrete.to_string(),
                    parameter: param.name.clone(),
                });
            }

            if let Some(instance) = self.registry.parameter_object(dependency) {
                args.push(ArgumentPlan::ParameterObject {
                    name: param.name.clone(),
                    type_name: dependency.to_string(),
                    instance: instance.clone(),
                });
                continue;
            }

            let contextual = self.registry.contextual_binding(dependency, concrete);

            if long_lived {
                let replacement = match contextual {
                    Some(ContextualBinding::Service(target)) => Some(target.as_str()),
                    _ => None,
                };
                let tick_dependency = std::iter::once(dependency)
                    .chain(replacement)
                    .find(|dep| self.registry.scope(dep) == Scope::Tick);
                if let Some(tick_dependency) = tick_dependency {
                    return Err(ContainerError::UnsafeScopeInjection {
                        consumer: id.to_string(),
                        dependency: tick_dependency.to_string(),
                    });
                }
            }

            let arg = match contextual {
                Some(ContextualBinding::Service(target)) => ArgumentPlan::Service {
                    name: param.name.clone(),
                    id: target.clone(),
                },
                Some(ContextualBinding::Factory(factory)) => ArgumentPlan::ContextFactory {
                    name: param.name.clone(),
                    slot: context_slot(concrete, dependency),
                    factory: factory.clone(),
                },
                None => ArgumentPlan::Service {
                    name: param.name.clone(),
                    id: dependency.to_string(),
                },
            };
            args.push(arg);
        }

        Ok(ConstructionPlan::Construct {
            id: id.to_string(),
            metadata: metadata.clone(),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::provider::factory;
    use serde_json::json;

    struct Fixture {
        registry: Registry,
        catalog: TypeCatalog,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                registry: Registry::new(),
                catalog: TypeCatalog::new(),
            }
        }

        fn unit(&mut self, name: &str) {
            self.catalog
                .register(TypeMetadata::named(name).build(|_| Ok(())));
        }

        fn plan(&self, id: &str) -> Result<ConstructionPlan> {
            Planner::new(&self.registry, &self.catalog).plan(id)
        }
    }

    #[test]
    fn test_factory_binding_plans_factory_call() {
        let mut fx = Fixture::new();
        fx.registry
            .bind("clock", Binding::Factory(factory(|_| Ok(1u64))), None);
        assert!(matches!(fx.plan("clock"), Ok(ConstructionPlan::Factory { .. })));
    }

    #[test]
    fn test_unbound_abstraction_is_not_found() {
        let fx = Fixture::new();
        assert_eq!(
            fx.plan("CacheInterface").unwrap_err(),
            ContainerError::not_found("CacheInterface")
        );
    }

    #[test]
    fn test_argument_override_beats_default() {
        let mut fx = Fixture::new();
        fx.catalog.register(
            TypeMetadata::named("Mailer")
                .scalar_or("port", 25)
                .build(|args| args.scalar::<u16>("port")),
        );
        fx.registry.bind_argument("Mailer", "port", json!(2525));

        let plan = fx.plan("Mailer").unwrap();
        let ConstructionPlan::Construct { args, .. } = plan else {
            panic!("expected construct plan");
        };
        assert!(matches!(&args[0], ArgumentPlan::Literal { value, .. } if value == &json!(2525)));
    }

    #[test]
    fn test_missing_scalar_is_unresolvable() {
        let mut fx = Fixture::new();
        fx.catalog.register(
            TypeMetadata::named("DatabaseConfig")
                .scalar("dsn")
                .build(|args| args.scalar::<String>("dsn")),
        );
        assert_eq!(
            fx.plan("DatabaseConfig").unwrap_err(),
            ContainerError::UnresolvableScalar {
                type_name: "DatabaseConfig".into(),
                parameter: "dsn".into(),
            }
        );
    }

    #[test]
    fn test_container_injection_is_forbidden() {
        let mut fx = Fixture::new();
        fx.catalog.register(
            TypeMetadata::named("ServiceLocatorUser")
                .service::<Container>("container")
                .build(|_| Ok(())),
        );
        assert!(matches!(
            fx.plan("ServiceLocatorUser"),
            Err(ContainerError::ContainerInjectionForbidden { .. })
        ));
    }

    #[test]
    fn test_process_scope_cannot_take_tick_dependency() {
        let mut fx = Fixture::new();
        fx.unit("Request");
        fx.catalog.register(
            TypeMetadata::named("Cache")
                .dependency("request", "Request")
                .build(|_| Ok(())),
        );
        fx.registry.set_scope("Cache", Scope::Process);
        fx.registry.set_scope("Request", Scope::Tick);

        assert_eq!(
            fx.plan("Cache").unwrap_err(),
            ContainerError::UnsafeScopeInjection {
                consumer: "Cache".into(),
                dependency: "Request".into(),
            }
        );
    }

    #[test]
    fn test_contextual_binding_only_for_exact_consumer() {
        let mut fx = Fixture::new();
        fx.unit("FileLogger");
        for consumer in ["Audit", "Billing"] {
            fx.catalog.register(
                TypeMetadata::named(consumer)
                    .dependency("logger", "Logger")
                    .build(|_| Ok(())),
            );
        }
        fx.registry.bind_context(
            "Logger",
            ContextualBinding::Service("FileLogger".into()),
            "Audit",
        );

        assert_eq!(fx.plan("Audit").unwrap().service_dependencies(), vec!["FileLogger"]);
        assert_eq!(fx.plan("Billing").unwrap().service_dependencies(), vec!["Logger"]);
    }

    #[test]
    fn test_alias_to_bound_id() {
        let mut fx = Fixture::new();
        fx.registry
            .bind("clock", Binding::Factory(factory(|_| Ok(1u64))), None);
        fx.registry
            .bind("time", Binding::Concrete("clock".into()), None);
        assert!(matches!(
            fx.plan("time"),
            Ok(ConstructionPlan::Alias { ref target, .. }) if target == "clock"
        ));
    }

    #[test]
    fn test_parameter_object_is_injected_as_is() {
        let mut fx = Fixture::new();
        fx.catalog.register(
            TypeMetadata::named("Client")
                .dependency("settings", "Settings")
                .build(|_| Ok(())),
        );
        fx.registry
            .bind_parameter_object("Settings", Arc::new("frozen".to_string()));
        let ConstructionPlan::Construct { args, .. } = fx.plan("Client").unwrap() else {
            panic!("expected construct plan");
        };
        assert!(matches!(&args[0], ArgumentPlan::ParameterObject { .. }));
    }
}
