//! 注册表
//!
//! 在容器锁定之前保存所有绑定、作用域、参数绑定、上下文绑定、标签与模块归属。
//! bind/scope/argument/context 都是后写覆盖；标签和模块归属只追加。

use super::{Instance, Scope};
use crate::infrastructure::provider::{FactoryDebug, SharedFactory};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// 服务绑定：具体类型名或工厂
#[derive(Clone)]
pub enum Binding {
    Concrete(String),
    Factory(SharedFactory),
}

impl Binding {
    pub fn is_factory(&self) -> bool {
        matches!(self, Binding::Factory(_))
    }

    /// 具体类型名；工厂返回 None
    pub fn concrete(&self) -> Option<&str> {
        match self {
            Binding::Concrete(name) => Some(name),
            Binding::Factory(_) => None,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Concrete(name) => f.debug_tuple("Concrete").field(name).finish(),
            Binding::Factory(factory) => f.debug_tuple("Factory").field(&FactoryDebug(factory)).finish(),
        }
    }
}

/// 上下文绑定的替换目标
#[derive(Clone)]
pub enum ContextualBinding {
    Service(String),
    Factory(SharedFactory),
}

impl fmt::Debug for ContextualBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextualBinding::Service(id) => f.debug_tuple("Service").field(id).finish(),
            ContextualBinding::Factory(factory) => {
                f.debug_tuple("Factory").field(&FactoryDebug(factory)).finish()
            }
        }
    }
}

/// 注册表
#[derive(Clone, Default)]
pub struct Registry {
    bindings: BTreeMap<String, Binding>,
    /// 具体类型 => 参数名 => 字面值
    arguments: HashMap<String, HashMap<String, Value>>,
    scopes: HashMap<String, Scope>,
    /// 消费者 => 依赖ID => 替换目标
    contextual: HashMap<String, HashMap<String, ContextualBinding>>,
    /// 标签 => 服务ID（保持注册顺序）
    tags: BTreeMap<String, Vec<String>>,
    parameter_objects: HashMap<String, Instance>,
    /// 服务ID => 模块名
    modules: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, id: &str, binding: Binding, module: Option<&str>) {
        self.bindings.insert(id.to_string(), binding);
        if let Some(module) = module {
            self.modules.insert(id.to_string(), module.to_string());
        }
    }

    pub fn bind_context(&mut self, dependency: &str, target: ContextualBinding, consumer: &str) {
        self.contextual
            .entry(consumer.to_string())
            .or_default()
            .insert(dependency.to_string(), target);
    }

    pub fn tag(&mut self, tag: &str, id: &str) {
        self.tags.entry(tag.to_string()).or_default().push(id.to_string());
    }

    pub fn bind_parameter_object(&mut self, type_name: &str, instance: Instance) {
        self.parameter_objects.insert(type_name.to_string(), instance);
    }

    pub fn bind_argument(&mut self, type_name: &str, parameter: &str, value: Value) {
        self.arguments
            .entry(type_name.to_string())
            .or_default()
            .insert(parameter.to_string(), value);
    }

    pub fn set_scope(&mut self, id: &str, scope: Scope) {
        self.scopes.insert(id.to_string(), scope);
    }

    pub fn binding(&self, id: &str) -> Option<&Binding> {
        self.bindings.get(id)
    }

    pub fn contextual_binding(&self, dependency: &str, consumer: &str) -> Option<&ContextualBinding> {
        self.contextual.get(consumer)?.get(dependency)
    }

    /// 全部上下文绑定，按 (消费者, 依赖) 展开
    pub fn contextual_bindings(&self) -> impl Iterator<Item = (&str, &str, &ContextualBinding)> {
        self.contextual.iter().flat_map(|(consumer, deps)| {
            deps.iter()
                .map(move |(dep, target)| (consumer.as_str(), dep.as_str(), target))
        })
    }

    /// 未知标签返回空切片
    pub fn tagged(&self, tag: &str) -> &[String] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tags(&self) -> &BTreeMap<String, Vec<String>> {
        &self.tags
    }

    pub fn parameter_object(&self, type_name: &str) -> Option<&Instance> {
        self.parameter_objects.get(type_name)
    }

    pub fn parameter_objects(&self) -> &HashMap<String, Instance> {
        &self.parameter_objects
    }

    pub fn argument(&self, type_name: &str, parameter: &str) -> Option<&Value> {
        self.arguments.get(type_name)?.get(parameter)
    }

    /// 从不失败；没有声明时为 PROTOTYPE
    pub fn scope(&self, id: &str) -> Scope {
        self.scopes.get(id).copied().unwrap_or_default()
    }

    pub fn scopes(&self) -> &HashMap<String, Scope> {
        &self.scopes
    }

    pub fn module(&self, id: &str) -> Option<&str> {
        self.modules.get(id).map(String::as_str)
    }

    pub fn service_ids(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn bindings(&self) -> &BTreeMap<String, Binding> {
        &self.bindings
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("bindings", &self.bindings)
            .field("scopes", &self.scopes)
            .field("tags", &self.tags)
            .field("modules", &self.modules)
            .finish_non_exhaustive()
    }
}
