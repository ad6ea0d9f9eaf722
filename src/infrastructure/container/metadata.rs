//! 类型元数据
//!
//! 自动装配需要知道具体类型的构造参数。这里不做任何运行时反射：
//! 每个可构造类型都要显式登记参数表和构造函数。

use super::{downcast_instance, service_id, Instance};
use crate::errors::{ContainerError, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// 构造参数的种类
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// 标量（字符串、数字、布尔……），可带默认值
    Scalar { default: Option<Value> },
    /// 对象依赖，按声明类型的服务ID解析
    Service { type_id: String },
}

/// 构造参数声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
}

impl ParamSpec {
    pub fn is_scalar(&self) -> bool {
        matches!(self.kind, ParamKind::Scalar { .. })
    }

    /// 对象依赖的服务ID
    pub fn dependency(&self) -> Option<&str> {
        match &self.kind {
            ParamKind::Service { type_id } => Some(type_id),
            ParamKind::Scalar { .. } => None,
        }
    }
}

/// 已解析的构造参数
#[derive(Clone)]
pub enum Argument {
    Scalar(Value),
    Service(Instance),
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            Argument::Service(_) => f.write_str("Service(..)"),
        }
    }
}

/// 按声明顺序排列的构造参数
#[derive(Debug)]
pub struct Args {
    type_name: String,
    values: Vec<(String, Argument)>,
}

impl Args {
    pub fn new(type_name: impl Into<String>, values: Vec<(String, Argument)>) -> Self {
        Self {
            type_name: type_name.into(),
            values,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn lookup(&self, name: &str) -> Result<&Argument> {
        self.values
            .iter()
            .find(|(param, _)| param == name)
            .map(|(_, arg)| arg)
            .ok_or_else(|| self.mismatch(name, "no such parameter"))
    }

    fn mismatch(&self, name: &str, reason: impl Into<String>) -> ContainerError {
        ContainerError::ArgumentMismatch {
            type_name: self.type_name.clone(),
            parameter: name.to_string(),
            reason: reason.into(),
        }
    }

    /// 类型擦除的依赖实例
    pub fn instance(&self, name: &str) -> Result<Instance> {
        match self.lookup(name)? {
            Argument::Service(instance) => Ok(instance.clone()),
            Argument::Scalar(_) => Err(self.mismatch(name, "expected a service, found a scalar")),
        }
    }

    /// 依赖实例，向下转型为具体类型
    pub fn service<T: Send + Sync + 'static>(&self, name: &str) -> Result<Arc<T>> {
        let instance = self.instance(name)?;
        downcast_instance(name, instance).map_err(|_| {
            self.mismatch(
                name,
                format!("service is not a '{}'", std::any::type_name::<T>()),
            )
        })
    }

    /// 标量值，经 serde 反序列化
    pub fn scalar<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        match self.lookup(name)? {
            Argument::Scalar(value) => serde_json::from_value(value.clone())
                .map_err(|e| self.mismatch(name, e.to_string())),
            Argument::Service(_) => Err(self.mismatch(name, "expected a scalar, found a service")),
        }
    }

    pub fn raw(&self, name: &str) -> Option<&Value> {
        match self.lookup(name).ok()? {
            Argument::Scalar(value) => Some(value),
            Argument::Service(_) => None,
        }
    }
}

/// 构造函数
pub type Constructor = Arc<dyn Fn(Args) -> Result<Instance> + Send + Sync>;

/// 一个可构造类型的元数据
#[derive(Clone)]
pub struct TypeMetadata {
    type_name: String,
    params: Vec<ParamSpec>,
    constructor: Constructor,
}

impl TypeMetadata {
    /// 以 Rust 类型名登记
    pub fn of<T: 'static>() -> TypeMetadataBuilder {
        TypeMetadataBuilder::new(service_id::<T>())
    }

    /// 以任意名称登记
    pub fn named(type_name: impl Into<String>) -> TypeMetadataBuilder {
        TypeMetadataBuilder::new(type_name.into())
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn params(&self) -> &[ParamSpec] {
        &self.params
    }

    pub fn constructor(&self) -> &Constructor {
        &self.constructor
    }

    /// 声明的对象依赖（按参数顺序）
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        self.params.iter().filter_map(ParamSpec::dependency)
    }

    pub fn construct(&self, args: Args) -> Result<Instance> {
        (self.constructor)(args)
    }
}

impl fmt::Debug for TypeMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("type_name", &self.type_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// TypeMetadata 构建器
pub struct TypeMetadataBuilder {
    type_name: String,
    params: Vec<ParamSpec>,
}

impl TypeMetadataBuilder {
    fn new(type_name: String) -> Self {
        Self {
            type_name,
            params: Vec::new(),
        }
    }

    /// 必填标量参数
    pub fn scalar(mut self, name: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Scalar { default: None },
        });
        self
    }

    /// 带默认值的标量参数
    pub fn scalar_or(mut self, name: &str, default: impl Into<Value>) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Scalar {
                default: Some(default.into()),
            },
        });
        self
    }

    /// 依赖 Rust 类型 `T`
    pub fn service<T: ?Sized + 'static>(self, name: &str) -> Self {
        self.dependency(name, &service_id::<T>())
    }

    /// 依赖任意服务ID
    pub fn dependency(mut self, name: &str, type_id: &str) -> Self {
        self.params.push(ParamSpec {
            name: name.to_string(),
            kind: ParamKind::Service {
                type_id: type_id.to_string(),
            },
        });
        self
    }

    /// 以返回具体类型的构造函数收尾
    pub fn build<T, F>(self, constructor: F) -> TypeMetadata
    where
        T: Send + Sync + 'static,
        F: Fn(Args) -> Result<T> + Send + Sync + 'static,
    {
        self.build_erased(move |args| Ok(Arc::new(constructor(args)?) as Instance))
    }

    pub fn build_erased<F>(self, constructor: F) -> TypeMetadata
    where
        F: Fn(Args) -> Result<Instance> + Send + Sync + 'static,
    {
        TypeMetadata {
            type_name: self.type_name,
            params: self.params,
            constructor: Arc::new(constructor),
        }
    }
}

/// 类型目录：具体类型名 => 元数据
#[derive(Debug, Clone, Default)]
pub struct TypeCatalog {
    types: BTreeMap<String, Arc<TypeMetadata>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, metadata: TypeMetadata) {
        self.types
            .insert(metadata.type_name.clone(), Arc::new(metadata));
    }

    pub fn get(&self, type_name: &str) -> Option<&Arc<TypeMetadata>> {
        self.types.get(type_name)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
