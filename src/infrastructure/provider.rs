//! 服务工厂
//!
//! 工厂以所在容器为参数创建实例；工厂内部可以继续调用 `get`，
//! 这些调用同样受模块边界约束。

use super::container::{Instance, Resolve};
use crate::errors::Result;
use std::fmt;
use std::sync::Arc;

/// 服务工厂trait
pub trait ServiceFactory: Send + Sync {
    /// 创建服务实例
    fn create(&self, container: &dyn Resolve) -> Result<Instance>;
}

/// 为闭包实现ServiceFactory
impl<F> ServiceFactory for F
where
    F: Fn(&dyn Resolve) -> Result<Instance> + Send + Sync,
{
    fn create(&self, container: &dyn Resolve) -> Result<Instance> {
        self(container)
    }
}

/// 共享的工厂句柄
pub type SharedFactory = Arc<dyn ServiceFactory>;

/// 把返回具体类型的闭包包装成工厂
pub fn factory<T, F>(factory_fn: F) -> SharedFactory
where
    T: Send + Sync + 'static,
    F: Fn(&dyn Resolve) -> Result<T> + Send + Sync + 'static,
{
    Arc::new(move |container: &dyn Resolve| -> Result<Instance> {
        let service = factory_fn(container)?;
        Ok(Arc::new(service) as Instance)
    })
}

/// 返回固定实例的工厂（每次调用都返回同一个 `Arc`）
pub fn instance_factory<T: Send + Sync + 'static>(value: T) -> SharedFactory {
    let instance: Instance = Arc::new(value);
    Arc::new(move |_: &dyn Resolve| -> Result<Instance> { Ok(instance.clone()) })
}

pub(crate) struct FactoryDebug<'a>(pub &'a SharedFactory);

impl fmt::Debug for FactoryDebug<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<factory@{:p}>", Arc::as_ptr(self.0) as *const ())
    }
}
