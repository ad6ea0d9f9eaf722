//! scopewire：显式绑定、作用域感知的依赖解析引擎
//!
//! ```no_run
//! use scopewire::{ContainerBuilder, ResolveExt, Scope, ScopeManager, TypeMetadata};
//!
//! struct Clock;
//! struct Greeter {
//!     greeting: String,
//! }
//!
//! # fn main() -> scopewire::Result<()> {
//! let mut builder = ContainerBuilder::new();
//! builder
//!     .register_type(TypeMetadata::named("Clock").build(|_| Ok(Clock)))?
//!     .register_type(
//!         TypeMetadata::named("Greeter")
//!             .dependency("clock", "Clock")
//!             .scalar_or("greeting", "hello")
//!             .build(|args| {
//!                 args.service::<Clock>("clock")?;
//!                 Ok(Greeter { greeting: args.scalar("greeting")? })
//!             }),
//!     )?
//!     .singleton("Clock")?
//!     .scoped("Greeter")?;
//!
//! let container = builder.build();
//! ScopeManager::new(&container).run(Scope::Tick, |scope| -> scopewire::Result<()> {
//!     let greeter = scope.get_as::<Greeter>("Greeter")?;
//!     println!("{}", greeter.greeting);
//!     Ok(())
//! })
//! # }
//! ```

pub mod config;
pub mod errors;
pub mod infrastructure;
pub mod logging;

pub use infrastructure::compiler;

// Re-export commonly used items for convenience
pub use config::{ConfigLoader, WiringConfig};
pub use errors::{ConfigError, ContainerError, Result};
pub use infrastructure::container::{
    Args, Argument, Binding, ConstructionPlan, ContextualBinding, ModuleAccessPolicy, ParamKind,
    ParamSpec, Registry, TypeCatalog, TypeMetadata,
};
pub use infrastructure::{
    factory, instance_factory, service_id, CompiledContainer, CompiledSlots, Compiler, Container,
    ContainerBuilder, ContainerStats, DependencyGraph, FnModule, Instance, Module, Resolve,
    ResolveExt, Scope, ScopeManager, ScopedContainer, ServiceFactory, ServiceKind, ServiceNode,
    SharedFactory, TaggedServices,
};
pub use logging::{init_logging, LogFormat, LoggingConfig, OperationTimer};

/// 创建构建器（推荐的入口）
pub fn builder() -> ContainerBuilder {
    ContainerBuilder::new()
}
