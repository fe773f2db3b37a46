//! # Dependency Injection Abstractions
//!
//! 依赖注入抽象层，定义注入上下文引擎消费和暴露的边界契约。
//!
//! ## 核心接口
//!
//! - [`Resolver`] / [`ResolverExt`] - 构造策略请求依赖的入口
//! - [`Injectable`] - 可自动构造的具体类型
//! - [`Binding`] / [`BindingSource`] - 绑定与绑定来源
//! - [`ProxyFabricator`] / [`DelegateCell`] - 打破循环依赖的替身协议
//! - [`MemberInjector`] - 成员注入与生命周期回调

pub mod container;
pub mod factory;
pub mod registry;
pub mod resolver;

pub use container::*;
pub use factory::*;
pub use registry::*;
pub use resolver::*;
