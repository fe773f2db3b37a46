//! # Infrastructure Common
//!
//! 依赖注入容器各层共享的基础类型。
//!
//! ## 核心类型
//!
//! - [`Element`] - 类型 + 名称 + 限定符组成的结构化查找键
//! - [`Instance`] - 类型擦除的共享实例
//! - [`DependencyPath`] - 诊断用的依赖链路
//! - [`InjectionError`] - 依赖注入错误分类
//! - [`ContainerConfig`] - 容器配置
//! - [`Lifetime`] / [`ContextState`] - 生命周期与上下文状态

pub mod configuration;
pub mod errors;
pub mod lifecycle;
pub mod metadata;

pub use configuration::*;
pub use errors::*;
pub use lifecycle::*;
pub use metadata::*;
