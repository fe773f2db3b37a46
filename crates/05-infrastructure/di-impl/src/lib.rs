//! # 依赖注入具体实现
//!
//! 注入上下文引擎：在一次顶层请求内把绑定解析为实例，维护上下文树、
//! 通过替身打破构造器循环依赖，并在根完成时统一执行成员注入。
//!
//! ```ignore
//! use di_impl::prelude::*;
//!
//! let injector = Injector::default();
//! injector.install(Binding::value("hello".to_string()))?;
//! let widget = injector.provide::<Widget>()?;
//! ```

pub mod context;
pub mod injector;
pub mod members;
pub mod scope;
pub mod stand_in;

pub use context::ContextNode;
pub use injector::{Injector, InjectorServices};
pub use members::MemberInjectorRegistry;
pub use scope::ContextScopes;
pub use stand_in::StandInRegistry;

/// 常用类型
pub mod prelude {
    pub use crate::{
        ContextNode, ContextScopes, Injector, InjectorServices, MemberInjectorRegistry,
        StandInRegistry,
    };
    pub use di_abstractions::{
        Binding, BindingSource, DelegateCell, Injectable, MemberInjector, MemberSlot, Overrides,
        Provider, ProxyFabricator, Resolver, ResolverExt,
    };
    pub use infrastructure_common::{
        ContainerConfig, Element, InjectionError, InjectionResult, Instance, Lifetime, Qualifier,
        RegistrationPolicy, ScopeStrategy,
    };
}
