//! 组件解析器抽象接口
//!
//! 构造策略、成员注入器和 [`Provider`] 都通过 [`Resolver`] 请求依赖。

use crate::registry::{Binding, ImplicitBinding};
use infrastructure_common::{DependencyPath, Element, InjectionResult, Instance, Qualifier};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// 组件解析器 trait
///
/// 对象安全，构造策略拿到的是 `&dyn Resolver`。
pub trait Resolver {
    /// 解析元素对应的实例
    ///
    /// `implicit` 在找不到任何绑定时用于合成隐式绑定。
    fn resolve_instance(
        &self,
        element: &Element,
        implicit: Option<ImplicitBinding>,
    ) -> InjectionResult<Instance>;

    /// 携带预置实例解析元素，预置实例只在这一次请求形成的子树内生效
    fn resolve_with_overrides(
        &self,
        element: &Element,
        overrides: Overrides,
        implicit: Option<ImplicitBinding>,
    ) -> InjectionResult<Instance>;

    /// 当前的依赖路径
    fn path(&self) -> DependencyPath;

    /// 可以脱离当前调用保存下来的解析源
    fn source(&self) -> Arc<dyn Resolver + Send + Sync>;
}

/// 可注入类型
///
/// 实现此 trait 的具体类型在没有显式绑定时可以被自动构造。
pub trait Injectable: Sized + Send + Sync + 'static {
    /// 通过解析器请求依赖并构造实例
    fn construct(resolver: &dyn Resolver) -> InjectionResult<Self>;
}

/// [`Resolver`] 的泛型便捷方法
pub trait ResolverExt: Resolver {
    /// 按类型解析
    fn get<T: ?Sized + Send + Sync + 'static>(&self) -> InjectionResult<Arc<T>> {
        self.get_element(&Element::of::<T>())
    }

    /// 按类型和名称解析
    fn get_named<T: ?Sized + Send + Sync + 'static>(
        &self,
        name: impl Into<String>,
    ) -> InjectionResult<Arc<T>> {
        self.get_element(&Element::named::<T>(name))
    }

    /// 按类型和限定符解析
    fn get_qualified<T: ?Sized + Send + Sync + 'static>(
        &self,
        qualifier: Qualifier,
    ) -> InjectionResult<Arc<T>> {
        self.get_element(&Element::of::<T>().with_qualifier(qualifier))
    }

    /// 按元素解析
    fn get_element<T: ?Sized + Send + Sync + 'static>(
        &self,
        element: &Element,
    ) -> InjectionResult<Arc<T>> {
        self.resolve_instance(element, None)?.downcast::<T>()
    }

    /// 解析可注入类型，未注册时自动合成构造器绑定
    fn provide<T: Injectable>(&self) -> InjectionResult<Arc<T>> {
        self.resolve_instance(&Element::of::<T>(), Some(Binding::implicit_constructor::<T>))?
            .downcast::<T>()
    }

    /// 获取延迟解析的提供者
    fn provider<T: ?Sized + Send + Sync + 'static>(&self) -> Provider<T> {
        Provider::new(self.source(), Element::of::<T>(), None)
    }

    /// 获取可注入类型的延迟提供者
    fn injectable_provider<T: Injectable>(&self) -> Provider<T> {
        Provider::new(
            self.source(),
            Element::of::<T>(),
            Some(Binding::implicit_constructor::<T>),
        )
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

/// 预置实例集合
#[derive(Clone, Default)]
pub struct Overrides {
    instances: HashMap<Element, Instance>,
}

impl Overrides {
    /// 创建空集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 按类型预置实例
    pub fn with<T: ?Sized + Send + Sync + 'static>(self, instance: Arc<T>) -> Self {
        self.with_element(Element::of::<T>(), Instance::new(instance))
    }

    /// 按元素预置实例
    pub fn with_element(mut self, element: Element, instance: Instance) -> Self {
        self.instances.insert(element, instance);
        self
    }

    /// 查找预置实例
    pub fn get(&self, element: &Element) -> Option<&Instance> {
        self.instances.get(element)
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// 预置实例数量
    pub fn len(&self) -> usize {
        self.instances.len()
    }
}

impl fmt::Debug for Overrides {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.instances.keys()).finish()
    }
}

/// 延迟解析的提供者
///
/// 每次 [`Provider::get`] 都会重新走一次解析流程；在构造策略内部调用时会加入当前的上下文树。
pub struct Provider<T: ?Sized> {
    source: Arc<dyn Resolver + Send + Sync>,
    element: Element,
    implicit: Option<ImplicitBinding>,
    _marker: PhantomData<fn() -> Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> Provider<T> {
    /// 创建提供者
    pub fn new(
        source: Arc<dyn Resolver + Send + Sync>,
        element: Element,
        implicit: Option<ImplicitBinding>,
    ) -> Self {
        Self {
            source,
            element,
            implicit,
            _marker: PhantomData,
        }
    }

    /// 解析实例
    pub fn get(&self) -> InjectionResult<Arc<T>> {
        self.source
            .resolve_instance(&self.element, self.implicit)?
            .downcast::<T>()
    }

    /// 提供者对应的元素
    pub fn element(&self) -> &Element {
        &self.element
    }
}

impl<T: ?Sized> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            element: self.element.clone(),
            implicit: self.implicit,
            _marker: PhantomData,
        }
    }
}

impl<T: ?Sized> fmt::Debug for Provider<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("element", &self.element)
            .finish()
    }
}
