//! 绑定（上下文提供者）定义

use crate::resolver::{Injectable, Resolver};
use infrastructure_common::{Element, InjectionResult, Instance, Lifetime, Qualifier, TypeInfo};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// 合成隐式绑定的函数
pub type ImplicitBinding = fn() -> Binding;

/// 类型擦除的构造函数
pub type ConstructFn = Arc<dyn Fn(&dyn Resolver) -> InjectionResult<Instance> + Send + Sync>;

/// 类型擦除的向上转换函数
pub type UpcastFn = Arc<dyn Fn(Instance) -> InjectionResult<Instance> + Send + Sync>;

/// 绑定唯一标识
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}

/// 构造策略
#[derive(Clone)]
pub enum ConstructionStrategy {
    /// 通过 [`Injectable::construct`] 构造
    Constructor(ConstructFn),
    /// 用户提供的工厂函数
    Factory(ConstructFn),
    /// 固定实例
    Instance(Instance),
    /// 转发到另一个元素，再向上转换为契约类型
    Linked {
        /// 实际解析的元素
        target: Element,
        /// 目标元素缺少绑定时的隐式绑定
        implicit: Option<ImplicitBinding>,
        /// 向上转换
        upcast: UpcastFn,
    },
}

impl ConstructionStrategy {
    /// 执行构造策略
    pub fn construct(&self, resolver: &dyn Resolver) -> InjectionResult<Instance> {
        match self {
            Self::Constructor(construct) | Self::Factory(construct) => construct(resolver),
            Self::Instance(instance) => Ok(instance.clone()),
            Self::Linked {
                target,
                implicit,
                upcast,
            } => upcast(resolver.resolve_instance(target, *implicit)?),
        }
    }

    /// 构造完成后是否需要成员注入
    pub fn needs_member_injection(&self) -> bool {
        matches!(self, Self::Constructor(_) | Self::Factory(_))
    }

    /// 策略名称，用于日志
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Constructor(_) => "constructor",
            Self::Factory(_) => "factory",
            Self::Instance(_) => "instance",
            Self::Linked { .. } => "linked",
        }
    }
}

/// 绑定
///
/// 把一个或多个 [`Element`] 关联到一个构造策略。注册后不可变，
/// 唯一的内部状态是单例缓存。
pub struct Binding {
    id: BindingId,
    elements: Vec<Element>,
    target: TypeInfo,
    strategy: ConstructionStrategy,
    lifetime: Lifetime,
    implicit: bool,
    singleton: OnceCell<Instance>,
}

impl Binding {
    fn new(element: Element, target: TypeInfo, strategy: ConstructionStrategy) -> Self {
        Self {
            id: BindingId::next(),
            elements: vec![element],
            target,
            strategy,
            lifetime: Lifetime::Transient,
            implicit: false,
            singleton: OnceCell::new(),
        }
    }

    /// 通过可注入类型的构造器绑定
    pub fn constructor<T: Injectable>() -> Self {
        let construct: ConstructFn =
            Arc::new(|resolver: &dyn Resolver| Ok(Instance::new(Arc::new(T::construct(resolver)?))));
        Self::new(
            Element::of::<T>(),
            TypeInfo::of::<T>(),
            ConstructionStrategy::Constructor(construct),
        )
    }

    /// 为未注册的可注入类型合成的隐式绑定
    pub fn implicit_constructor<T: Injectable>() -> Self {
        let mut binding = Self::constructor::<T>();
        binding.implicit = true;
        binding
    }

    /// 通过工厂函数绑定
    pub fn factory<T, F>(factory: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&dyn Resolver) -> InjectionResult<Arc<T>> + Send + Sync + 'static,
    {
        let construct: ConstructFn =
            Arc::new(move |resolver: &dyn Resolver| Ok(Instance::new(factory(resolver)?)));
        Self::new(
            Element::of::<T>(),
            TypeInfo::of::<T>(),
            ConstructionStrategy::Factory(construct),
        )
    }

    /// 绑定固定实例
    pub fn instance<T: ?Sized + Send + Sync + 'static>(instance: Arc<T>) -> Self {
        Self::new(
            Element::of::<T>(),
            TypeInfo::of::<T>(),
            ConstructionStrategy::Instance(Instance::new(instance)),
        )
    }

    /// 绑定固定值
    pub fn value<T: Send + Sync + 'static>(value: T) -> Self {
        Self::instance(Arc::new(value))
    }

    /// 把契约类型 `I` 绑定到可注入实现 `C`
    pub fn linked<I, C, F>(upcast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        C: Injectable,
        F: Fn(Arc<C>) -> Arc<I> + Send + Sync + 'static,
    {
        let upcast: UpcastFn = Arc::new(move |instance: Instance| {
            Ok(Instance::new(upcast(instance.downcast::<C>()?)))
        });
        Self::new(
            Element::of::<I>(),
            TypeInfo::of::<C>(),
            ConstructionStrategy::Linked {
                target: Element::of::<C>(),
                implicit: Some(Binding::implicit_constructor::<C>),
                upcast,
            },
        )
    }

    /// 为主元素设置名称
    pub fn named(mut self, name: impl Into<String>) -> Self {
        if let Some(primary) = self.elements.first_mut() {
            *primary = primary.clone().with_name(name);
        }
        self
    }

    /// 为主元素添加限定符
    pub fn qualified(mut self, qualifier: Qualifier) -> Self {
        if let Some(primary) = self.elements.first_mut() {
            *primary = primary.clone().with_qualifier(qualifier);
        }
        self
    }

    /// 让绑定同时满足另一个元素
    pub fn also_as(mut self, element: Element) -> Self {
        if !self.elements.contains(&element) {
            self.elements.push(element);
        }
        self
    }

    /// 设置生命周期
    pub fn in_lifetime(mut self, lifetime: Lifetime) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// 单例
    pub fn singleton(self) -> Self {
        self.in_lifetime(Lifetime::Singleton)
    }

    /// 在同一棵上下文树内共享
    pub fn scoped(self) -> Self {
        self.in_lifetime(Lifetime::Scoped)
    }

    /// 绑定标识
    pub fn id(&self) -> BindingId {
        self.id
    }

    /// 绑定满足的所有元素，第一个为主元素
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// 主元素
    pub fn primary_element(&self) -> &Element {
        &self.elements[0]
    }

    /// 绑定实际构造的类型
    pub fn target(&self) -> TypeInfo {
        self.target
    }

    /// 构造策略
    pub fn strategy(&self) -> &ConstructionStrategy {
        &self.strategy
    }

    /// 生命周期
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    /// 是否为隐式合成的绑定
    pub fn is_implicit(&self) -> bool {
        self.implicit
    }

    /// 已缓存的单例
    pub fn cached_singleton(&self) -> Option<&Instance> {
        self.singleton.get()
    }

    /// 缓存单例，已有缓存时返回已缓存的实例
    pub fn cache_singleton(&self, instance: Instance) -> &Instance {
        self.singleton.get_or_init(|| instance)
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id)
            .field("elements", &self.elements)
            .field("target", &self.target.name)
            .field("strategy", &self.strategy.kind())
            .field("lifetime", &self.lifetime)
            .field("implicit", &self.implicit)
            .finish()
    }
}

/// 绑定来源
///
/// 一组有序的绑定声明，由构建期生成或运行期手写，通过 `Injector::install_all` 读取。
pub trait BindingSource: Send + Sync {
    /// 按声明顺序返回绑定
    fn bindings(&self) -> Vec<Binding>;

    /// 来源名称，用于日志
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> BindingSource for F
where
    F: Fn() -> Vec<Binding> + Send + Sync,
{
    fn bindings(&self) -> Vec<Binding> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infrastructure_common::{DependencyPath, InjectionError};
    use crate::resolver::Overrides;

    trait Shape: Send + Sync {
        fn sides(&self) -> u32;
    }

    #[derive(Debug)]
    struct Square;

    impl Shape for Square {
        fn sides(&self) -> u32 {
            4
        }
    }

    impl Injectable for Square {
        fn construct(_resolver: &dyn Resolver) -> InjectionResult<Self> {
            Ok(Square)
        }
    }

    /// 对任何元素都走隐式构造的解析器
    struct ImplicitOnly;

    impl Resolver for ImplicitOnly {
        fn resolve_instance(
            &self,
            element: &Element,
            implicit: Option<ImplicitBinding>,
        ) -> InjectionResult<Instance> {
            match implicit {
                Some(implicit) => implicit().strategy().construct(self),
                None => Err(InjectionError::UnresolvedBinding {
                    element: element.to_string(),
                }),
            }
        }

        fn resolve_with_overrides(
            &self,
            element: &Element,
            _overrides: Overrides,
            implicit: Option<ImplicitBinding>,
        ) -> InjectionResult<Instance> {
            self.resolve_instance(element, implicit)
        }

        fn path(&self) -> DependencyPath {
            DependencyPath::new()
        }

        fn source(&self) -> Arc<dyn Resolver + Send + Sync> {
            Arc::new(ImplicitOnly)
        }
    }

    #[test]
    fn test_binding_elements() {
        let binding = Binding::value(3_u8)
            .named("three")
            .also_as(Element::of::<u8>().with_qualifier(Qualifier::tag("small")))
            .singleton();

        assert_eq!(binding.elements().len(), 2);
        assert_eq!(binding.primary_element(), &Element::named::<u8>("three"));
        assert_eq!(binding.lifetime(), Lifetime::Singleton);
        assert!(!binding.strategy().needs_member_injection());
    }

    #[test]
    fn test_linked_binding_upcasts() {
        let binding = Binding::linked::<dyn Shape, Square, _>(|square| square as Arc<dyn Shape>);
        assert_eq!(binding.primary_element(), &Element::of::<dyn Shape>());
        assert_eq!(binding.target(), TypeInfo::of::<Square>());

        let instance = binding.strategy().construct(&ImplicitOnly).unwrap();
        assert_eq!(instance.downcast::<dyn Shape>().unwrap().sides(), 4);
    }

    #[test]
    fn test_singleton_cache_keeps_first_value() {
        let binding = Binding::factory(|_| Ok(Arc::new(1_u32))).singleton();
        assert!(binding.cached_singleton().is_none());

        binding.cache_singleton(Instance::new(Arc::new(1_u32)));
        let cached = binding.cache_singleton(Instance::new(Arc::new(2_u32)));
        assert_eq!(*cached.downcast::<u32>().unwrap(), 1);
    }

    #[test]
    fn test_binding_ids_are_unique() {
        assert_ne!(Binding::value(1_u8).id(), Binding::value(1_u8).id());
        assert!(Binding::implicit_constructor::<Square>().is_implicit());
        assert!(!Binding::constructor::<Square>().is_implicit());
    }

    #[test]
    fn test_closure_is_binding_source() {
        let source = || vec![Binding::value(1_u8), Binding::value("x".to_string())];
        assert_eq!(source.bindings().len(), 2);
    }
}
