//! 代理工厂抽象接口
//!
//! 循环依赖时引擎向 [`ProxyFabricator`] 请求一个替身（stand-in）：一个实现了契约的代理对象，
//! 以及一个只能设置一次的委托单元。真正的实例构造完成后委托单元被锁定，之后所有调用转发给它。

use infrastructure_common::{InjectionError, InjectionResult, Instance, TypeInfo};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// 只能设置一次的委托单元
///
/// 设置依赖 [`OnceCell::set`] 的原子比较交换，并发设置只有一个会成功。
pub struct DelegateCell<T: ?Sized> {
    delegate: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> DelegateCell<T> {
    /// 创建空的委托单元
    pub fn new() -> Self {
        Self {
            delegate: OnceCell::new(),
        }
    }

    /// 设置委托对象，第二次设置返回 [`InjectionError::DelegateAlreadySet`]
    pub fn set(&self, delegate: Arc<T>) -> InjectionResult<()> {
        self.delegate
            .set(delegate)
            .map_err(|_| InjectionError::DelegateAlreadySet {
                type_name: TypeInfo::of::<T>().short_name(),
            })
    }

    /// 读取委托对象，未设置时返回 [`InjectionError::DelegateNotReady`]
    pub fn get(&self) -> InjectionResult<&Arc<T>> {
        self.delegate
            .get()
            .ok_or_else(|| InjectionError::DelegateNotReady {
                type_name: TypeInfo::of::<T>().short_name(),
            })
    }

    /// 是否已设置
    pub fn is_set(&self) -> bool {
        self.delegate.get().is_some()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for DelegateCell<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for DelegateCell<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DelegateCell")
            .field("set", &self.delegate.get().is_some())
            .finish()
    }
}

/// 类型擦除的委托锁定接口
pub trait DelegateLatch: Send + Sync {
    /// 用真正的实例锁定委托
    fn latch(&self, instance: &Instance) -> InjectionResult<()>;

    /// 是否已锁定
    fn is_latched(&self) -> bool;

    /// 代理的契约类型
    fn type_info(&self) -> TypeInfo;
}

impl<T: ?Sized + Send + Sync + 'static> DelegateLatch for DelegateCell<T> {
    fn latch(&self, instance: &Instance) -> InjectionResult<()> {
        self.set(instance.downcast::<T>()?)
    }

    fn is_latched(&self) -> bool {
        self.is_set()
    }

    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }
}

/// 替身：代理对象 + 委托单元
#[derive(Clone)]
pub struct StandIn {
    proxy: Instance,
    delegate: Arc<dyn DelegateLatch>,
}

impl StandIn {
    /// 由代理对象和它转发的委托单元组成替身
    pub fn new<T: ?Sized + Send + Sync + 'static>(proxy: Arc<T>, cell: Arc<DelegateCell<T>>) -> Self {
        Self {
            proxy: Instance::new(proxy),
            delegate: cell,
        }
    }

    /// 代理对象
    pub fn proxy(&self) -> &Instance {
        &self.proxy
    }

    /// 委托单元
    pub fn delegate(&self) -> &Arc<dyn DelegateLatch> {
        &self.delegate
    }
}

impl fmt::Debug for StandIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandIn")
            .field("type", &self.delegate.type_info().name)
            .field("latched", &self.delegate.is_latched())
            .finish()
    }
}

/// 代理工厂 trait
///
/// 引擎自己不生成代理，只在需要打破循环时调用这个协作者。
pub trait ProxyFabricator: Send + Sync {
    /// 能否为指定契约类型生成代理
    fn can_proxy(&self, type_info: &TypeInfo) -> bool;

    /// 生成替身
    fn create_stand_in(&self, type_info: &TypeInfo) -> InjectionResult<StandIn>;
}

/// 不支持任何代理的工厂，所有循环都会以 [`InjectionError::CircularBinding`] 失败
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProxies;

impl ProxyFabricator for NoProxies {
    fn can_proxy(&self, _type_info: &TypeInfo) -> bool {
        false
    }

    fn create_stand_in(&self, type_info: &TypeInfo) -> InjectionResult<StandIn> {
        Err(InjectionError::CircularBinding {
            type_name: type_info.short_name(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Clock: Send + Sync {
        fn now(&self) -> InjectionResult<u64>;
    }

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> InjectionResult<u64> {
            Ok(self.0)
        }
    }

    struct ClockProxy(Arc<DelegateCell<dyn Clock>>);

    impl Clock for ClockProxy {
        fn now(&self) -> InjectionResult<u64> {
            self.0.get()?.now()
        }
    }

    fn clock_stand_in() -> (StandIn, Arc<dyn Clock>) {
        let cell: Arc<DelegateCell<dyn Clock>> = Arc::new(DelegateCell::new());
        let proxy: Arc<dyn Clock> = Arc::new(ClockProxy(cell.clone()));
        (StandIn::new(proxy.clone(), cell), proxy)
    }

    #[test]
    fn test_premature_call_fails() {
        let (stand_in, proxy) = clock_stand_in();
        assert!(!stand_in.delegate().is_latched());
        assert!(matches!(
            proxy.now(),
            Err(InjectionError::DelegateNotReady { .. })
        ));
    }

    #[test]
    fn test_latch_forwards_calls() {
        let (stand_in, proxy) = clock_stand_in();
        let real: Arc<dyn Clock> = Arc::new(FixedClock(42));
        stand_in.delegate().latch(&Instance::new(real)).unwrap();

        assert!(stand_in.delegate().is_latched());
        assert_eq!(proxy.now().unwrap(), 42);
        assert!(stand_in.proxy().is::<dyn Clock>());
    }

    #[test]
    fn test_second_latch_fails() {
        let (stand_in, proxy) = clock_stand_in();
        let first: Arc<dyn Clock> = Arc::new(FixedClock(1));
        let second: Arc<dyn Clock> = Arc::new(FixedClock(2));

        stand_in.delegate().latch(&Instance::new(first)).unwrap();
        let err = stand_in.delegate().latch(&Instance::new(second)).unwrap_err();

        assert!(matches!(err, InjectionError::DelegateAlreadySet { .. }));
        assert_eq!(proxy.now().unwrap(), 1);
    }

    #[test]
    fn test_latch_with_wrong_type_fails() {
        let (stand_in, _proxy) = clock_stand_in();
        let err = stand_in
            .delegate()
            .latch(&Instance::new(Arc::new(5_u64)))
            .unwrap_err();
        assert!(matches!(err, InjectionError::TypeMismatch { .. }));
        assert!(!stand_in.delegate().is_latched());
    }

    #[test]
    fn test_no_proxies() {
        let info = TypeInfo::of::<dyn Clock>();
        assert!(!NoProxies.can_proxy(&info));
        assert!(matches!(
            NoProxies.create_stand_in(&info),
            Err(InjectionError::CircularBinding { .. })
        ));
    }
}
