//! 基于注册表的代理工厂

use dashmap::DashMap;
use di_abstractions::{DelegateCell, ProxyFabricator, StandIn};
use infrastructure_common::{InjectionError, InjectionResult, TypeInfo};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

type StandInFactory = Arc<dyn Fn() -> StandIn + Send + Sync>;

/// 按契约类型登记代理构造函数的 [`ProxyFabricator`]
///
/// ```ignore
/// let registry = StandInRegistry::new()
///     .with::<dyn Greeter, _>(|cell| Arc::new(GreeterProxy(cell)));
/// ```
#[derive(Default)]
pub struct StandInRegistry {
    factories: DashMap<TypeId, StandInFactory>,
}

impl StandInRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记契约 `T` 的代理构造函数
    ///
    /// `make_proxy` 拿到委托单元，返回一个把所有调用转发给委托的代理。
    pub fn register<T, F>(&self, make_proxy: F) -> &Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<DelegateCell<T>>) -> Arc<T> + Send + Sync + 'static,
    {
        let factory: StandInFactory = Arc::new(move || {
            let cell = Arc::new(DelegateCell::<T>::new());
            let proxy = make_proxy(cell.clone());
            StandIn::new(proxy, cell)
        });
        self.factories.insert(TypeId::of::<T>(), factory);
        debug!(contract = %TypeInfo::of::<T>(), "登记代理");
        self
    }

    /// 构建器形式的 [`StandInRegistry::register`]
    pub fn with<T, F>(self, make_proxy: F) -> Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<DelegateCell<T>>) -> Arc<T> + Send + Sync + 'static,
    {
        self.register(make_proxy);
        self
    }

    /// 已登记的契约数量
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl ProxyFabricator for StandInRegistry {
    fn can_proxy(&self, type_info: &TypeInfo) -> bool {
        self.factories.contains_key(&type_info.id)
    }

    fn create_stand_in(&self, type_info: &TypeInfo) -> InjectionResult<StandIn> {
        let factory = self
            .factories
            .get(&type_info.id)
            .map(|factory| factory.value().clone())
            .ok_or_else(|| InjectionError::CircularBinding {
                type_name: type_info.short_name(),
            })?;
        Ok(factory())
    }
}

impl fmt::Debug for StandInRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandInRegistry")
            .field("contracts", &self.factories.len())
            .finish()
    }
}
