//! 基于注册表的成员注入器

use dashmap::DashMap;
use di_abstractions::{MemberInjector, Resolver};
use infrastructure_common::{InjectionResult, Instance, TypeInfo};
use std::any::TypeId;
use std::fmt;
use std::sync::Arc;

type MembersFn = Arc<dyn Fn(&Instance, &dyn Resolver) -> InjectionResult<()> + Send + Sync>;
type ReadyFn = Arc<dyn Fn(&Instance) -> InjectionResult<()> + Send + Sync>;

/// 按实例类型登记成员注入函数和 `on_ready` 回调的 [`MemberInjector`]
///
/// 同一类型可以登记多个函数，按登记顺序执行。
#[derive(Default)]
pub struct MemberInjectorRegistry {
    members: DashMap<TypeId, Vec<MembersFn>>,
    ready: DashMap<TypeId, Vec<ReadyFn>>,
}

impl MemberInjectorRegistry {
    /// 创建空注册表
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记类型 `T` 的成员注入函数
    pub fn register_members<T, F>(&self, inject: F) -> &Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Arc<T>, &dyn Resolver) -> InjectionResult<()> + Send + Sync + 'static,
    {
        let inject: MembersFn = Arc::new(move |instance: &Instance, resolver: &dyn Resolver| {
            inject(&instance.downcast::<T>()?, resolver)
        });
        self.members.entry(TypeId::of::<T>()).or_default().push(inject);
        self
    }

    /// 登记类型 `T` 的 `on_ready` 回调
    pub fn register_ready<T, F>(&self, callback: F) -> &Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Arc<T>) -> InjectionResult<()> + Send + Sync + 'static,
    {
        let callback: ReadyFn =
            Arc::new(move |instance: &Instance| callback(&instance.downcast::<T>()?));
        self.ready.entry(TypeId::of::<T>()).or_default().push(callback);
        self
    }

    fn members_of(&self, type_info: &TypeInfo) -> Vec<MembersFn> {
        self.members
            .get(&type_info.id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    fn ready_of(&self, type_info: &TypeInfo) -> Vec<ReadyFn> {
        self.ready
            .get(&type_info.id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }
}

impl MemberInjector for MemberInjectorRegistry {
    fn inject_members(&self, instance: &Instance, resolver: &dyn Resolver) -> InjectionResult<()> {
        // 先复制出函数列表，注入过程中可能再次进入注册表
        for inject in self.members_of(&instance.type_info()) {
            inject(instance, resolver)?;
        }
        Ok(())
    }

    fn on_ready(&self, instance: &Instance) -> InjectionResult<()> {
        for callback in self.ready_of(&instance.type_info()) {
            callback(instance)?;
        }
        Ok(())
    }

    fn handles(&self, type_info: &TypeInfo) -> bool {
        self.members.contains_key(&type_info.id) || self.ready.contains_key(&type_info.id)
    }
}

impl fmt::Debug for MemberInjectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberInjectorRegistry")
            .field("members", &self.members.len())
            .field("ready", &self.ready.len())
            .finish()
    }
}
