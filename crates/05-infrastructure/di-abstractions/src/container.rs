//! 成员注入抽象接口
//!
//! 根上下文的对象图结构完整后，引擎对每个新构造的实例调用一次 [`MemberInjector`]。

use crate::resolver::Resolver;
use infrastructure_common::{InjectionError, InjectionResult, Instance, TypeInfo};
use once_cell::sync::OnceCell;
use std::fmt;
use std::sync::Arc;

/// 成员注入器 trait
pub trait MemberInjector: Send + Sync {
    /// 为实例注入字段/方法依赖
    ///
    /// `resolver` 以该实例的上下文为父节点，请求祖先链上已解析的元素会直接拿到真实实例。
    fn inject_members(&self, instance: &Instance, resolver: &dyn Resolver) -> InjectionResult<()>;

    /// 整棵对象图的成员注入全部完成后调用的生命周期回调
    fn on_ready(&self, _instance: &Instance) -> InjectionResult<()> {
        Ok(())
    }

    /// 是否关心该类型，不关心的实例会被跳过
    fn handles(&self, _type_info: &TypeInfo) -> bool {
        true
    }
}

/// 不做任何成员注入
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMembers;

impl MemberInjector for NoMembers {
    fn inject_members(&self, _instance: &Instance, _resolver: &dyn Resolver) -> InjectionResult<()> {
        Ok(())
    }

    fn handles(&self, _type_info: &TypeInfo) -> bool {
        false
    }
}

/// 成员注入的目标字段
///
/// 只能写入一次，构造完成前读取会得到 [`InjectionError::DelegateNotReady`]。
pub struct MemberSlot<T: ?Sized> {
    value: OnceCell<Arc<T>>,
}

impl<T: ?Sized + Send + Sync + 'static> MemberSlot<T> {
    /// 创建空字段
    pub fn new() -> Self {
        Self {
            value: OnceCell::new(),
        }
    }

    /// 注入值
    pub fn inject(&self, value: Arc<T>) -> InjectionResult<()> {
        self.value
            .set(value)
            .map_err(|_| InjectionError::DelegateAlreadySet {
                type_name: TypeInfo::of::<T>().short_name(),
            })
    }

    /// 读取值
    pub fn get(&self) -> InjectionResult<&Arc<T>> {
        self.value
            .get()
            .ok_or_else(|| InjectionError::DelegateNotReady {
                type_name: TypeInfo::of::<T>().short_name(),
            })
    }

    /// 是否已注入
    pub fn is_injected(&self) -> bool {
        self.value.get().is_some()
    }
}

impl<T: ?Sized + Send + Sync + 'static> Default for MemberSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> fmt::Debug for MemberSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberSlot")
            .field("injected", &self.value.get().is_some())
            .finish()
    }
}
