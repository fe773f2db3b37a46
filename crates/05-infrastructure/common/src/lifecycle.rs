//! 组件生命周期与注入上下文状态

use serde::{Deserialize, Serialize};

/// 组件生命周期类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifetime {
    /// 单例模式 - 创建它的根上下文成功完成后缓存在绑定上，之后一直复用
    Singleton,
    /// 作用域模式 - 在同一棵根上下文树内共享实例
    Scoped,
    /// 瞬时模式 - 每次请求都创建新实例
    #[default]
    Transient,
}

impl Lifetime {
    /// 同一棵上下文树内是否复用实例
    pub fn is_shared(self) -> bool {
        matches!(self, Self::Singleton | Self::Scoped)
    }
}

/// 注入上下文状态
///
/// `Pending -> Resolving -> Resolved`，或 `Resolving -> Failed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContextState {
    /// 已创建，尚未开始构造
    #[default]
    Pending,
    /// 构造策略正在执行
    Resolving,
    /// 已解析出实例
    Resolved,
    /// 构造失败
    Failed,
}

impl ContextState {
    /// 是否为终止状态
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Failed)
    }

    /// 检查状态迁移是否合法
    pub fn can_transition_to(self, next: ContextState) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Resolving)
                | (Self::Resolving, Self::Resolved)
                | (Self::Resolving, Self::Failed)
        )
    }
}
