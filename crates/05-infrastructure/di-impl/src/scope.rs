//! 上下文作用域存储
//!
//! 把“当前活跃的注入上下文”关联到调用方的执行单元。两种存储策略在进程启动时选定一次：
//! 线程局部存储，或者绑定到 tokio 任务调用树的任务局部存储。

use crate::context::ContextNode;
use di_abstractions::{Binding, Overrides};
use infrastructure_common::{Element, ScopeStrategy};
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

type Cell = RefCell<Option<Arc<ContextNode>>>;

thread_local! {
    static THREAD_CONTEXT: Cell = const { RefCell::new(None) };
}

tokio::task_local! {
    static TASK_CONTEXT: Cell;
}

/// 上下文作用域提供者
///
/// 每个进程只构造一个实例，并传递给所有注入器。
#[derive(Debug)]
pub struct ContextScopes {
    strategy: ScopeStrategy,
}

impl ContextScopes {
    /// 创建指定策略的作用域提供者
    pub fn new(strategy: ScopeStrategy) -> Self {
        Self { strategy }
    }

    /// 存储策略
    pub fn strategy(&self) -> ScopeStrategy {
        self.strategy
    }

    /// 当前执行单元上最内层的活跃上下文
    pub fn current(&self) -> Option<Arc<ContextNode>> {
        match self.strategy {
            ScopeStrategy::Thread => THREAD_CONTEXT
                .try_with(|cell| cell.borrow().clone())
                .ok()
                .flatten(),
            ScopeStrategy::Task => TASK_CONTEXT
                .try_with(|cell| cell.borrow().clone())
                .ok()
                .flatten(),
        }
    }

    /// 为一次请求创建上下文节点；没有父节点时创建新的根上下文
    pub(crate) fn enter_context_scope(
        &self,
        parent: Option<Arc<ContextNode>>,
        element: Element,
        binding: Arc<Binding>,
        overrides: Overrides,
    ) -> ContextScope<'_> {
        let node = match parent {
            Some(parent) => ContextNode::new_child(&parent, element, binding, overrides),
            None => ContextNode::new_root(element, binding, overrides),
        };
        ContextScope { scopes: self, node }
    }

    /// 在 `node` 作为当前上下文的情况下执行 `op`，任何退出路径（包括 panic）都会恢复之前的值
    pub(crate) fn execute_within<R>(&self, node: Arc<ContextNode>, op: impl FnOnce() -> R) -> R {
        match self.strategy {
            ScopeStrategy::Thread => {
                let previous = THREAD_CONTEXT.with(|cell| cell.replace(Some(node)));
                let _guard = RestoreGuard {
                    strategy: ScopeStrategy::Thread,
                    previous: Some(previous),
                };
                op()
            }
            ScopeStrategy::Task => {
                match TASK_CONTEXT.try_with(|cell| cell.replace(Some(node.clone()))) {
                    Ok(previous) => {
                        let _guard = RestoreGuard {
                            strategy: ScopeStrategy::Task,
                            previous: Some(previous),
                        };
                        op()
                    }
                    // 不在任务作用域内：只为这次调用建立一个存储单元
                    Err(_) => TASK_CONTEXT.sync_scope(RefCell::new(Some(node)), op),
                }
            }
        }
    }

    /// 为一个异步请求建立任务级存储单元
    ///
    /// 线程策略下直接执行 `future`。
    pub async fn scope_task<F: Future>(&self, future: F) -> F::Output {
        match self.strategy {
            ScopeStrategy::Thread => future.await,
            ScopeStrategy::Task => {
                trace!("建立任务级上下文存储");
                TASK_CONTEXT.scope(RefCell::new(None), future).await
            }
        }
    }
}

impl Default for ContextScopes {
    fn default() -> Self {
        Self::new(ScopeStrategy::default())
    }
}

/// 一次上下文作用域
pub(crate) struct ContextScope<'a> {
    scopes: &'a ContextScopes,
    node: Arc<ContextNode>,
}

impl ContextScope<'_> {
    /// 作用域对应的上下文节点
    pub(crate) fn node(&self) -> &Arc<ContextNode> {
        &self.node
    }

    /// 安装作用域执行 `op`，退出时恢复之前的作用域状态
    pub(crate) fn execute_scoped<R>(&self, op: impl FnOnce() -> R) -> R {
        self.scopes.execute_within(self.node.clone(), op)
    }
}

struct RestoreGuard {
    strategy: ScopeStrategy,
    previous: Option<Option<Arc<ContextNode>>>,
}

impl Drop for RestoreGuard {
    fn drop(&mut self) {
        let Some(previous) = self.previous.take() else {
            return;
        };
        let restore = |cell: &Cell| {
            *cell.borrow_mut() = previous;
        };
        // 线程或任务正在销毁时存储单元可能已经不可用
        match self.strategy {
            ScopeStrategy::Thread => {
                let _ = THREAD_CONTEXT.try_with(restore);
            }
            ScopeStrategy::Task => {
                let _ = TASK_CONTEXT.try_with(restore);
            }
        }
    }
}
