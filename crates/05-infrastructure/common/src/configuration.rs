//! 容器配置定义

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// 注册策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationPolicy {
    /// 同一元素的首次注册生效，之后的注册被忽略
    #[default]
    FirstWins,
    /// 同一元素重复注册时报错
    Strict,
}

/// 上下文作用域存储策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStrategy {
    /// 每个操作系统线程一个存储单元
    #[default]
    Thread,
    /// 绑定到 tokio 任务的调用树
    Task,
}

/// 容器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// 注册策略
    pub registration_policy: RegistrationPolicy,
    /// 作用域存储策略，进程启动时选定
    pub scope_strategy: ScopeStrategy,
    /// 最大解析深度
    pub max_resolution_depth: usize,
    /// 是否允许使用代理打破循环依赖
    pub enable_cycle_breaking: bool,
    /// 是否为未注册的可注入类型自动合成绑定
    pub implicit_bindings: bool,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            registration_policy: RegistrationPolicy::FirstWins,
            scope_strategy: ScopeStrategy::Thread,
            max_resolution_depth: 100,
            enable_cycle_breaking: true,
            implicit_bindings: true,
        }
    }
}

impl ContainerConfig {
    /// 严格注册模式
    pub fn strict(mut self) -> Self {
        self.registration_policy = RegistrationPolicy::Strict;
        self
    }

    /// 设置作用域存储策略
    pub fn with_scope_strategy(mut self, strategy: ScopeStrategy) -> Self {
        self.scope_strategy = strategy;
        self
    }

    /// 设置最大解析深度
    pub fn with_max_resolution_depth(mut self, depth: usize) -> Self {
        self.max_resolution_depth = depth;
        self
    }

    /// 设置是否允许打破循环依赖
    pub fn with_cycle_breaking(mut self, enabled: bool) -> Self {
        self.enable_cycle_breaking = enabled;
        self
    }

    /// 设置是否合成隐式绑定
    pub fn with_implicit_bindings(mut self, enabled: bool) -> Self {
        self.implicit_bindings = enabled;
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_resolution_depth == 0 {
            return Err(ConfigError::ValidationError {
                message: "max_resolution_depth 必须大于 0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ContainerConfig::default();
        assert_eq!(config.registration_policy, RegistrationPolicy::FirstWins);
        assert_eq!(config.scope_strategy, ScopeStrategy::Thread);
        assert_eq!(config.max_resolution_depth, 100);
        assert!(config.enable_cycle_breaking);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_depth_is_invalid() {
        let config = ContainerConfig::default().with_max_resolution_depth(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: ContainerConfig =
            serde_json::from_str(r#"{"scope_strategy":"task","registration_policy":"strict"}"#)
                .unwrap();
        assert_eq!(config.scope_strategy, ScopeStrategy::Task);
        assert_eq!(config.registration_policy, RegistrationPolicy::Strict);
        assert_eq!(config.max_resolution_depth, 100);
    }
}
