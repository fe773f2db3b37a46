//! 错误类型定义

use crate::metadata::DependencyPath;
use thiserror::Error;

/// 依赖注入错误类型
#[derive(Error, Debug)]
pub enum InjectionError {
    #[error("未找到绑定且类型不可实例化: {element}")]
    UnresolvedBinding { element: String },

    #[error("组件构造失败: {source}")]
    Construction {
        #[source]
        source: anyhow::Error,
    },

    #[error("检测到循环依赖且类型 {type_name} 无法生成代理")]
    CircularBinding { type_name: String },

    #[error("代理 {type_name} 的委托对象已被设置")]
    DelegateAlreadySet { type_name: String },

    #[error("代理 {type_name} 的委托对象尚未就绪")]
    DelegateNotReady { type_name: String },

    #[error("严格模式下重复注册绑定: {element}")]
    Conflict { element: String },

    #[error("类型转换失败: 期望 {expected}, 实际 {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("解析深度超过上限 {max_depth}")]
    DepthExceeded { max_depth: usize },

    #[error("解析 {path} 失败: {source}")]
    Resolution {
        path: DependencyPath,
        #[source]
        source: Box<InjectionError>,
    },
}

impl InjectionError {
    /// 用任意错误创建构造失败错误
    pub fn construction(source: impl Into<anyhow::Error>) -> Self {
        Self::Construction {
            source: source.into(),
        }
    }

    /// 附加依赖路径，已经带路径的错误保持不变
    pub fn located(self, path: DependencyPath) -> Self {
        match self {
            located @ Self::Resolution { .. } => located,
            other => Self::Resolution {
                path,
                source: Box::new(other),
            },
        }
    }

    /// 最内层的错误，用于匹配错误种类
    pub fn kind(&self) -> &InjectionError {
        match self {
            Self::Resolution { source, .. } => source.kind(),
            other => other,
        }
    }

    /// 出错时的依赖路径
    pub fn path(&self) -> Option<&DependencyPath> {
        match self {
            Self::Resolution { path, .. } => Some(path),
            _ => None,
        }
    }

    /// 是否已经附加了依赖路径
    pub fn is_located(&self) -> bool {
        matches!(self, Self::Resolution { .. })
    }
}

impl From<anyhow::Error> for InjectionError {
    fn from(source: anyhow::Error) -> Self {
        Self::Construction { source }
    }
}

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置解析失败: {source}")]
    ParseError {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("配置验证失败: {message}")]
    ValidationError { message: String },
}

/// 基础设施错误类型
#[derive(Error, Debug)]
pub enum InfrastructureError {
    #[error("配置错误: {source}")]
    ConfigError {
        #[from]
        source: ConfigError,
    },

    #[error("依赖注入错误: {source}")]
    InjectionError {
        #[from]
        source: InjectionError,
    },

    #[error("基础设施启动失败: {message}")]
    BootstrapFailed { message: String },
}

/// 结果类型别名
pub type InjectionResult<T> = Result<T, InjectionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type InfrastructureResult<T> = Result<T, InfrastructureError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Element, PathSegment, TypeInfo};

    fn path_of_string() -> DependencyPath {
        vec![PathSegment {
            element: Element::of::<String>(),
            target: TypeInfo::of::<String>(),
        }]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_located_wraps_only_once() {
        let err = InjectionError::CircularBinding {
            type_name: "A".into(),
        }
        .located(path_of_string())
        .located(DependencyPath::new());

        assert!(err.is_located());
        assert_eq!(err.path().map(DependencyPath::len), Some(1));
        assert!(matches!(err.kind(), InjectionError::CircularBinding { .. }));
    }

    #[test]
    fn test_anyhow_maps_to_construction() {
        let err: InjectionError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, InjectionError::Construction { .. }));
        assert!(err.to_string().contains("boom"));
        assert!(err.path().is_none());
    }
}
