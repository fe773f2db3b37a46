//! 容器配置加载
//!
//! 分层读取：默认值 -> 配置文件（TOML / JSON / YAML，按扩展名识别）-> 带前缀的环境变量。
//! 环境变量使用 `__` 分隔，例如 `DI__SCOPE_STRATEGY=task`。

use infrastructure_common::{ConfigError, ConfigResult, ContainerConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

/// 默认的环境变量前缀
pub const DEFAULT_ENV_PREFIX: &str = "DI";

/// 容器配置加载器
#[derive(Debug, Clone, Default)]
pub struct ContainerConfigLoader {
    file: Option<PathBuf>,
    file_required: bool,
    env_prefix: Option<String>,
    env_source: Option<HashMap<String, String>>,
}

impl ContainerConfigLoader {
    /// 创建只使用默认值的加载器
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取必须存在的配置文件
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.file_required = true;
        self
    }

    /// 读取可选的配置文件，文件不存在时跳过
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        self.file = Some(path.as_ref().to_path_buf());
        self.file_required = false;
        self
    }

    /// 读取带前缀的环境变量
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// 用给定的变量表代替进程环境变量
    pub fn with_env_source(mut self, variables: HashMap<String, String>) -> Self {
        self.env_source = Some(variables);
        self
    }

    /// 加载并验证配置
    pub fn load(&self) -> ConfigResult<ContainerConfig> {
        let mut builder = config::Config::builder();

        if let Some(path) = &self.file {
            if self.file_required && !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            debug!("添加配置文件: {}", path.display());
            builder = builder.add_source(config::File::from(path.as_path()).required(self.file_required));
        }

        if self.env_prefix.is_some() || self.env_source.is_some() {
            let prefix = self.env_prefix.as_deref().unwrap_or(DEFAULT_ENV_PREFIX);
            debug!("添加环境变量配置源，前缀: {}", prefix);
            builder = builder.add_source(
                config::Environment::with_prefix(prefix)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .source(self.env_source.clone()),
            );
        }

        let settings = builder.build().map_err(|e| {
            error!("配置构建失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })?;

        let container: ContainerConfig = settings.try_deserialize().map_err(|e| {
            error!("容器配置绑定失败: {}", e);
            ConfigError::ParseError {
                source: Box::new(e),
            }
        })?;
        container.validate()?;

        info!(
            scope_strategy = ?container.scope_strategy,
            policy = ?container.registration_policy,
            "容器配置加载完成"
        );
        Ok(container)
    }
}
