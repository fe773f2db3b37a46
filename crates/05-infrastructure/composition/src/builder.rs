//! 注入器构建器

use crate::config_loader::ContainerConfigLoader;
use di_abstractions::{Binding, BindingSource, MemberInjector, ProxyFabricator};
use di_impl::{Injector, InjectorServices};
use infrastructure_common::{ContainerConfig, InfrastructureError, InfrastructureResult};
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// 注入器构建器
///
/// 使用建造者模式组装配置、协作者和绑定，得到一个可用的根注入器
pub struct InjectorBuilder {
    /// 容器配置
    config: ContainerConfig,
    /// 单独添加的绑定，按添加顺序注册
    bindings: Vec<Binding>,
    /// 绑定来源，在单独添加的绑定之后注册
    sources: Vec<Box<dyn BindingSource>>,
    /// 代理工厂
    fabricator: Option<Arc<dyn ProxyFabricator>>,
    /// 成员注入器
    members: Option<Arc<dyn MemberInjector>>,
    /// 是否启用日志初始化
    logging_enabled: bool,
    /// 日志配置
    logging_config: LoggingConfig,
}

impl InjectorBuilder {
    /// 创建新的注入器构建器
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
            bindings: Vec::new(),
            sources: Vec::new(),
            fabricator: None,
            members: None,
            logging_enabled: false, // 默认不启用日志初始化
            logging_config: LoggingConfig::default(),
        }
    }

    /// 使用指定的容器配置
    pub fn with_config(mut self, config: ContainerConfig) -> Self {
        self.config = config;
        self
    }

    /// 通过配置加载器读取容器配置
    pub fn load_config(mut self, loader: &ContainerConfigLoader) -> InfrastructureResult<Self> {
        self.config = loader.load()?;
        Ok(self)
    }

    /// 添加绑定
    pub fn bind(mut self, binding: Binding) -> Self {
        self.bindings.push(binding);
        self
    }

    /// 添加绑定来源
    pub fn add_source<S: BindingSource + 'static>(mut self, source: S) -> Self {
        debug!("添加绑定来源: {}", source.name());
        self.sources.push(Box::new(source));
        self
    }

    /// 设置代理工厂
    pub fn with_proxy_fabricator<F: ProxyFabricator + 'static>(mut self, fabricator: F) -> Self {
        self.fabricator = Some(Arc::new(fabricator));
        self
    }

    /// 设置成员注入器
    pub fn with_member_injector<M: MemberInjector + 'static>(mut self, members: M) -> Self {
        self.members = Some(Arc::new(members));
        self
    }

    /// 配置日志
    pub fn with_logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = config;
        self.logging_enabled = true; // 启用日志初始化
        self
    }

    /// 构建根注入器
    pub fn build(self) -> InfrastructureResult<Injector> {
        // 只有在明确配置了日志时才初始化日志
        // 避免在测试环境中重复初始化
        if self.logging_enabled {
            self.logging_config.initialize()?;
        }

        info!("开始构建注入器");
        self.config.validate()?;

        let mut services = InjectorServices::new(self.config);
        if let Some(fabricator) = self.fabricator {
            services = services.with_proxy_fabricator(fabricator);
        }
        if let Some(members) = self.members {
            services = services.with_member_injector(members);
        }
        let injector = Injector::new(services);

        let mut installed = 0;
        for binding in self.bindings {
            injector.install(binding)?;
            installed += 1;
        }
        for source in &self.sources {
            installed += injector.install_all(source.as_ref())?;
        }

        info!("注入器构建完成，共注册 {} 个绑定", installed);
        Ok(injector)
    }
}

impl Default for InjectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: tracing::Level,
    /// 额外的过滤指令，例如 `di_impl=trace`
    pub filter: Option<String>,
    /// 是否显示目标
    pub show_target: bool,
    /// 是否显示线程ID
    pub show_thread_ids: bool,
    /// 是否显示文件名
    pub show_file: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 是否使用 JSON 格式
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            filter: None,
            show_target: true,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// 创建开发环境日志配置
    pub fn development() -> Self {
        Self {
            level: tracing::Level::DEBUG,
            filter: None,
            show_target: true,
            show_thread_ids: true,
            show_file: true,
            show_line_number: true,
            json_format: false,
        }
    }

    /// 创建生产环境日志配置
    pub fn production() -> Self {
        Self {
            level: tracing::Level::INFO,
            filter: None,
            show_target: false,
            show_thread_ids: false,
            show_file: false,
            show_line_number: false,
            json_format: true,
        }
    }

    /// 设置过滤指令
    pub fn with_filter(mut self, directives: impl Into<String>) -> Self {
        self.filter = Some(directives.into());
        self
    }

    /// 构造过滤器：默认级别 + 额外指令
    pub fn env_filter(&self) -> InfrastructureResult<EnvFilter> {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(self.level).into())
            .parse(self.filter.as_deref().unwrap_or_default())
            .map_err(|e| InfrastructureError::BootstrapFailed {
                message: format!("日志过滤指令无效: {}", e),
            })
    }

    /// 初始化全局日志订阅器
    fn initialize(&self) -> InfrastructureResult<()> {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(self.env_filter()?)
            .with_target(self.show_target)
            .with_thread_ids(self.show_thread_ids)
            .with_file(self.show_file)
            .with_line_number(self.show_line_number);

        if self.json_format {
            subscriber.json().try_init()
        } else {
            subscriber.try_init()
        }
        .map_err(|e| InfrastructureError::BootstrapFailed {
            message: format!("日志初始化失败: {}", e),
        })?;

        info!("日志系统初始化完成");
        Ok(())
    }
}
