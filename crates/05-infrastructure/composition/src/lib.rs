//! # 基础设施组合层
//!
//! 把配置加载、日志初始化和注入器组装组合成一个启动入口。
//!
//! ## 基本使用
//!
//! ```rust,no_run
//! use infrastructure_composition::{ContainerConfigLoader, InjectorBuilder, LoggingConfig};
//! use di_abstractions::{Binding, ResolverExt};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let loader = ContainerConfigLoader::new()
//!         .with_optional_file("config/container.toml")
//!         .with_env_prefix("DI");
//!
//!     let injector = InjectorBuilder::new()
//!         .load_config(&loader)?
//!         .with_logging(LoggingConfig::development())
//!         .bind(Binding::value("weave".to_string()).named("app.name"))
//!         .build()?;
//!
//!     let name = injector.get_named::<String>("app.name")?;
//!     println!("应用名称: {}", name);
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod config_loader;

// 重新导出主要类型
pub use builder::{InjectorBuilder, LoggingConfig};
pub use config_loader::{ContainerConfigLoader, DEFAULT_ENV_PREFIX};

// 重新导出错误类型
pub use infrastructure_common::InfrastructureError;
