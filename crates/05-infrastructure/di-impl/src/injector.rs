//! 注入器实现
//!
//! 注入器保存元素到绑定的映射，找不到时依次查找父注入器，最后为可构造的具体类型合成隐式绑定。

use crate::context::{self, ContextNode, Request};
use crate::scope::ContextScopes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use di_abstractions::{
    Binding, BindingSource, ImplicitBinding, MemberInjector, NoMembers, NoProxies, Overrides,
    ProxyFabricator, Resolver,
};
use infrastructure_common::{
    ContainerConfig, DependencyPath, Element, InjectionError, InjectionResult, Instance,
    RegistrationPolicy,
};
use std::fmt;
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// 注入器共享的运行期服务
///
/// 进程启动时构造一次，根注入器和所有子注入器共用。
#[derive(Clone)]
pub struct InjectorServices {
    config: ContainerConfig,
    scopes: Arc<ContextScopes>,
    fabricator: Arc<dyn ProxyFabricator>,
    members: Arc<dyn MemberInjector>,
}

impl InjectorServices {
    /// 使用配置创建服务，不生成代理，也不做成员注入
    pub fn new(config: ContainerConfig) -> Self {
        let scopes = Arc::new(ContextScopes::new(config.scope_strategy));
        Self {
            config,
            scopes,
            fabricator: Arc::new(NoProxies),
            members: Arc::new(NoMembers),
        }
    }

    /// 设置代理工厂
    pub fn with_proxy_fabricator(mut self, fabricator: Arc<dyn ProxyFabricator>) -> Self {
        self.fabricator = fabricator;
        self
    }

    /// 设置成员注入器
    pub fn with_member_injector(mut self, members: Arc<dyn MemberInjector>) -> Self {
        self.members = members;
        self
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// 上下文作用域提供者
    pub fn scopes(&self) -> &Arc<ContextScopes> {
        &self.scopes
    }

    /// 代理工厂
    pub fn fabricator(&self) -> &Arc<dyn ProxyFabricator> {
        &self.fabricator
    }

    /// 成员注入器
    pub fn members(&self) -> &Arc<dyn MemberInjector> {
        &self.members
    }
}

impl Default for InjectorServices {
    fn default() -> Self {
        Self::new(ContainerConfig::default())
    }
}

impl fmt::Debug for InjectorServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectorServices")
            .field("config", &self.config)
            .field("scopes", &self.scopes)
            .finish_non_exhaustive()
    }
}

#[derive(Clone)]
struct BindingEntry {
    binding: Arc<Binding>,
    /// 绑定注册所在的注入器，构造策略在它上面请求依赖
    owner: Weak<InjectorInner>,
    /// 从父注入器缓存下来的条目，可被本地注册覆盖
    inherited: bool,
}

struct InjectorInner {
    bindings: DashMap<Element, BindingEntry>,
    parent: Option<Arc<InjectorInner>>,
    services: InjectorServices,
}

/// 注入器
///
/// 克隆只复制句柄，所有克隆共享同一份绑定表。
#[derive(Clone)]
pub struct Injector {
    inner: Arc<InjectorInner>,
}

impl Injector {
    /// 创建根注入器
    pub fn new(services: InjectorServices) -> Self {
        info!(
            scope_strategy = ?services.config().scope_strategy,
            policy = ?services.config().registration_policy,
            "创建注入器"
        );
        Self {
            inner: Arc::new(InjectorInner {
                bindings: DashMap::new(),
                parent: None,
                services,
            }),
        }
    }

    /// 使用配置和默认协作者创建根注入器
    pub fn with_config(config: ContainerConfig) -> Self {
        Self::new(InjectorServices::new(config))
    }

    /// 创建子注入器
    ///
    /// 子注入器的注册不影响父注入器；父注入器中的绑定对子注入器可见。
    pub fn child(&self) -> Self {
        debug!("创建子注入器");
        Self {
            inner: Arc::new(InjectorInner {
                bindings: DashMap::new(),
                parent: Some(self.inner.clone()),
                services: self.inner.services.clone(),
            }),
        }
    }

    /// 父注入器
    pub fn parent(&self) -> Option<Injector> {
        self.inner
            .parent
            .clone()
            .map(|inner| Injector { inner })
    }

    /// 运行期服务
    pub fn services(&self) -> &InjectorServices {
        &self.inner.services
    }

    /// 容器配置
    pub fn config(&self) -> &ContainerConfig {
        &self.inner.services.config
    }

    /// 上下文作用域提供者
    pub fn scopes(&self) -> &Arc<ContextScopes> {
        &self.inner.services.scopes
    }

    /// 当前执行单元上最内层的活跃上下文
    pub fn current_context(&self) -> Option<Arc<ContextNode>> {
        self.scopes().current()
    }

    /// 注册绑定
    ///
    /// 同一元素重复注册时，[`RegistrationPolicy::FirstWins`] 保留先注册的绑定，
    /// [`RegistrationPolicy::Strict`] 返回 [`InjectionError::Conflict`]。
    pub fn install(&self, binding: Binding) -> InjectionResult<()> {
        let binding = Arc::new(binding);
        let strict = self.config().registration_policy == RegistrationPolicy::Strict;

        if strict {
            if let Some(element) = binding
                .elements()
                .iter()
                .find(|element| self.has_local_binding(element))
            {
                return Err(InjectionError::Conflict {
                    element: element.to_string(),
                });
            }
        }

        for element in binding.elements() {
            let entry = BindingEntry {
                binding: binding.clone(),
                owner: Arc::downgrade(&self.inner),
                inherited: false,
            };
            let raced = match self.inner.bindings.entry(element.clone()) {
                Entry::Occupied(mut occupied) if occupied.get().inherited => {
                    occupied.insert(entry);
                    false
                }
                Entry::Occupied(_) if strict => true,
                Entry::Occupied(_) => {
                    warn!(element = %element, "元素已有绑定，忽略重复注册");
                    false
                }
                Entry::Vacant(vacant) => {
                    vacant.insert(entry);
                    false
                }
            };
            if raced {
                // 预检查之后被并发注册抢先，撤销本绑定已写入的元素
                let id = binding.id();
                for written in binding.elements() {
                    self.inner
                        .bindings
                        .remove_if(written, |_, entry| entry.binding.id() == id);
                }
                return Err(InjectionError::Conflict {
                    element: element.to_string(),
                });
            }
        }

        debug!(
            element = %binding.primary_element(),
            strategy = binding.strategy().kind(),
            lifetime = ?binding.lifetime(),
            "注册绑定"
        );
        Ok(())
    }

    /// 按顺序注册绑定来源中的所有绑定，返回注册的绑定数量
    pub fn install_all(&self, source: &dyn BindingSource) -> InjectionResult<usize> {
        let bindings = source.bindings();
        let count = bindings.len();
        for binding in bindings {
            self.install(binding)?;
        }
        info!(source = source.name(), count, "注册绑定来源");
        Ok(count)
    }

    /// 查找元素的绑定，不合成隐式绑定
    pub fn binding(&self, element: &Element) -> InjectionResult<Arc<Binding>> {
        self.binding_entry(element, None)
            .map(|(binding, _)| binding)
    }

    /// 本注入器或祖先注入器中是否存在元素的绑定
    pub fn has_binding(&self, element: &Element) -> bool {
        self.lineage()
            .any(|inner| inner.bindings.get(element).is_some_and(|entry| !entry.inherited))
    }

    /// 本注入器中注册的元素（含从父注入器缓存的条目和隐式绑定）
    pub fn elements(&self) -> Vec<Element> {
        self.inner
            .bindings
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// 解析元素对应的实例
    pub fn instance(&self, element: &Element) -> InjectionResult<Instance> {
        self.resolve_instance(element, None)
    }

    /// 携带预置实例解析元素
    pub fn instance_with(&self, element: &Element, overrides: Overrides) -> InjectionResult<Instance> {
        self.resolve_with_overrides(element, overrides, None)
    }

    fn has_local_binding(&self, element: &Element) -> bool {
        self.inner
            .bindings
            .get(element)
            .is_some_and(|entry| !entry.inherited)
    }

    fn lineage(&self) -> impl Iterator<Item = &InjectorInner> {
        std::iter::successors(Some(self.inner.as_ref()), |inner| inner.parent.as_deref())
    }

    /// 查找绑定及其所属注入器
    ///
    /// 顺序：本地表、父注入器链（命中后缓存到本地）、隐式合成。
    pub(crate) fn binding_entry(
        &self,
        element: &Element,
        implicit: Option<ImplicitBinding>,
    ) -> InjectionResult<(Arc<Binding>, Injector)> {
        if let Some(entry) = self.inner.bindings.get(element).map(|entry| entry.value().clone()) {
            return Ok(self.with_owner(entry));
        }

        let inherited = self
            .lineage()
            .skip(1)
            .find_map(|inner| inner.bindings.get(element).map(|entry| entry.value().clone()));
        if let Some(entry) = inherited {
            let entry = self
                .inner
                .bindings
                .entry(element.clone())
                .or_insert_with(|| BindingEntry {
                    inherited: true,
                    ..entry
                })
                .value()
                .clone();
            return Ok(self.with_owner(entry));
        }

        match implicit {
            Some(implicit) if self.config().implicit_bindings && element.is_plain() => {
                let entry = self
                    .inner
                    .bindings
                    .entry(element.clone())
                    .or_insert_with(|| {
                        debug!(element = %element, "合成隐式绑定");
                        BindingEntry {
                            binding: Arc::new(implicit()),
                            owner: Arc::downgrade(&self.inner),
                            inherited: false,
                        }
                    })
                    .value()
                    .clone();
                Ok(self.with_owner(entry))
            }
            _ => Err(InjectionError::UnresolvedBinding {
                element: element.to_string(),
            }),
        }
    }

    fn with_owner(&self, entry: BindingEntry) -> (Arc<Binding>, Injector) {
        let owner = entry
            .owner
            .upgrade()
            .map(|inner| Injector { inner })
            .unwrap_or_else(|| self.clone());
        (entry.binding, owner)
    }
}

impl Default for Injector {
    fn default() -> Self {
        Self::new(InjectorServices::default())
    }
}

impl Resolver for Injector {
    fn resolve_instance(
        &self,
        element: &Element,
        implicit: Option<ImplicitBinding>,
    ) -> InjectionResult<Instance> {
        self.resolve_with_overrides(element, Overrides::new(), implicit)
    }

    fn resolve_with_overrides(
        &self,
        element: &Element,
        overrides: Overrides,
        implicit: Option<ImplicitBinding>,
    ) -> InjectionResult<Instance> {
        context::resolve(
            self,
            Request {
                element,
                implicit,
                overrides,
                parent: None,
            },
        )
    }

    fn path(&self) -> DependencyPath {
        self.current_context()
            .filter(|node| !node.is_obsolete())
            .map(|node| node.path())
            .unwrap_or_default()
    }

    fn source(&self) -> Arc<dyn Resolver + Send + Sync> {
        Arc::new(self.clone())
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Injector")
            .field("bindings", &self.inner.bindings.len())
            .field("has_parent", &self.inner.parent.is_some())
            .finish()
    }
}
