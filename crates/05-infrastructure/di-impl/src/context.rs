//! 注入上下文引擎
//!
//! 每一次实例请求对应一个 [`ContextNode`]。同一次顶层请求产生的所有节点组成一棵上下文树，
//! 共享一个根状态（[`RootContext`]）：树内共享的实例、待提交的单例、成员注入队列以及替身。
//!
//! 解析顺序：
//! 1. 请求路径上的预置实例
//! 2. 固定实例绑定、已缓存的单例、树内已暂存的共享实例
//! 3. 活跃路径上的循环检查（生成替身或失败）
//! 4. 深度检查，创建节点并在作用域内执行构造策略
//!
//! 根节点完成后统一执行成员注入和 `on_ready` 回调，成功时提交单例，最后把整棵树标记为过期。

use crate::injector::Injector;
use di_abstractions::{
    Binding, BindingId, ConstructionStrategy, DelegateLatch, ImplicitBinding, Overrides,
    Resolver, StandIn,
};
use infrastructure_common::{
    ContextState, DependencyPath, Element, InjectionError, InjectionResult, Instance, Lifetime,
    PathSegment, TypeInfo,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, trace, warn};
use uuid::Uuid;

/// 一棵上下文树共享的根状态
pub(crate) struct RootContext {
    id: Uuid,
    obsolete: AtomicBool,
    tree: Mutex<TreeState>,
}

#[derive(Default)]
struct TreeState {
    /// 已解析的 Scoped / Singleton 实例，按绑定共享
    shared: HashMap<BindingId, Instance>,
    /// 根完成后提交到绑定缓存的单例
    singletons: Vec<(Arc<Binding>, Instance)>,
    /// 等待成员注入的实例，先进先出
    pending_members: VecDeque<PendingMembers>,
    stand_ins: Vec<StandIn>,
}

struct PendingMembers {
    node: Arc<ContextNode>,
    injector: Injector,
    instance: Instance,
}

impl RootContext {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            obsolete: AtomicBool::new(false),
            tree: Mutex::new(TreeState::default()),
        })
    }

    fn shared_instance(&self, id: BindingId) -> Option<Instance> {
        self.tree.lock().shared.get(&id).cloned()
    }

    fn share(&self, binding: &Arc<Binding>, instance: &Instance) {
        let mut tree = self.tree.lock();
        tree.shared.insert(binding.id(), instance.clone());
        if binding.lifetime() == Lifetime::Singleton {
            tree.singletons.push((binding.clone(), instance.clone()));
        }
    }

    fn defer_members(&self, pending: PendingMembers) {
        self.tree.lock().pending_members.push_back(pending);
    }

    fn next_pending_members(&self) -> Option<PendingMembers> {
        self.tree.lock().pending_members.pop_front()
    }

    fn record_stand_in(&self, stand_in: StandIn) {
        self.tree.lock().stand_ins.push(stand_in);
    }

    fn commit_singletons(&self) {
        let singletons = std::mem::take(&mut self.tree.lock().singletons);
        for (binding, instance) in singletons {
            binding.cache_singleton(instance);
            trace!(binding = %binding.id(), "提交单例");
        }
    }

    fn unlatched_stand_ins(&self) -> Vec<TypeInfo> {
        self.tree
            .lock()
            .stand_ins
            .iter()
            .filter(|stand_in| !stand_in.delegate().is_latched())
            .map(|stand_in| stand_in.delegate().type_info())
            .collect()
    }

    fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }
}

/// 注入上下文节点
///
/// 记录一次请求的元素、选中的绑定、父节点和状态。节点只会按
/// `Pending -> Resolving -> Resolved | Failed` 单向变化。
pub struct ContextNode {
    root: Arc<RootContext>,
    parent: Option<Arc<ContextNode>>,
    element: Element,
    binding: Arc<Binding>,
    overrides: Overrides,
    depth: usize,
    slot: Mutex<NodeSlot>,
}

#[derive(Default)]
struct NodeSlot {
    state: ContextState,
    resolved: Option<Instance>,
    /// 等待本节点结果的替身委托
    waiting: Vec<Arc<dyn DelegateLatch>>,
}

impl ContextNode {
    pub(crate) fn new_root(element: Element, binding: Arc<Binding>, overrides: Overrides) -> Arc<Self> {
        Arc::new(Self {
            root: RootContext::new(),
            parent: None,
            element,
            binding,
            overrides,
            depth: 1,
            slot: Mutex::new(NodeSlot::default()),
        })
    }

    pub(crate) fn new_child(
        parent: &Arc<Self>,
        element: Element,
        binding: Arc<Binding>,
        overrides: Overrides,
    ) -> Arc<Self> {
        Arc::new(Self {
            root: parent.root.clone(),
            parent: Some(parent.clone()),
            element,
            binding,
            overrides,
            depth: parent.depth + 1,
            slot: Mutex::new(NodeSlot::default()),
        })
    }

    /// 请求的元素
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// 选中的绑定
    pub fn binding(&self) -> &Arc<Binding> {
        &self.binding
    }

    /// 当前状态
    pub fn state(&self) -> ContextState {
        self.slot.lock().state
    }

    /// 节点深度，根节点为 1
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 是否为根节点
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// 父节点
    pub fn parent(&self) -> Option<&Arc<ContextNode>> {
        self.parent.as_ref()
    }

    /// 所属上下文树的标识
    pub fn root_id(&self) -> Uuid {
        self.root.id
    }

    /// 所属上下文树是否已经完成
    pub fn is_obsolete(&self) -> bool {
        self.root.obsolete.load(Ordering::Acquire)
    }

    /// 从根到本节点的依赖路径
    pub fn path(&self) -> DependencyPath {
        let mut segments: Vec<PathSegment> = self.lineage().map(ContextNode::segment).collect();
        segments.reverse();
        segments.into_iter().collect()
    }

    fn segment(&self) -> PathSegment {
        PathSegment {
            element: self.element.clone(),
            target: self.binding.target(),
        }
    }

    /// 本节点及其所有祖先，从近到远
    fn lineage(&self) -> impl Iterator<Item = &ContextNode> {
        std::iter::successors(Some(self), |node| node.parent.as_deref())
    }

    fn find_override(&self, element: &Element) -> Option<Instance> {
        self.lineage()
            .find_map(|node| node.overrides.get(element).cloned())
    }

    /// 活跃路径上请求同一元素、同一目标的节点
    fn find_in_flight(&self, element: &Element, target: TypeInfo) -> Option<&ContextNode> {
        self.lineage()
            .find(|node| node.element == *element && node.binding.target() == target)
    }

    fn begin(&self) -> InjectionResult<()> {
        let mut slot = self.slot.lock();
        if !slot.state.can_transition_to(ContextState::Resolving) {
            return Err(InjectionError::construction(anyhow::anyhow!(
                "上下文 {} 状态为 {:?}，无法开始解析",
                self.element,
                slot.state
            )));
        }
        slot.state = ContextState::Resolving;
        Ok(())
    }

    fn complete(&self, instance: &Instance) -> Vec<Arc<dyn DelegateLatch>> {
        let mut slot = self.slot.lock();
        slot.state = ContextState::Resolved;
        slot.resolved = Some(instance.clone());
        std::mem::take(&mut slot.waiting)
    }

    fn fail(&self) {
        self.slot.lock().state = ContextState::Failed;
    }

    fn resolved(&self) -> Option<Instance> {
        self.slot.lock().resolved.clone()
    }

    /// 登记一个等待本节点结果的替身；节点已经完成时立即锁定
    fn attach_stand_in(&self, delegate: Arc<dyn DelegateLatch>) -> InjectionResult<()> {
        let mut slot = self.slot.lock();
        if let Some(instance) = slot.resolved.clone() {
            drop(slot);
            return delegate.latch(&instance);
        }
        slot.waiting.push(delegate);
        Ok(())
    }
}

impl fmt::Debug for ContextNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextNode")
            .field("root", &self.root.id)
            .field("element", &self.element)
            .field("target", &self.binding.target().name)
            .field("depth", &self.depth)
            .field("state", &self.state())
            .finish()
    }
}

/// 一次实例请求
pub(crate) struct Request<'a> {
    pub(crate) element: &'a Element,
    pub(crate) implicit: Option<ImplicitBinding>,
    pub(crate) overrides: Overrides,
    /// 显式的父上下文；为空时使用作用域中的当前上下文
    pub(crate) parent: Option<Arc<ContextNode>>,
}

/// 请求路径：父节点路径 + 本次请求
fn request_path(
    parent: Option<&Arc<ContextNode>>,
    element: &Element,
    target: TypeInfo,
) -> DependencyPath {
    let mut path = parent.map(|node| node.path()).unwrap_or_default();
    path.push(PathSegment {
        element: element.clone(),
        target,
    });
    path
}

/// 解析一次实例请求
pub(crate) fn resolve(injector: &Injector, request: Request<'_>) -> InjectionResult<Instance> {
    let Request {
        element,
        implicit,
        overrides,
        parent,
    } = request;
    let services = injector.services();
    let parent = parent
        .or_else(|| services.scopes().current())
        .filter(|node| !node.is_obsolete());

    if let Some(instance) = overrides
        .get(element)
        .cloned()
        .or_else(|| parent.as_ref().and_then(|node| node.find_override(element)))
    {
        trace!(element = %element, "使用预置实例");
        return Ok(instance);
    }

    let (binding, owner) = injector.binding_entry(element, implicit).map_err(|err| {
        err.located(request_path(parent.as_ref(), element, element.type_info()))
    })?;

    if let ConstructionStrategy::Instance(instance) = binding.strategy() {
        return Ok(instance.clone());
    }
    if binding.lifetime() == Lifetime::Singleton {
        if let Some(cached) = binding.cached_singleton() {
            return Ok(cached.clone());
        }
    }

    if let Some(parent) = &parent {
        if binding.lifetime().is_shared() {
            if let Some(shared) = parent.root.shared_instance(binding.id()) {
                return Ok(shared);
            }
        }
        if let Some(in_flight) = parent.find_in_flight(element, binding.target()) {
            return break_cycle(injector, in_flight, element)
                .map_err(|err| err.located(request_path(Some(parent), element, binding.target())));
        }
        let max_depth = services.config().max_resolution_depth;
        if parent.depth() >= max_depth {
            return Err(InjectionError::DepthExceeded { max_depth }
                .located(request_path(Some(parent), element, binding.target())));
        }
    }

    let scope = services
        .scopes()
        .enter_context_scope(parent, element.clone(), binding, overrides);
    let node = scope.node().clone();
    if node.is_root() {
        scope.execute_scoped(|| run_root(&owner, &node))
    } else {
        scope.execute_scoped(|| run_node(&owner, &node))
    }
}

/// 处理对活跃路径上节点的再次请求
fn break_cycle(
    injector: &Injector,
    in_flight: &ContextNode,
    element: &Element,
) -> InjectionResult<Instance> {
    let services = injector.services();
    match in_flight.state() {
        // 成员注入阶段：祖先已经构造完成，直接复用
        ContextState::Resolved => in_flight.resolved().ok_or_else(|| {
            InjectionError::construction(anyhow::anyhow!("上下文 {} 已完成但没有实例", element))
        }),
        ContextState::Pending | ContextState::Resolving => {
            let type_info = element.type_info();
            if !services.config().enable_cycle_breaking || !services.fabricator().can_proxy(&type_info)
            {
                return Err(InjectionError::CircularBinding {
                    type_name: type_info.short_name(),
                });
            }
            let stand_in = services.fabricator().create_stand_in(&type_info)?;
            in_flight.attach_stand_in(stand_in.delegate().clone())?;
            in_flight.root.record_stand_in(stand_in.clone());
            debug!(
                root = %in_flight.root_id(),
                element = %element,
                "检测到循环依赖，使用替身"
            );
            Ok(stand_in.proxy().clone())
        }
        ContextState::Failed => Err(InjectionError::CircularBinding {
            type_name: element.type_info().short_name(),
        }),
    }
}

/// 执行单个节点的构造策略
fn run_node(owner: &Injector, node: &Arc<ContextNode>) -> InjectionResult<Instance> {
    node.begin().map_err(|err| err.located(node.path()))?;
    let binding = node.binding().clone();
    trace!(
        root = %node.root_id(),
        depth = node.depth(),
        element = %node.element(),
        strategy = binding.strategy().kind(),
        "开始构造"
    );

    let context = ResolutionContext::new(owner.clone(), node.clone());
    let instance = match binding.strategy().construct(&context) {
        Ok(instance) => instance,
        Err(err) => {
            node.fail();
            debug!(element = %node.element(), error = %err, "构造失败");
            return Err(err.located(node.path()));
        }
    };

    for delegate in node.complete(&instance) {
        delegate.latch(&instance).map_err(|err| err.located(node.path()))?;
        trace!(element = %node.element(), "替身已锁定");
    }
    if binding.lifetime().is_shared() {
        node.root.share(&binding, &instance);
    }
    let members = owner.services().members();
    if binding.strategy().needs_member_injection() && members.handles(&instance.type_info()) {
        node.root.defer_members(PendingMembers {
            node: node.clone(),
            injector: owner.clone(),
            instance: instance.clone(),
        });
    }
    Ok(instance)
}

/// 执行根节点，完成后收尾整棵上下文树
fn run_root(owner: &Injector, node: &Arc<ContextNode>) -> InjectionResult<Instance> {
    let started = Instant::now();
    debug!(root = %node.root_id(), element = %node.element(), "开始根上下文解析");

    let result = run_node(owner, node).and_then(|instance| {
        finalize(owner, node)?;
        Ok(instance)
    });
    node.root.mark_obsolete();

    match result {
        Ok(instance) => {
            node.root.commit_singletons();
            let instance = canonical_singleton(node.binding(), instance);
            debug!(
                root = %node.root_id(),
                element = %node.element(),
                elapsed_us = started.elapsed().as_micros() as u64,
                "根上下文解析完成"
            );
            Ok(instance)
        }
        Err(err) => {
            error!(root = %node.root_id(), element = %node.element(), error = %err, "根上下文解析失败");
            Err(err)
        }
    }
}

/// 单例根节点返回绑定上缓存的实例
///
/// 并发的根上下文可能各自构造了同一个单例，只有先提交的那个被缓存。
fn canonical_singleton(binding: &Arc<Binding>, instance: Instance) -> Instance {
    if binding.lifetime() != Lifetime::Singleton {
        return instance;
    }
    match binding.cached_singleton() {
        Some(cached) if !cached.ptr_eq(&instance) => {
            debug!(binding = %binding.id(), "并发构造的单例未被采用，返回已缓存的实例");
            cached.clone()
        }
        _ => instance,
    }
}

/// 成员注入阶段：按入队顺序注入，直到队列清空；然后依次调用 `on_ready`
fn finalize(owner: &Injector, root: &Arc<ContextNode>) -> InjectionResult<()> {
    let services = owner.services();
    let mut ready = Vec::new();

    while let Some(PendingMembers {
        node,
        injector,
        instance,
    }) = root.root.next_pending_members()
    {
        let context = ResolutionContext::new(injector, node.clone());
        services
            .scopes()
            .execute_within(node.clone(), || {
                services.members().inject_members(&instance, &context)
            })
            .map_err(|err| err.located(node.path()))?;
        ready.push((node, instance));
    }

    for (node, instance) in &ready {
        services
            .members()
            .on_ready(instance)
            .map_err(|err| err.located(node.path()))?;
    }
    if !ready.is_empty() {
        trace!(root = %root.root_id(), count = ready.len(), "成员注入完成");
    }

    for type_info in root.root.unlatched_stand_ins() {
        warn!(root = %root.root_id(), contract = %type_info, "替身在上下文树完成时仍未锁定");
    }
    Ok(())
}

/// 构造策略看到的解析器：以当前节点为父节点发起子请求
pub(crate) struct ResolutionContext {
    injector: Injector,
    node: Arc<ContextNode>,
}

impl ResolutionContext {
    fn new(injector: Injector, node: Arc<ContextNode>) -> Self {
        Self { injector, node }
    }
}

impl Resolver for ResolutionContext {
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
        resolve(
            &self.injector,
            Request {
                element,
                implicit,
                overrides,
                parent: Some(self.node.clone()),
            },
        )
    }

    fn path(&self) -> DependencyPath {
        self.node.path()
    }

    fn source(&self) -> Arc<dyn Resolver + Send + Sync> {
        Arc::new(self.injector.clone())
    }
}
