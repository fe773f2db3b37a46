//! 端到端集成测试：一个订单服务的完整对象图

use di_impl::prelude::*;
use infrastructure_composition::InjectorBuilder;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// 领域组件
// ---------------------------------------------------------------------------

trait OrderRepository: Send + Sync {
    fn save(&self, id: u64, item: &str);
    fn find(&self, id: u64) -> Option<String>;
}

#[derive(Default)]
struct InMemoryOrders {
    rows: Mutex<HashMap<u64, String>>,
}

impl Injectable for InMemoryOrders {
    fn construct(_resolver: &dyn Resolver) -> InjectionResult<Self> {
        Ok(Self::default())
    }
}

impl OrderRepository for InMemoryOrders {
    fn save(&self, id: u64, item: &str) {
        self.rows.lock().insert(id, item.to_string());
    }

    fn find(&self, id: u64) -> Option<String> {
        self.rows.lock().get(&id).cloned()
    }
}

/// 审计日志和告警服务互相依赖
trait AuditLog: Send + Sync {
    fn record(&self, entry: String) -> InjectionResult<()>;
    fn entries(&self) -> InjectionResult<Vec<String>>;
    fn alert(&self, message: &str) -> InjectionResult<()>;
}

struct AuditService {
    alerts: Arc<dyn Alerts>,
    entries: Mutex<Vec<String>>,
}

impl Injectable for AuditService {
    fn construct(resolver: &dyn Resolver) -> InjectionResult<Self> {
        Ok(Self {
            alerts: resolver.get::<dyn Alerts>()?,
            entries: Mutex::new(Vec::new()),
        })
    }
}

impl AuditLog for AuditService {
    fn record(&self, entry: String) -> InjectionResult<()> {
        self.entries.lock().push(entry);
        Ok(())
    }

    fn entries(&self) -> InjectionResult<Vec<String>> {
        Ok(self.entries.lock().clone())
    }

    fn alert(&self, message: &str) -> InjectionResult<()> {
        self.alerts.raise(message)
    }
}

struct AuditProxy(Arc<DelegateCell<dyn AuditLog>>);

impl AuditLog for AuditProxy {
    fn record(&self, entry: String) -> InjectionResult<()> {
        self.0.get()?.record(entry)
    }

    fn entries(&self) -> InjectionResult<Vec<String>> {
        self.0.get()?.entries()
    }

    fn alert(&self, message: &str) -> InjectionResult<()> {
        self.0.get()?.alert(message)
    }
}

trait Alerts: Send + Sync {
    fn raise(&self, message: &str) -> InjectionResult<()>;
}

/// 告警同时写入审计日志
struct Alerter {
    audit: Arc<dyn AuditLog>,
    raised: Mutex<usize>,
}

impl Injectable for Alerter {
    fn construct(resolver: &dyn Resolver) -> InjectionResult<Self> {
        Ok(Self {
            audit: resolver.get::<dyn AuditLog>()?,
            raised: Mutex::new(0),
        })
    }
}

impl Alerts for Alerter {
    fn raise(&self, message: &str) -> InjectionResult<()> {
        *self.raised.lock() += 1;
        self.audit.record(format!("alert:{}", message))
    }
}

struct OrderService {
    tenant: Arc<String>,
    repository: Arc<dyn OrderRepository>,
    audit: Arc<dyn AuditLog>,
    notifier: MemberSlot<Notifier>,
}

impl Injectable for OrderService {
    fn construct(resolver: &dyn Resolver) -> InjectionResult<Self> {
        Ok(Self {
            tenant: resolver.get_named::<String>("tenant")?,
            repository: resolver.get::<dyn OrderRepository>()?,
            audit: resolver.get::<dyn AuditLog>()?,
            notifier: MemberSlot::new(),
        })
    }
}

impl OrderService {
    fn place(&self, id: u64, item: &str) -> InjectionResult<()> {
        self.repository.save(id, item);
        self.audit.record(format!("{}:{}", self.tenant, id))?;
        self.notifier.get()?.notify(id);
        Ok(())
    }
}

/// 通过字段注入拿到订单服务，形成字段循环
#[derive(Default)]
struct Notifier {
    orders: MemberSlot<OrderService>,
    sent: Mutex<Vec<u64>>,
}

impl Injectable for Notifier {
    fn construct(_resolver: &dyn Resolver) -> InjectionResult<Self> {
        Ok(Self::default())
    }
}

impl Notifier {
    fn notify(&self, id: u64) {
        self.sent.lock().push(id);
    }
}

/// 应用模块
struct OrdersModule;

impl BindingSource for OrdersModule {
    fn bindings(&self) -> Vec<Binding> {
        vec![
            Binding::linked::<dyn OrderRepository, InMemoryOrders, _>(|orders| {
                orders as Arc<dyn OrderRepository>
            })
            .singleton(),
            Binding::linked::<dyn AuditLog, AuditService, _>(|audit| audit as Arc<dyn AuditLog>),
            Binding::linked::<dyn Alerts, Alerter, _>(|alerts| alerts as Arc<dyn Alerts>),
            Binding::value("default".to_string()).named("tenant"),
        ]
    }

    fn name(&self) -> &str {
        "orders"
    }
}

fn members() -> MemberInjectorRegistry {
    let members = MemberInjectorRegistry::new();
    members
        .register_members::<OrderService, _>(|service, resolver| {
            service.notifier.inject(resolver.provide::<Notifier>()?)
        })
        .register_members::<Notifier, _>(|notifier, resolver| {
            notifier.orders.inject(resolver.provide::<OrderService>()?)
        });
    members
}

fn application(config: ContainerConfig) -> Injector {
    InjectorBuilder::new()
        .with_config(config)
        .add_source(OrdersModule)
        .with_proxy_fabricator(
            StandInRegistry::new()
                .with::<dyn AuditLog, _>(|cell| Arc::new(AuditProxy(cell)) as Arc<dyn AuditLog>),
        )
        .with_member_injector(members())
        .build()
        .unwrap()
}

// ---------------------------------------------------------------------------
// 测试
// ---------------------------------------------------------------------------

#[test]
fn test_full_graph_is_wired() {
    let injector = application(ContainerConfig::default());

    let orders = injector.provide::<OrderService>().unwrap();
    orders.place(1, "book").unwrap();

    assert_eq!(orders.repository.find(1).as_deref(), Some("book"));
    // 告警经由替身写回真实的审计日志
    orders.audit.alert("late").unwrap();
    assert_eq!(
        orders.audit.entries().unwrap(),
        vec!["default:1".to_string(), "alert:late".to_string()]
    );

    // 字段循环指回根实例
    let notifier = orders.notifier.get().unwrap();
    assert!(Arc::ptr_eq(notifier.orders.get().unwrap(), &orders));
    assert_eq!(*notifier.sent.lock(), vec![1]);
}

#[test]
fn test_singleton_repository_outlives_requests() {
    let injector = application(ContainerConfig::default());

    injector
        .provide::<OrderService>()
        .unwrap()
        .place(7, "lamp")
        .unwrap();
    let later = injector.provide::<OrderService>().unwrap();

    assert_eq!(later.repository.find(7).as_deref(), Some("lamp"));
}

#[test]
fn test_per_request_child_injectors() {
    let injector = application(ContainerConfig::default());
    let shared = injector.get::<dyn OrderRepository>().unwrap();

    for tenant in ["acme", "globex"] {
        let request = injector.child();
        request
            .install(Binding::value(tenant.to_string()).named("tenant"))
            .unwrap();

        let orders = request.provide::<OrderService>().unwrap();
        assert_eq!(orders.tenant.as_str(), tenant);
        orders.place(tenant.len() as u64, tenant).unwrap();
    }

    // 父注入器不受子注入器影响，单例仓储在父注入器中共享
    assert_eq!(
        injector.get_named::<String>("tenant").unwrap().as_str(),
        "default"
    );
    assert_eq!(shared.find(4).as_deref(), Some("acme"));
    assert_eq!(shared.find(6).as_deref(), Some("globex"));
}

#[test]
fn test_missing_dependency_reports_path_across_module() {
    let injector = InjectorBuilder::new()
        .add_source(|| {
            vec![Binding::linked::<dyn AuditLog, AuditService, _>(|audit| {
                audit as Arc<dyn AuditLog>
            })]
        })
        .build()
        .unwrap();

    let err = injector.provide::<OrderService>().err().unwrap();

    assert!(matches!(err.kind(), InjectionError::UnresolvedBinding { .. }));
    assert_eq!(
        err.path().unwrap().to_string(),
        "OrderService -> String[name=tenant]"
    );
}

#[test]
fn test_cycle_without_proxy_support_fails_cleanly() {
    let injector = InjectorBuilder::new()
        .add_source(OrdersModule)
        .build()
        .unwrap();

    let err = injector.provide::<OrderService>().err().unwrap();

    assert!(matches!(err.kind(), InjectionError::CircularBinding { .. }));
    let repository = injector
        .binding(&Element::of::<dyn OrderRepository>())
        .unwrap();
    assert!(repository.cached_singleton().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_under_task_scope() {
    let injector = application(ContainerConfig::default().with_scope_strategy(ScopeStrategy::Task));
    // 并发根上下文各自构造的单例只有先提交的那个生效，先把仓储解析出来
    let repository = injector.get::<dyn OrderRepository>().unwrap();

    let requests: Vec<_> = (0..16_u64)
        .map(|id| {
            let injector = injector.clone();
            tokio::spawn(async move {
                let scopes = injector.scopes().clone();
                scopes
                    .scope_task(async {
                        let request = injector.child();
                        request.install(Binding::value(format!("tenant-{}", id % 2)).named("tenant"))?;
                        tokio::task::yield_now().await;
                        let orders = request.provide::<OrderService>()?;
                        orders.place(id, "item")?;
                        orders.audit.entries()
                    })
                    .await
            })
        })
        .collect();

    for (id, request) in requests.into_iter().enumerate() {
        let entries = request.await.unwrap().unwrap();
        assert_eq!(entries, vec![format!("tenant-{}:{}", id % 2, id)]);
    }

    assert!((0..16).all(|id| repository.find(id).is_some()));
}
