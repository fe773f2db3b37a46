//! 元数据定义
//!
//! 提供类型、限定符、注入元素（Element）以及类型擦除实例的元数据信息

use crate::errors::{InjectionError, InjectionResult};
use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// 类型信息
///
/// 相等性与哈希只比较 [`TypeId`]，名称仅用于诊断输出。
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    /// 完整类型名称（含模块路径）
    pub name: &'static str,
    /// 类型ID
    pub id: TypeId,
}

impl TypeInfo {
    /// 从类型获取类型信息，支持 `dyn Trait` 等非 Sized 类型
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            id: TypeId::of::<T>(),
        }
    }

    /// 获取简短的类型名称（去掉每一段的模块路径）
    ///
    /// `alloc::sync::Arc<dyn app::Greeter>` 会输出 `Arc<dyn Greeter>`。
    pub fn short_name(&self) -> String {
        let mut out = String::with_capacity(self.name.len());
        let mut segment = String::new();
        for ch in self.name.chars() {
            if ch.is_alphanumeric() || ch == '_' || ch == ':' {
                segment.push(ch);
            } else {
                out.push_str(last_path_segment(&segment));
                segment.clear();
                out.push(ch);
            }
        }
        out.push_str(last_path_segment(&segment));
        out
    }
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for TypeInfo {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeInfo {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

/// 限定符标记
///
/// 对应注解式容器中的 qualifier，既可以是一个标记类型，也可以是一个字符串标签。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Qualifier {
    /// 以标记类型作为限定符
    Marker(TypeInfo),
    /// 以字符串标签作为限定符
    Tag(Cow<'static, str>),
}

impl Qualifier {
    /// 使用标记类型创建限定符
    pub fn marker<M: ?Sized + 'static>() -> Self {
        Self::Marker(TypeInfo::of::<M>())
    }

    /// 使用字符串标签创建限定符
    pub fn tag(tag: impl Into<Cow<'static, str>>) -> Self {
        Self::Tag(tag.into())
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marker(type_info) => write!(f, "@{}", type_info),
            Self::Tag(tag) => write!(f, "@{}", tag),
        }
    }
}

/// 注入元素
///
/// 类型 + 可选名称 + 无序限定符集合，作为绑定查找和解析节点的结构化键。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Element {
    type_info: TypeInfo,
    name: Option<String>,
    qualifiers: BTreeSet<Qualifier>,
}

impl Element {
    /// 创建只包含类型的元素
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self::from_type_info(TypeInfo::of::<T>())
    }

    /// 使用已有的类型信息创建元素
    pub fn from_type_info(type_info: TypeInfo) -> Self {
        Self {
            type_info,
            name: None,
            qualifiers: BTreeSet::new(),
        }
    }

    /// 创建带名称的元素
    pub fn named<T: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::of::<T>().with_name(name)
    }

    /// 设置名称
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 添加限定符
    pub fn with_qualifier(mut self, qualifier: Qualifier) -> Self {
        self.qualifiers.insert(qualifier);
        self
    }

    /// 元素类型
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// 元素名称
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// 限定符集合
    pub fn qualifiers(&self) -> &BTreeSet<Qualifier> {
        &self.qualifiers
    }

    /// 是否为无名称、无限定符的纯类型元素
    pub fn is_plain(&self) -> bool {
        self.name.is_none() && self.qualifiers.is_empty()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for qualifier in &self.qualifiers {
            write!(f, "{} ", qualifier)?;
        }
        write!(f, "{}", self.type_info)?;
        if let Some(name) = &self.name {
            write!(f, "[name={}]", name)?;
        }
        Ok(())
    }
}

/// 类型擦除的组件实例
///
/// 内部保存的是 `Arc<T>` 本身，因此 `T` 可以是 `dyn Trait`。克隆只增加引用计数。
#[derive(Clone)]
pub struct Instance {
    value: Arc<dyn Any + Send + Sync>,
    type_info: TypeInfo,
}

impl Instance {
    /// 包装一个共享实例
    pub fn new<T: ?Sized + Send + Sync + 'static>(value: Arc<T>) -> Self {
        Self {
            value: Arc::new(value),
            type_info: TypeInfo::of::<T>(),
        }
    }

    /// 实例的声明类型
    pub fn type_info(&self) -> TypeInfo {
        self.type_info
    }

    /// 还原为具体类型
    pub fn downcast<T: ?Sized + Send + Sync + 'static>(&self) -> InjectionResult<Arc<T>> {
        self.value
            .downcast_ref::<Arc<T>>()
            .cloned()
            .ok_or_else(|| InjectionError::TypeMismatch {
                expected: TypeInfo::of::<T>().short_name(),
                actual: self.type_info.short_name(),
            })
    }

    /// 两个句柄是否指向同一个实例
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }

    /// 是否为指定类型
    pub fn is<T: ?Sized + Send + Sync + 'static>(&self) -> bool {
        self.value.is::<Arc<T>>()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.type_info.name)
            .finish()
    }
}

/// 依赖路径中的一段：请求的元素以及负责构造它的目标类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// 被请求的元素
    pub element: Element,
    /// 绑定实际构造的类型
    pub target: TypeInfo,
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.element.type_info() == self.target {
            write!(f, "{}", self.element)
        } else {
            write!(f, "{}({})", self.element, self.target)
        }
    }
}

/// 依赖路径：从根请求到出错请求的完整链路
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyPath {
    segments: Vec<PathSegment>,
}

impl DependencyPath {
    /// 创建空路径
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一段
    pub fn push(&mut self, segment: PathSegment) {
        self.segments.push(segment);
    }

    /// 所有路径段（根在前）
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// 路径长度
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// 路径中依次出现的目标类型
    pub fn targets(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.segments.iter().map(|segment| segment.target)
    }
}

impl FromIterator<PathSegment> for DependencyPath {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for DependencyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("<empty>");
        }
        for (index, segment) in self.segments.iter().enumerate() {
            if index > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    trait Greeter: Send + Sync {}
    struct Primary;

    fn hash_of(element: &Element) -> u64 {
        let mut hasher = DefaultHasher::new();
        element.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_element_equality_ignores_qualifier_order() {
        let left = Element::of::<String>()
            .with_qualifier(Qualifier::tag("a"))
            .with_qualifier(Qualifier::marker::<Primary>());
        let right = Element::of::<String>()
            .with_qualifier(Qualifier::marker::<Primary>())
            .with_qualifier(Qualifier::tag("a"));

        assert_eq!(left, right);
        assert_eq!(hash_of(&left), hash_of(&right));
        assert_ne!(left, Element::of::<String>());
    }

    #[test]
    fn test_element_name_is_part_of_key() {
        assert_ne!(Element::named::<String>("A"), Element::named::<String>("B"));
        assert_eq!(Element::named::<String>("A"), Element::of::<String>().with_name("A"));
        assert!(!Element::named::<String>("A").is_plain());
    }

    #[test]
    fn test_short_name_strips_module_paths() {
        let info = TypeInfo::of::<Arc<dyn Greeter>>();
        assert_eq!(info.short_name(), "Arc<dyn Greeter>");
        assert_eq!(TypeInfo::of::<String>().short_name(), "String");
    }

    #[test]
    fn test_instance_downcast_supports_trait_objects() {
        struct English;
        impl Greeter for English {}

        let greeter: Arc<dyn Greeter> = Arc::new(English);
        let instance = Instance::new(greeter.clone());

        assert!(instance.is::<dyn Greeter>());
        let restored = instance.downcast::<dyn Greeter>().unwrap();
        assert!(Arc::ptr_eq(&restored, &greeter));

        let err = instance.downcast::<String>().unwrap_err();
        assert!(matches!(err, InjectionError::TypeMismatch { .. }));
    }

    #[test]
    fn test_instance_identity_follows_clones() {
        let shared = Instance::new(Arc::new(3_u8));
        let other = Instance::new(Arc::new(3_u8));

        assert!(shared.ptr_eq(&shared.clone()));
        assert!(!shared.ptr_eq(&other));
    }

    #[test]
    fn test_dependency_path_display() {
        let path: DependencyPath = vec![
            PathSegment {
                element: Element::of::<String>(),
                target: TypeInfo::of::<String>(),
            },
            PathSegment {
                element: Element::named::<u32>("port"),
                target: TypeInfo::of::<u32>(),
            },
        ]
        .into_iter()
        .collect();

        assert_eq!(path.to_string(), "String -> u32[name=port]");
        assert_eq!(path.len(), 2);
    }
}
