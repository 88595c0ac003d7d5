//! 指标声明注册与校验。
//!
//! # 契约说明（What）
//! - [`MetricRegistryBuilder`] 在初始化阶段接收 Schema 注册与指标声明；
//! - [`MetricRegistryBuilder::build`] 对全部声明执行一次穷尽校验：解析 Schema 引用、逐层比对标签值结构体形状、
//!   检查指标名称唯一；任何发现都会汇总进 [`ValidationReport`] 并阻止注册表产出；
//! - 校验通过后得到不可变的 [`MetricRegistry`]，通过 [`Declared`] 句柄换取类型化的 [`Metric`]；
//! - [`install_global`] 提供进程级的单次安装槽位，安装后不再卸载。
//!
//! # 执行逻辑（How）
//! 1. Schema 标识去重，重复注册记为 Schema 级发现；
//! 2. 逐条声明：`Declared → Validating`，收集该声明的全部发现后转为 `Valid` 或 `Invalid`；
//! 3. 报告为空时创建缓冲池，并为每个被使用的宽度预热缓冲。

mod metric;

pub use metric::{DeclarationState, Metric};

use std::{
    borrow::Cow,
    collections::{BTreeSet, HashMap, HashSet},
    marker::PhantomData,
    sync::{
        Arc, OnceLock,
        atomic::{AtomicU64, Ordering},
    },
};

use metric::MetricCell;

use crate::{
    binder::{LabelShape, LabelValues, check_field_names, validate_shape},
    config::LabelPoolConfig,
    error::{FindingKind, LabelError, ValidationFinding, ValidationReport},
    pool::LabelBufferPool,
    recorder::MetricDescriptor,
    schema::LabelSchema,
};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);
static GLOBAL_REGISTRY: OnceLock<MetricRegistry> = OnceLock::new();

/// 由构建器签发的声明句柄，校验通过后用于换取 [`Metric`]。
pub struct Declared<L> {
    registry: u64,
    index: usize,
    name: &'static str,
    _marker: PhantomData<fn(&L)>,
}

impl<L> Declared<L> {
    /// 声明的指标名称。
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<L> Clone for Declared<L> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<L> Copy for Declared<L> {}

impl<L> core::fmt::Debug for Declared<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Declared")
            .field("name", &self.name)
            .field("labels", &core::any::type_name::<L>())
            .finish()
    }
}

struct PendingDeclaration {
    descriptor: MetricDescriptor,
    shape: LabelShape,
    state: DeclarationState,
}

/// 初始化阶段的声明注册表。
///
/// ```rust
/// use spark_labels::{LabelSchema, LabelValues, MetricDescriptor, MetricRegistryBuilder};
/// use spark_labels::test_stubs::CapturingRecorder;
///
/// #[derive(LabelValues)]
/// struct RouteLabels {
///     route: String,
/// }
///
/// let mut builder = MetricRegistryBuilder::new();
/// builder.register_schema("route", LabelSchema::root(["Route"]).unwrap());
/// let hits = builder.declare::<RouteLabels>(MetricDescriptor::new("RouteHits", "route"));
/// let registry = builder.build().unwrap();
///
/// let recorder = CapturingRecorder::default();
/// let hits = registry.metric(&hits).unwrap();
/// hits.record(&recorder, 1_u64, &RouteLabels { route: "/health".into() });
/// assert_eq!(recorder.samples()[0].labels, [("Route".to_string(), "/health".to_string())]);
/// ```
pub struct MetricRegistryBuilder {
    id: u64,
    schemas: Vec<(&'static str, Arc<LabelSchema>)>,
    declarations: Vec<PendingDeclaration>,
    pool_config: LabelPoolConfig,
    field_names: bool,
}

impl MetricRegistryBuilder {
    /// 创建空的构建器，缓冲池使用默认配置。
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            schemas: Vec::new(),
            declarations: Vec::new(),
            pool_config: LabelPoolConfig::default(),
            field_names: false,
        }
    }

    /// 替换缓冲池配置；配置非法时返回 [`LabelError::InvalidConfig`] 且保持原配置。
    pub fn with_pool_config(&mut self, config: LabelPoolConfig) -> Result<&mut Self, LabelError> {
        config.validate()?;
        self.pool_config = config;
        Ok(self)
    }

    /// 开启后，[`build`](Self::build) 额外以 [`check_field_names`] 比对未显式命名字段的字段名。
    pub fn check_field_names(&mut self, enabled: bool) -> &mut Self {
        self.field_names = enabled;
        self
    }

    /// 以标识 `id` 注册 Schema；重复标识在 [`build`](Self::build) 时报告。
    pub fn register_schema(&mut self, id: &'static str, schema: Arc<LabelSchema>) -> &mut Self {
        self.schemas.push((id, schema));
        self
    }

    /// 声明一个以 `L` 作为标签值结构体的指标。
    pub fn declare<L: LabelValues>(&mut self, descriptor: MetricDescriptor) -> Declared<L> {
        let index = self.declarations.len();
        self.declarations.push(PendingDeclaration {
            descriptor,
            shape: LabelShape::of::<L>(),
            state: DeclarationState::Declared,
        });
        Declared {
            registry: self.id,
            index,
            name: descriptor.name,
            _marker: PhantomData,
        }
    }

    /// 查询声明状态；构建前所有声明均为 `Declared`。
    pub fn state(&self, name: &str) -> Option<DeclarationState> {
        self.declarations
            .iter()
            .find(|pending| pending.descriptor.name == name)
            .map(|pending| pending.state)
    }

    /// 已声明的指标数量。
    pub fn declared(&self) -> usize {
        self.declarations.len()
    }

    /// 穷尽校验全部声明并构建注册表。
    ///
    /// # 契约说明（What）
    /// - 所有声明都会被校验，返回的 [`ValidationReport`] 包含每一条发现；
    /// - 同名指标中首个声明保留，其后的声明记为 [`FindingKind::DuplicateMetricName`]；
    /// - 成功时每个声明均处于 `Valid`，缓冲池已按配置预热。
    pub fn build(mut self) -> Result<MetricRegistry, ValidationReport> {
        let mut findings = Vec::new();

        let mut schemas: HashMap<&'static str, Arc<LabelSchema>> = HashMap::new();
        for (id, schema) in self.schemas.drain(..) {
            if schemas.contains_key(id) {
                findings.push(ValidationFinding {
                    subject: Cow::Borrowed(id),
                    kind: FindingKind::DuplicateSchemaId,
                });
                continue;
            }
            schemas.insert(id, schema);
        }

        let field_names = self.field_names;
        let mut seen_names = HashSet::new();
        for pending in &mut self.declarations {
            pending.state = DeclarationState::Validating;
            let before = findings.len();
            let descriptor = pending.descriptor;
            let mut report = |kind: FindingKind| {
                findings.push(ValidationFinding {
                    subject: Cow::Borrowed(descriptor.name),
                    kind,
                })
            };

            if descriptor.name.is_empty() {
                report(FindingKind::EmptyMetricName);
            } else if !seen_names.insert(descriptor.name) {
                report(FindingKind::DuplicateMetricName);
            }
            match schemas.get(descriptor.schema) {
                None => report(FindingKind::UnknownSchema {
                    schema: descriptor.schema,
                }),
                Some(schema) => {
                    let checked = validate_shape(schema, &pending.shape).and_then(|()| {
                        if field_names {
                            check_field_names(schema, &pending.shape)
                        } else {
                            Ok(())
                        }
                    });
                    if let Err(mismatch) = checked {
                        report(FindingKind::Shape(mismatch));
                    }
                }
            }

            pending.state = if findings.len() == before {
                DeclarationState::Valid
            } else {
                DeclarationState::Invalid
            };
            for finding in &findings[before..] {
                tracing::error!(
                    metric = descriptor.name,
                    labels = pending.shape.type_name(),
                    detail = %finding.kind,
                    "invalid metric declaration"
                );
            }
        }

        if !findings.is_empty() {
            let states = self
                .declarations
                .iter()
                .map(|pending| (pending.descriptor.name, pending.state))
                .collect();
            return Err(ValidationReport::new(findings, states));
        }

        let pool = Arc::new(LabelBufferPool::new(&self.pool_config));
        let mut by_name = HashMap::with_capacity(self.declarations.len());
        let mut widths = BTreeSet::new();
        let mut metrics = Vec::with_capacity(self.declarations.len());
        for (index, pending) in self.declarations.iter().enumerate() {
            // 校验已确认 Schema 存在。
            let Some(schema) = schemas.get(pending.descriptor.schema) else {
                continue;
            };
            widths.insert(schema.width());
            by_name.insert(pending.descriptor.name, index);
            metrics.push(Arc::new(MetricCell::new(
                pending.descriptor,
                Arc::clone(schema),
            )));
        }
        if self.pool_config.prewarm_per_width > 0 {
            for width in &widths {
                pool.prewarm(*width, self.pool_config.prewarm_per_width);
            }
        }

        tracing::debug!(
            registry = self.id,
            metrics = metrics.len(),
            schemas = schemas.len(),
            widths = widths.len(),
            "metric registry built"
        );

        Ok(MetricRegistry {
            id: self.id,
            metrics: metrics.into_boxed_slice(),
            by_name,
            schemas,
            pool,
        })
    }
}

impl Default for MetricRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// 校验通过、不可变的指标注册表。
///
/// # 契约说明（What）
/// - 所有 Schema 与指标在构建后只读，可被任意线程并发读取；
/// - [`metric`](Self::metric) 只接受同一构建器签发的 [`Declared`] 句柄。
pub struct MetricRegistry {
    id: u64,
    metrics: Box<[Arc<MetricCell>]>,
    by_name: HashMap<&'static str, usize>,
    schemas: HashMap<&'static str, Arc<LabelSchema>>,
    pool: Arc<LabelBufferPool>,
}

impl MetricRegistry {
    /// 以声明句柄换取类型化的记录句柄。
    pub fn metric<L: LabelValues>(&self, declared: &Declared<L>) -> Result<Metric<L>, LabelError> {
        let cell = self
            .metrics
            .get(declared.index)
            .filter(|_| declared.registry == self.id)
            .ok_or(LabelError::ForeignDeclaration {
                metric: declared.name,
            })?;
        Ok(Metric::new(Arc::clone(cell), Arc::clone(&self.pool)))
    }

    /// 查询指标状态：`Valid` 或 `Active`；未声明时返回 `None`。
    pub fn state(&self, name: &str) -> Option<DeclarationState> {
        self.by_name
            .get(name)
            .and_then(|index| self.metrics.get(*index))
            .map(|cell| cell.state())
    }

    /// 按标识查找 Schema。
    pub fn schema(&self, id: &str) -> Option<&Arc<LabelSchema>> {
        self.schemas.get(id)
    }

    /// 按声明顺序遍历指标元数据。
    pub fn descriptors(&self) -> impl Iterator<Item = &MetricDescriptor> + '_ {
        self.metrics.iter().map(|cell| &cell.descriptor)
    }

    /// 指标数量。
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// 是否没有任何指标。
    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// 共享的标签值缓冲池。
    pub fn pool(&self) -> &Arc<LabelBufferPool> {
        &self.pool
    }
}

impl core::fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("id", &self.id)
            .field("metrics", &self.metrics.len())
            .field("schemas", &self.schemas.len())
            .finish()
    }
}

/// 将注册表安装为进程级单例，安装后在进程生命周期内有效。
///
/// 重复安装返回 [`LabelError::GlobalAlreadyInstalled`]，已安装的注册表保持不变。
pub fn install_global(registry: MetricRegistry) -> Result<&'static MetricRegistry, LabelError> {
    let mut installed = false;
    let current = GLOBAL_REGISTRY.get_or_init(|| {
        installed = true;
        registry
    });
    if !installed {
        return Err(LabelError::GlobalAlreadyInstalled);
    }
    tracing::info!(metrics = current.len(), "global metric registry installed");
    Ok(current)
}

/// 已安装的进程级注册表。
pub fn global() -> Option<&'static MetricRegistry> {
    GLOBAL_REGISTRY.get()
}
