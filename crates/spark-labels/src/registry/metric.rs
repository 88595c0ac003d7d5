//! 指标声明状态与类型化记录句柄。
//!
//! # 契约说明（What）
//! - [`DeclarationState`]：声明从登记到首次记录的生命周期；
//! - [`Metric`]：校验通过后的记录入口，每次记录租借一块与 Schema 等宽的缓冲并同步调用落点。

use std::{
    marker::PhantomData,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    binder::{LabelValues, LabelWriter},
    error::LabelError,
    pool::LabelBufferPool,
    recorder::{MetricDescriptor, MetricRecorder, MetricValue},
    schema::LabelSchema,
};

/// 指标声明的生命周期状态。
///
/// `Declared → Validating → {Valid, Invalid}`；`Invalid` 为终态且阻止注册表产出，
/// 可通过 [`ValidationReport::state`](crate::ValidationReport::state) 查询；
/// `Valid` 在首次成功记录后转为 `Active`（仅作观测用途）。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeclarationState {
    Declared,
    Validating,
    Valid,
    Invalid,
    Active,
}

/// 校验通过的指标：名称、Schema 与激活标记。
#[derive(Debug)]
pub(crate) struct MetricCell {
    pub(crate) descriptor: MetricDescriptor,
    pub(crate) schema: Arc<LabelSchema>,
    active: AtomicBool,
}

impl MetricCell {
    pub(crate) fn new(descriptor: MetricDescriptor, schema: Arc<LabelSchema>) -> Self {
        Self {
            descriptor,
            schema,
            active: AtomicBool::new(false),
        }
    }

    pub(crate) fn state(&self) -> DeclarationState {
        if self.active.load(Ordering::Relaxed) {
            DeclarationState::Active
        } else {
            DeclarationState::Valid
        }
    }

    fn mark_active(&self) {
        if !self.active.load(Ordering::Relaxed) {
            self.active.store(true, Ordering::Relaxed);
        }
    }
}

/// 类型化的指标记录句柄，相当于为该指标生成的记录函数。
///
/// # 契约说明（What）
/// - 句柄只能从校验通过的 [`MetricRegistry`](crate::MetricRegistry) 获取，因此标签值结构体 `L`
///   的形状已与 Schema 对齐，记录时不再做结构检查；
/// - 每次记录：从缓冲池租借与 Schema 等宽的缓冲 → 祖先优先写入标签值 → 同步调用
///   [`MetricRecorder::record`] → 返回后归还缓冲；
/// - 句柄可廉价克隆并跨线程共享，并发记录各自独占缓冲。
pub struct Metric<L> {
    cell: Arc<MetricCell>,
    pool: Arc<LabelBufferPool>,
    _marker: PhantomData<fn(&L)>,
}

impl<L: LabelValues> Metric<L> {
    pub(crate) fn new(cell: Arc<MetricCell>, pool: Arc<LabelBufferPool>) -> Self {
        Self {
            cell,
            pool,
            _marker: PhantomData,
        }
    }

    /// 记录一次指标值。
    ///
    /// 标签数量不一致属于绑定实现缺陷：该样本被丢弃、不会调用落点，并输出 `error` 级日志。
    pub fn record(
        &self,
        recorder: &dyn MetricRecorder,
        value: impl Into<MetricValue>,
        labels: &L,
    ) {
        if let Err(err) = self.try_record(recorder, value, labels) {
            tracing::error!(
                metric = self.cell.descriptor.name,
                code = err.code(),
                error = %err,
                "label binding defect, sample dropped"
            );
        }
    }

    /// 记录一次指标值，并把绑定缺陷以 [`LabelError::LabelArity`] 返回给调用方。
    pub fn try_record(
        &self,
        recorder: &dyn MetricRecorder,
        value: impl Into<MetricValue>,
        labels: &L,
    ) -> Result<(), LabelError> {
        let names = self.cell.schema.flattened_names();
        let mut lease = self.pool.lease(names.len());
        let mut writer = LabelWriter::new(&mut lease);
        labels.write_labels(&mut writer);
        writer.finish()?;

        recorder.record(self.cell.descriptor.name, value.into(), names, &lease);
        self.cell.mark_active();
        Ok(())
    }
}

impl<L> Metric<L> {
    /// 指标名称。
    pub fn name(&self) -> &'static str {
        self.cell.descriptor.name
    }

    /// 指标元数据。
    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.cell.descriptor
    }

    /// 指标绑定的 Schema。
    pub fn schema(&self) -> &Arc<LabelSchema> {
        &self.cell.schema
    }

    /// 当前状态：`Valid` 或 `Active`。
    pub fn state(&self) -> DeclarationState {
        self.cell.state()
    }
}

impl<L> Clone for Metric<L> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            pool: Arc::clone(&self.pool),
            _marker: PhantomData,
        }
    }
}

impl<L> core::fmt::Debug for Metric<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Metric")
            .field("name", &self.cell.descriptor.name)
            .field("labels", &core::any::type_name::<L>())
            .field("state", &self.cell.state())
            .finish()
    }
}
