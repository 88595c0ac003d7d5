//! 标签值结构体与 Schema 之间的绑定。
//!
//! # 契约说明（What）
//! - [`LabelValues`]：标签值结构体实现的 Trait，描述自身的层级形状并按祖先优先顺序写出字段值；
//!   通常由 `#[derive(LabelValues)]` 生成，也可手写；
//! - [`LabelShape`]：结构体的静态形状（每层字段列表），只在校验阶段构造；
//! - [`validate_shape`]：逐层、逐字段比较形状与 Schema，返回首个结构差异；
//! - [`check_field_names`]：可选检查，比对未显式命名字段的字段名与同位置标签名；
//! - [`LabelWriter`]：热路径上的写入器，将字段值覆盖写入池化缓冲的槽位，复用 `String` 容量；
//! - [`LabelBinder`]：形状校验一次后可反复绑定的绑定器。
//!
//! # 执行逻辑（How）
//! - 形状校验只在创建绑定器或构建注册表时执行；每次记录仅做字段提取与一次数量比对。

use std::{marker::PhantomData, sync::Arc};

use crate::{
    error::{LabelError, ShapeMismatch},
    schema::LabelSchema,
};

/// 标签值结构体契约。
///
/// # 契约说明（What）
/// - `describe_shape`：先追加父层级（若有）的形状，再追加本层级，层级顺序与 Schema 一致；
/// - `write_labels`：先写父层级字段，再按声明顺序写本层级字段；写入数量必须等于形状中的字段总数；
/// - **前置条件**：实现必须与 `describe_shape` 保持一致，否则记录时会触发
///   [`LabelError::LabelArity`] 并丢弃该样本。
///
/// ```rust
/// use spark_labels::{LabelSchema, LabelValues, LabelBinder};
///
/// #[derive(LabelValues)]
/// struct AmbientLabels {
///     cluster_id: String,
///     pod_id: String,
/// }
///
/// #[derive(LabelValues)]
/// struct OpLabels {
///     #[label(parent)]
///     ambient: AmbientLabels,
///     operation: &'static str,
/// }
///
/// let ambient = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
/// let op = LabelSchema::child(&ambient, ["Operation"]).unwrap();
/// let binder = LabelBinder::<OpLabels>::new(op).unwrap();
///
/// let labels = OpLabels {
///     ambient: AmbientLabels { cluster_id: "123".into(), pod_id: "456".into() },
///     operation: "DeleteObject",
/// };
/// let mut out = vec![String::new(); binder.width()];
/// binder.bind(&labels, &mut out).unwrap();
/// assert_eq!(out, ["123", "456", "DeleteObject"]);
/// ```
pub trait LabelValues {
    /// 追加本类型（含祖先层级）的形状。
    fn describe_shape(shape: &mut LabelShape);

    /// 按祖先优先顺序写出全部标签值。
    fn write_labels(&self, writer: &mut LabelWriter<'_>);
}

/// 单个字段的标签描述。
///
/// `label` 为字段显式绑定的标签名（`#[label(name = "...")]`）；为 `None` 时只按位置对应。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldLabel {
    pub field: &'static str,
    pub label: Option<&'static str>,
}

impl FieldLabel {
    /// 仅按位置对应的字段。
    pub const fn positional(field: &'static str) -> Self {
        Self { field, label: None }
    }

    /// 显式绑定标签名的字段。
    pub const fn named(field: &'static str, label: &'static str) -> Self {
        Self {
            field,
            label: Some(label),
        }
    }
}

/// 一个层级的形状。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShapeLevel {
    pub type_name: &'static str,
    pub fields: Vec<FieldLabel>,
}

/// 标签值结构体的完整形状，层级按祖先优先排列。
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelShape {
    levels: Vec<ShapeLevel>,
}

impl LabelShape {
    /// 计算类型 `L` 的形状。
    pub fn of<L: LabelValues + ?Sized>() -> Self {
        let mut shape = Self::default();
        L::describe_shape(&mut shape);
        shape
    }

    /// 追加一个层级；由派生宏或手写实现调用。
    pub fn push_level(&mut self, type_name: &'static str, fields: &[FieldLabel]) {
        self.levels.push(ShapeLevel {
            type_name,
            fields: fields.to_vec(),
        });
    }

    /// 全部层级。
    pub fn levels(&self) -> &[ShapeLevel] {
        &self.levels
    }

    /// 字段总数。
    pub fn width(&self) -> usize {
        self.levels.iter().map(|level| level.fields.len()).sum()
    }

    /// 最外层结构体的类型名。
    pub fn type_name(&self) -> &'static str {
        self.levels.last().map_or("<empty>", |level| level.type_name)
    }
}

/// 逐层比较形状与 Schema。
///
/// # 契约说明（What）
/// - 先比较层级数量，再逐层比较宽度，最后比较显式绑定的标签名；
/// - 返回遇到的第一个差异；通过校验意味着 `shape.width() == schema.width()`。
pub fn validate_shape(schema: &LabelSchema, shape: &LabelShape) -> Result<(), ShapeMismatch> {
    let schema_levels = schema.levels();
    if schema_levels.len() != shape.levels.len() {
        return Err(ShapeMismatch::LevelCount {
            type_name: shape.type_name(),
            expected: schema_levels.len(),
            actual: shape.levels.len(),
        });
    }

    for (level, (declared, actual)) in schema_levels.iter().zip(&shape.levels).enumerate() {
        let names = declared.own_names();
        if names.len() != actual.fields.len() {
            return Err(ShapeMismatch::LevelWidth {
                level,
                type_name: actual.type_name,
                expected: names.len(),
                actual: actual.fields.len(),
                expected_names: names.to_vec(),
                actual_fields: actual.fields.iter().map(|field| field.field).collect(),
            });
        }
        for (position, (expected, field)) in names.iter().zip(&actual.fields).enumerate() {
            if let Some(label) = field.label {
                if expected != label {
                    return Err(ShapeMismatch::NameMismatch {
                        level,
                        position,
                        type_name: actual.type_name,
                        field: field.field,
                        declared: label,
                        expected: expected.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}

/// 比对未显式命名字段的字段名与同位置的标签名。
///
/// # 契约说明（What）
/// - 可选的附加检查，用于发现同宽度层级内字段顺序写反（例如 `pod_id` 与 `cluster_id` 对调）；
/// - 比较时忽略大小写、下划线与 `r#` 前缀：`cluster_id` 与 `ClusterId` 视为一致；
/// - 已通过 `#[label(name = "...")]` 显式命名的字段由 [`validate_shape`] 负责，此处跳过；
/// - **前置条件**：`shape` 已通过 [`validate_shape`]，否则只比较两侧都存在的位置。
pub fn check_field_names(schema: &LabelSchema, shape: &LabelShape) -> Result<(), ShapeMismatch> {
    for (level, (declared, actual)) in schema.levels().iter().zip(&shape.levels).enumerate() {
        let pairs = declared.own_names().iter().zip(&actual.fields);
        for (position, (expected, field)) in pairs.enumerate() {
            if field.label.is_none() && !loosely_equal(field.field, expected) {
                return Err(ShapeMismatch::FieldName {
                    level,
                    position,
                    type_name: actual.type_name,
                    field: field.field,
                    expected: expected.clone(),
                });
            }
        }
    }
    Ok(())
}

fn loosely_equal(field: &str, label: &str) -> bool {
    let normalize = |text: &str| {
        text.trim_start_matches("r#")
            .chars()
            .filter(|c| *c != '_')
            .flat_map(char::to_lowercase)
            .collect::<String>()
    };
    normalize(field) == normalize(label)
}

/// 向缓冲槽位顺序写入标签值。
///
/// # 契约说明（What）
/// - 每次 [`push`](Self::push) 清空下一个槽位并写入新值，槽位中的旧内容不会泄露到本次记录；
/// - 写入超过槽位数量时不会越界，只累计计数，由 [`finish`](Self::finish) 报告数量不一致。
pub struct LabelWriter<'a> {
    slots: &'a mut [String],
    written: usize,
}

impl<'a> LabelWriter<'a> {
    /// 以待覆盖的槽位构造写入器。
    pub fn new(slots: &'a mut [String]) -> Self {
        Self { slots, written: 0 }
    }

    /// 写入下一个标签值。
    pub fn push(&mut self, value: &str) {
        if let Some(slot) = self.slots.get_mut(self.written) {
            slot.clear();
            slot.push_str(value);
        }
        self.written += 1;
    }

    /// 已写入的数量（含越界部分）。
    pub fn written(&self) -> usize {
        self.written
    }

    /// 校验写入数量恰好填满全部槽位。
    pub fn finish(self) -> Result<(), LabelError> {
        if self.written == self.slots.len() {
            Ok(())
        } else {
            Err(LabelError::LabelArity {
                expected: self.slots.len(),
                actual: self.written,
            })
        }
    }
}

/// 形状已校验的绑定器。
///
/// # 契约说明（What）
/// - [`new`](Self::new) 执行唯一一次形状校验，失败返回 [`LabelError::SchemaMismatch`]；
/// - [`bind`](Self::bind) 只做字段提取：`out.len()` 必须等于 Schema 宽度，否则返回
///   [`LabelError::LabelArity`]。
pub struct LabelBinder<L> {
    schema: Arc<LabelSchema>,
    _marker: PhantomData<fn(&L)>,
}

impl<L: LabelValues> LabelBinder<L> {
    /// 校验 `L` 的形状并构造绑定器。
    pub fn new(schema: Arc<LabelSchema>) -> Result<Self, LabelError> {
        validate_shape(&schema, &LabelShape::of::<L>())?;
        Ok(Self {
            schema,
            _marker: PhantomData,
        })
    }

    /// 在 [`new`](Self::new) 的基础上追加 [`check_field_names`] 检查。
    pub fn with_field_names(schema: Arc<LabelSchema>) -> Result<Self, LabelError> {
        let binder = Self::new(schema)?;
        check_field_names(&binder.schema, &LabelShape::of::<L>())?;
        Ok(binder)
    }

    /// 绑定的 Schema。
    pub fn schema(&self) -> &Arc<LabelSchema> {
        &self.schema
    }

    /// 输出缓冲所需宽度。
    pub fn width(&self) -> usize {
        self.schema.width()
    }

    /// 将 `labels` 写入 `out`，第 i 个值对应第 i 个扁平化标签名。
    pub fn bind(&self, labels: &L, out: &mut [String]) -> Result<(), LabelError> {
        if out.len() != self.schema.width() {
            return Err(LabelError::LabelArity {
                expected: self.schema.width(),
                actual: out.len(),
            });
        }
        let mut writer = LabelWriter::new(out);
        labels.write_labels(&mut writer);
        writer.finish()
    }
}

impl<L> Clone for LabelBinder<L> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            _marker: PhantomData,
        }
    }
}

impl<L> core::fmt::Debug for LabelBinder<L> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LabelBinder")
            .field("labels", &core::any::type_name::<L>())
            .field("names", &self.schema.flattened_names())
            .finish()
    }
}
