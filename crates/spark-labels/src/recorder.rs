//! 指标落点（Sink）契约与记录所需的元数据类型。
//!
//! # 契约说明（What）
//! - [`MetricRecorder`] 是生成的记录函数唯一调用的外部接口，实现（聚合、转发、存储）位于核心之外；
//! - [`MetricValue`] 为可插拔数值类型，覆盖整数计数与浮点测量；
//! - [`MetricDescriptor`] 以常量构造的方式声明指标名称、引用的 Schema 标识、描述与单位；
//! - [`check_label_arity`] 供落点实现在入口处断言名称与取值数量一致。

use crate::{error::LabelError, schema::LabelName, sealed::Sealed};

/// 指标值。
///
/// # 契约说明（What）
/// - `U64`：单调计数器增量等非负整数；
/// - `I64`：可正可负的整数变化量；
/// - `F64`：测量值（延迟、比率等）；
/// - 通过 `From` 从常见数值类型零成本转换；`usize` 视为 `U64`。
#[derive(Clone, Copy, Debug, PartialEq)]
#[non_exhaustive]
pub enum MetricValue {
    U64(u64),
    I64(i64),
    F64(f64),
}

impl MetricValue {
    /// 以 `f64` 读取，便于落点统一聚合。
    pub fn as_f64(self) -> f64 {
        match self {
            MetricValue::U64(value) => value as f64,
            MetricValue::I64(value) => value as f64,
            MetricValue::F64(value) => value,
        }
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        Self::U64(value)
    }
}

impl From<u32> for MetricValue {
    fn from(value: u32) -> Self {
        Self::U64(value.into())
    }
}

impl From<usize> for MetricValue {
    fn from(value: usize) -> Self {
        Self::U64(value as u64)
    }
}

impl From<i64> for MetricValue {
    fn from(value: i64) -> Self {
        Self::I64(value)
    }
}

impl From<i32> for MetricValue {
    fn from(value: i32) -> Self {
        Self::I64(value.into())
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        Self::F64(value)
    }
}

impl From<f32> for MetricValue {
    fn from(value: f32) -> Self {
        Self::F64(value.into())
    }
}

/// 指标落点契约。
///
/// # 契约说明（What）
/// - **前置条件**：`label_names.len() == label_values.len()`，第 i 个值对应第 i 个名称；
///   违反该条件属于生成/校验环节的缺陷（[`LabelError::LabelArity`]），而非可恢复的输入错误；
/// - **调用方式**：每次记录同步调用一次；调用返回后缓冲即归还缓冲池，
///   实现不得在调用结束后保留 `label_names`/`label_values` 的引用，如需保留请复制；
/// - **线程安全**：实现需满足 `Send + Sync`，可被多个线程并发调用；
/// - **失败处理**：实现自行决定如何处理后端故障，核心不重试也不吞掉实现抛出的 panic。
///
/// # 风险提示（Trade-offs）
/// - 核心不设超时；实现若阻塞，延迟会直接反映在调用方。
pub trait MetricRecorder: Send + Sync + Sealed {
    /// 记录一次指标值。
    fn record(
        &self,
        name: &str,
        value: MetricValue,
        label_names: &[LabelName],
        label_values: &[String],
    );
}

/// 落点实现可在入口处调用的数量检查。
pub fn check_label_arity(
    label_names: &[LabelName],
    label_values: &[String],
) -> Result<(), LabelError> {
    if label_names.len() == label_values.len() {
        Ok(())
    } else {
        Err(LabelError::LabelArity {
            expected: label_names.len(),
            actual: label_values.len(),
        })
    }
}

/// 指标声明的元数据。
///
/// # 契约说明（What）
/// - `name`：进程内唯一的指标名称；
/// - `schema`：引用的 Schema 标识，需在注册表中注册；
/// - `description`/`unit`：可选的说明与单位，仅作为元数据透传。
///
/// ```rust
/// use spark_labels::MetricDescriptor;
///
/// const OPERATION_COUNT: MetricDescriptor = MetricDescriptor::new("OperationCount", "op")
///     .with_description("按操作统计的调用次数")
///     .with_unit("calls");
/// assert_eq!(OPERATION_COUNT.schema, "op");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub name: &'static str,
    pub schema: &'static str,
    pub description: Option<&'static str>,
    pub unit: Option<&'static str>,
}

impl MetricDescriptor {
    /// 构造元数据描述。
    pub const fn new(name: &'static str, schema: &'static str) -> Self {
        Self {
            name,
            schema,
            description: None,
            unit: None,
        }
    }

    /// 附加说明文本。
    pub const fn with_description(mut self, description: &'static str) -> Self {
        self.description = Some(description);
        self
    }

    /// 附加单位信息。
    pub const fn with_unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn numeric_conversions_pick_matching_variant() {
        assert_eq!(MetricValue::from(1_u32), MetricValue::U64(1));
        assert_eq!(MetricValue::from(-2_i32), MetricValue::I64(-2));
        assert_eq!(MetricValue::from(0.5_f32), MetricValue::F64(0.5));
        assert_eq!(MetricValue::from(7_usize).as_f64(), 7.0);
    }

    #[test]
    fn arity_check_reports_both_lengths() {
        let names = [Cow::Borrowed("a"), Cow::Borrowed("b")];
        assert!(check_label_arity(&names, &[String::from("1"), String::from("2")]).is_ok());
        assert_eq!(
            check_label_arity(&names, &[String::from("1")]),
            Err(LabelError::LabelArity {
                expected: 2,
                actual: 1
            })
        );
    }
}
