#![deny(unsafe_code)]
#![allow(clippy::result_large_err)]
#![allow(private_bounds)]
#![doc = "spark-labels: 层级化指标标签 Schema、类型化标签绑定与池化记录路径。"]
#![doc = ""]
#![doc = "== 使用流程 =="]
#![doc = "1. 初始化阶段以 [`LabelSchema::root`]/[`LabelSchema::child`] 声明标签层级，并注册到 [`MetricRegistryBuilder`]；"]
#![doc = "2. 以 `#[derive(LabelValues)]` 定义标签值结构体，通过 `#[label(parent)]` 嵌入父层级结构体；"]
#![doc = "3. [`MetricRegistryBuilder::build`] 一次性校验全部声明，任何不匹配都会阻止注册表产出；"]
#![doc = "4. 热路径上调用 [`Metric::record`]：池化缓冲承载标签值，同步交给 [`MetricRecorder`] 落点。"]
#![doc = ""]
#![doc = "== 错误码 =="]
#![doc = "所有错误均提供 `<域>.<语义>` 形式的稳定错误码，集中定义于 [`codes`]。"]

extern crate self as spark_labels;

mod sealed;

pub mod binder;
pub mod config;
pub mod error;
pub mod pool;
pub mod recorder;
pub mod registry;
pub mod schema;
pub mod test_stubs;

pub use binder::{
    FieldLabel, LabelBinder, LabelShape, LabelValues, LabelWriter, ShapeLevel, check_field_names,
    validate_shape,
};
pub use config::LabelPoolConfig;
pub use error::{
    FindingKind, LabelError, ShapeMismatch, ValidationFinding, ValidationReport, codes,
};
pub use pool::{LabelBuffer, LabelBufferPool, LabelLease, PoolStats};
pub use recorder::{MetricDescriptor, MetricRecorder, MetricValue, check_label_arity};
pub use registry::{
    DeclarationState, Declared, Metric, MetricRegistry, MetricRegistryBuilder, global,
    install_global,
};
pub use schema::{LabelName, LabelSchema};

/// 为命名字段结构体派生 [`LabelValues`]。
///
/// - `#[label(parent)]`：该字段为父层级结构体，其全部标签值先于本层级写出，至多一个；
/// - `#[label(name = "...")]`：显式声明字段对应的标签名，校验阶段与 Schema 同位置名称比对；
/// - 其余字段需实现 `AsRef<str>`，按声明顺序对应本层级标签名。
pub use spark_labels_macros::LabelValues;
