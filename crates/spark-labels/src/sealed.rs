//! 内部 sealed 标记，控制对外可实现 Trait 的演进边界。
//!
//! # 契约说明（What）
//! - `Sealed` 对所有类型提供 blanket 实现，调用方无需显式实现；
//! - [`MetricRecorder`](crate::MetricRecorder) 通过 `: crate::sealed::Sealed` 间接依赖该标记，
//!   未来若需收紧实现者集合，只需修改此处的 blanket 条件。
pub(crate) trait Sealed {}

impl<T: ?Sized> Sealed for T {}
