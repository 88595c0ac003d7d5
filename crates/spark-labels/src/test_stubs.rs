//! 测试与示例使用的指标落点桩。
//!
//! # 契约说明（What）
//! - [`NoopRecorder`]：零尺寸、无副作用的落点，用于只关心调用链是否通畅的场景；
//! - [`CapturingRecorder`]：把每次记录复制为 [`RecordedSample`]，供断言标签名与取值的对应关系；
//! - 两者都会在入口调用 [`check_label_arity`]，数量不一致时直接 panic，使绑定缺陷在测试中立即暴露。
//!
//! # 风险提示（Trade-offs）
//! - `CapturingRecorder` 内部使用互斥锁并复制全部字符串，仅适合测试与演示，不应出现在生产热路径。

use parking_lot::Mutex;

use crate::{
    recorder::{MetricRecorder, MetricValue, check_label_arity},
    schema::LabelName,
};

/// 忽略全部输入的落点。
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopRecorder;

impl MetricRecorder for NoopRecorder {
    fn record(
        &self,
        _name: &str,
        _value: MetricValue,
        label_names: &[LabelName],
        label_values: &[String],
    ) {
        if let Err(err) = check_label_arity(label_names, label_values) {
            panic!("NoopRecorder 收到数量不一致的标签：{err}");
        }
    }
}

/// 一次记录的拷贝。
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedSample {
    pub name: String,
    pub value: MetricValue,
    /// `(标签名, 标签值)`，按扁平化顺序排列。
    pub labels: Vec<(String, String)>,
}

impl RecordedSample {
    /// 按标签名查找取值。
    pub fn label(&self, name: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(label, _)| label == name)
            .map(|(_, value)| value.as_str())
    }
}

/// 复制并保存每次记录的落点。
#[derive(Debug, Default)]
pub struct CapturingRecorder {
    samples: Mutex<Vec<RecordedSample>>,
}

impl CapturingRecorder {
    /// 已捕获样本的快照。
    pub fn samples(&self) -> Vec<RecordedSample> {
        self.samples.lock().clone()
    }

    /// 取走全部已捕获样本。
    pub fn take(&self) -> Vec<RecordedSample> {
        std::mem::take(&mut *self.samples.lock())
    }

    /// 已捕获样本数量。
    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    /// 是否尚未捕获任何样本。
    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }
}

impl MetricRecorder for CapturingRecorder {
    fn record(
        &self,
        name: &str,
        value: MetricValue,
        label_names: &[LabelName],
        label_values: &[String],
    ) {
        if let Err(err) = check_label_arity(label_names, label_values) {
            panic!("CapturingRecorder 收到数量不一致的标签：{err}");
        }
        let labels = label_names
            .iter()
            .zip(label_values)
            .map(|(label, value)| (label.to_string(), value.clone()))
            .collect();
        self.samples.lock().push(RecordedSample {
            name: name.to_owned(),
            value,
            labels,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn capturing_recorder_pairs_names_with_values() {
        let recorder = CapturingRecorder::default();
        let names = [Cow::Borrowed("Operation"), Cow::Borrowed("Outcome")];
        recorder.record(
            "Calls",
            MetricValue::U64(1),
            &names,
            &[String::from("Get"), String::from("Ok")],
        );
        let samples = recorder.take();
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].label("Outcome"), Some("Ok"));
        assert!(recorder.is_empty());
    }

    #[test]
    #[should_panic(expected = "数量不一致")]
    fn mismatched_arity_panics() {
        let names = [Cow::Borrowed("Operation")];
        NoopRecorder.record("Calls", MetricValue::U64(1), &names, &[]);
    }
}
