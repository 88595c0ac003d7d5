//! 从声明到落点的完整记录路径。

use std::{sync::Arc, thread};

use spark_labels::{
    LabelError, LabelSchema, LabelShape, LabelValues, LabelWriter, MetricDescriptor,
    MetricRegistryBuilder, MetricValue,
    test_stubs::{CapturingRecorder, NoopRecorder},
};
use tracing_test::traced_test;

#[derive(Clone, LabelValues)]
struct AmbientLabels {
    cluster_id: String,
    pod_id: String,
}

#[derive(LabelValues)]
struct OpLabels {
    #[label(parent)]
    ambient: AmbientLabels,
    operation: String,
}

fn ambient() -> AmbientLabels {
    AmbientLabels {
        cluster_id: "123".into(),
        pod_id: "456".into(),
    }
}

fn op_builder() -> MetricRegistryBuilder {
    let ambient = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    let op = LabelSchema::child(&ambient, ["Operation"]).unwrap();
    let mut builder = MetricRegistryBuilder::new();
    builder
        .register_schema("ambient", ambient)
        .register_schema("op", op);
    builder
}

#[test]
fn operation_count_reaches_recorder_with_flattened_labels() {
    let mut builder = op_builder();
    let declared = builder.declare::<OpLabels>(MetricDescriptor::new("OperationCount", "op"));
    let registry = builder.build().unwrap();
    let metric = registry.metric(&declared).unwrap();

    let recorder = CapturingRecorder::default();
    metric.record(
        &recorder,
        1_u64,
        &OpLabels {
            ambient: ambient(),
            operation: "DeleteObject".into(),
        },
    );

    let samples = recorder.take();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].name, "OperationCount");
    assert_eq!(samples[0].value, MetricValue::U64(1));
    assert_eq!(
        samples[0].labels,
        [
            ("ClusterId".to_string(), "123".to_string()),
            ("PodId".to_string(), "456".to_string()),
            ("Operation".to_string(), "DeleteObject".to_string()),
        ]
    );
}

#[test]
fn buffers_are_reused_across_records() {
    let mut builder = op_builder();
    let declared = builder.declare::<OpLabels>(MetricDescriptor::new("OperationCount", "op"));
    let registry = builder.build().unwrap();
    let metric = registry.metric(&declared).unwrap();

    for operation in ["Get", "Put", "Delete"] {
        metric.record(
            &NoopRecorder,
            1_u64,
            &OpLabels {
                ambient: ambient(),
                operation: operation.into(),
            },
        );
    }
    let stats = registry.pool().statistics();
    assert_eq!(stats.acquired, 3);
    assert_eq!(stats.allocated, 1);
    assert_eq!(stats.reused, 2);
}

#[test]
fn concurrent_records_do_not_mix_labels() {
    const THREADS: usize = 8;
    const ROUNDS: usize = 200;

    let mut builder = op_builder();
    let declared = builder.declare::<OpLabels>(MetricDescriptor::new("OperationCount", "op"));
    let registry = builder.build().unwrap();
    let metric = registry.metric(&declared).unwrap();
    let recorder = Arc::new(CapturingRecorder::default());

    thread::scope(|scope| {
        for worker in 0..THREADS {
            let metric = metric.clone();
            let recorder = Arc::clone(&recorder);
            scope.spawn(move || {
                let labels = OpLabels {
                    ambient: AmbientLabels {
                        cluster_id: format!("cluster-{worker}"),
                        pod_id: format!("pod-{worker}"),
                    },
                    operation: format!("op-{worker}"),
                };
                for round in 0..ROUNDS {
                    metric.record(recorder.as_ref(), round as u64, &labels);
                }
            });
        }
    });

    let samples = recorder.take();
    assert_eq!(samples.len(), THREADS * ROUNDS);
    for sample in samples {
        let cluster = sample.label("ClusterId").unwrap();
        let worker = cluster.trim_start_matches("cluster-");
        assert_eq!(sample.label("PodId"), Some(format!("pod-{worker}").as_str()));
        assert_eq!(
            sample.label("Operation"),
            Some(format!("op-{worker}").as_str())
        );
    }
}

/// 手写实现漏写一个字段，模拟绑定缺陷。
struct BrokenLabels;

impl LabelValues for BrokenLabels {
    fn describe_shape(shape: &mut LabelShape) {
        AmbientLabels::describe_shape(shape);
    }

    fn write_labels(&self, writer: &mut LabelWriter<'_>) {
        writer.push("only-one");
    }
}

#[test]
#[traced_test]
fn arity_defect_drops_sample_and_logs() {
    let mut builder = op_builder();
    let declared = builder.declare::<BrokenLabels>(MetricDescriptor::new("Broken", "ambient"));
    let registry = builder.build().unwrap();
    let metric = registry.metric(&declared).unwrap();
    let recorder = CapturingRecorder::default();

    assert_eq!(
        metric.try_record(&recorder, 1_u64, &BrokenLabels),
        Err(LabelError::LabelArity {
            expected: 2,
            actual: 1
        })
    );
    metric.record(&recorder, 1_u64, &BrokenLabels);

    assert!(recorder.is_empty());
    assert!(logs_contain("label binding defect, sample dropped"));
    assert!(logs_contain("labels.arity"));
    assert_eq!(registry.pool().statistics().released, 2);
}
