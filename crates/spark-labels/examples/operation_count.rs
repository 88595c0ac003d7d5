//! 演示：环境标签 + 操作标签的两层 Schema，记录一次 `OperationCount`。
//!
//! 运行：`RUST_LOG=spark_labels=debug cargo run -p spark-labels --example operation_count`

use spark_labels::{
    LabelSchema, LabelValues, Metric, MetricDescriptor, MetricRegistryBuilder,
    test_stubs::CapturingRecorder,
};
use tracing_subscriber::EnvFilter;

const OPERATION_COUNT: MetricDescriptor = MetricDescriptor::new("OperationCount", "op")
    .with_description("按操作统计的调用次数")
    .with_unit("calls");

#[derive(Clone, LabelValues)]
struct AmbientLabels {
    cluster_id: String,
    pod_id: String,
}

#[derive(LabelValues)]
struct OpLabels {
    #[label(parent)]
    ambient: AmbientLabels,
    operation: &'static str,
}

struct MyService {
    ambient: AmbientLabels,
    operation_count: Metric<OpLabels>,
}

impl MyService {
    fn delete_object(&self, recorder: &CapturingRecorder) {
        self.operation_count.record(
            recorder,
            1_u64,
            &OpLabels {
                ambient: self.ambient.clone(),
                operation: "DeleteObject",
            },
        );
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let ambient = LabelSchema::root(["ClusterId", "PodId"])?;
    let op = LabelSchema::child(&ambient, ["Operation"])?;

    let mut builder = MetricRegistryBuilder::new();
    builder
        .register_schema("ambient", ambient)
        .register_schema("op", op);
    let declared = builder.declare::<OpLabels>(OPERATION_COUNT);
    let registry = builder.build()?;

    let service = MyService {
        ambient: AmbientLabels {
            cluster_id: "123".into(),
            pod_id: "456".into(),
        },
        operation_count: registry.metric(&declared)?,
    };

    let recorder = CapturingRecorder::default();
    service.delete_object(&recorder);
    service.delete_object(&recorder);

    for sample in recorder.take() {
        println!("{} += {:?} {:?}", sample.name, sample.value, sample.labels);
    }
    println!("{:?}", registry.pool().statistics());
    Ok(())
}
