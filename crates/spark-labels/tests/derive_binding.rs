//! `#[derive(LabelValues)]` 生成代码的绑定行为。

use std::{borrow::Cow, sync::Arc};

use spark_labels::{
    DeclarationState, FieldLabel, LabelBinder, LabelError, LabelSchema, LabelShape, LabelValues,
    MetricDescriptor, MetricRegistryBuilder, ShapeMismatch,
};

#[derive(LabelValues)]
struct AmbientLabels {
    cluster_id: String,
    pod_id: String,
}

#[derive(LabelValues)]
struct OpLabels {
    #[label(parent)]
    ambient: AmbientLabels,
    #[label(name = "Operation")]
    operation: &'static str,
}

#[derive(LabelValues)]
struct OutcomeLabels<'a> {
    outcome: Cow<'a, str>,
    #[label(parent)]
    op: OpLabels,
}

fn ambient() -> AmbientLabels {
    AmbientLabels {
        cluster_id: "123".into(),
        pod_id: "456".into(),
    }
}

#[test]
fn derived_shape_lists_levels_ancestor_first() {
    let shape = LabelShape::of::<OutcomeLabels<'static>>();
    let levels: Vec<_> = shape
        .levels()
        .iter()
        .map(|level| (level.type_name, level.fields.clone()))
        .collect();
    assert_eq!(
        levels,
        vec![
            (
                "AmbientLabels",
                vec![
                    FieldLabel::positional("cluster_id"),
                    FieldLabel::positional("pod_id")
                ]
            ),
            ("OpLabels", vec![FieldLabel::named("operation", "Operation")]),
            ("OutcomeLabels", vec![FieldLabel::positional("outcome")]),
        ]
    );
    assert_eq!(shape.width(), 4);
}

#[test]
fn parent_values_come_first_regardless_of_field_order() {
    let ambient_schema = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    let op_schema = LabelSchema::child(&ambient_schema, ["Operation"]).unwrap();
    let outcome_schema = LabelSchema::child(&op_schema, ["Outcome"]).unwrap();
    let binder = LabelBinder::<OutcomeLabels<'_>>::new(outcome_schema).unwrap();

    let labels = OutcomeLabels {
        outcome: Cow::Borrowed("Ok"),
        op: OpLabels {
            ambient: ambient(),
            operation: "DeleteObject",
        },
    };
    let mut out = vec![String::new(); binder.width()];
    binder.bind(&labels, &mut out).unwrap();
    assert_eq!(out, ["123", "456", "DeleteObject", "Ok"]);
}

#[test]
fn explicit_name_must_match_schema() {
    let ambient_schema = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    let op_schema = LabelSchema::child(&ambient_schema, ["Method"]).unwrap();
    let err = LabelBinder::<OpLabels>::new(op_schema).unwrap_err();
    assert_eq!(err.code(), spark_labels::codes::SCHEMA_MISMATCH);
    match err {
        LabelError::SchemaMismatch(ShapeMismatch::NameMismatch {
            level,
            field,
            declared,
            expected,
            ..
        }) => {
            assert_eq!((level, field, declared), (1, "operation", "Operation"));
            assert_eq!(expected, "Method");
        }
        other => panic!("期望 NameMismatch，实际为 {other:?}"),
    }
}

#[test]
fn flat_struct_against_nested_schema_is_rejected() {
    #[derive(LabelValues)]
    struct Flat {
        cluster_id: String,
        pod_id: String,
        operation: String,
    }

    let ambient_schema = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    let op_schema = LabelSchema::child(&ambient_schema, ["Operation"]).unwrap();
    let err = LabelBinder::<Flat>::new(op_schema).unwrap_err();
    assert!(matches!(
        err,
        LabelError::SchemaMismatch(ShapeMismatch::LevelCount {
            type_name: "Flat",
            expected: 2,
            actual: 1
        })
    ));
}

#[test]
fn stale_buffer_contents_never_leak() {
    let ambient_schema = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    let binder = LabelBinder::<AmbientLabels>::new(ambient_schema).unwrap();
    let mut out = vec![
        String::from("a-much-longer-previous-value"),
        String::from("another-previous-value"),
    ];
    binder.bind(&ambient(), &mut out).unwrap();
    assert_eq!(out, ["123", "456"]);
}

#[test]
fn swapped_fields_bind_positionally_unless_names_are_checked() {
    #[derive(LabelValues)]
    struct SwappedAmbient {
        pod_id: String,
        cluster_id: String,
    }

    let ambient_schema = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    assert!(LabelBinder::<SwappedAmbient>::new(Arc::clone(&ambient_schema)).is_ok());
    assert!(LabelBinder::<AmbientLabels>::with_field_names(Arc::clone(&ambient_schema)).is_ok());

    let err = LabelBinder::<SwappedAmbient>::with_field_names(Arc::clone(&ambient_schema))
        .unwrap_err();
    assert!(matches!(
        err,
        LabelError::SchemaMismatch(ShapeMismatch::FieldName {
            field: "pod_id",
            position: 0,
            ..
        })
    ));

    let mut builder = MetricRegistryBuilder::new();
    builder
        .check_field_names(true)
        .register_schema("ambient", ambient_schema);
    builder.declare::<SwappedAmbient>(MetricDescriptor::new("PodUptime", "ambient"));
    builder.declare::<AmbientLabels>(MetricDescriptor::new("PodRestarts", "ambient"));
    let report = builder.build().unwrap_err();
    assert_eq!(report.invalid_metrics(), ["PodUptime"]);
    assert_eq!(report.state("PodRestarts"), Some(DeclarationState::Valid));
}
