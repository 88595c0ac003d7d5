//! 标签体系的错误分类。
//!
//! # 契约说明（What）
//! - [`LabelError`]：声明期（重复标签名、空标签名、配置非法）与记录期缺陷（标签数量不一致）的统一错误；
//! - [`ShapeMismatch`]：标签值结构体与 Schema 的结构不一致，绑定器创建或注册表校验时产生；
//! - [`ValidationReport`]：注册表一次性校验全部声明后汇总的报告，任何一条发现都会阻止注册表产出；
//! - 每个错误都提供稳定的 `code()`，取值见 [`codes`]，遵循 `<域>.<语义>` 命名。
//!
//! # 风险提示（Trade-offs）
//! - 声明期错误均为致命错误，调用方应在启动阶段直接终止，而不是带着残缺的指标集继续运行。

use core::fmt;
use std::borrow::Cow;

use thiserror::Error;

use crate::{registry::DeclarationState, schema::LabelName};

/// 稳定错误码常量。
pub mod codes {
    /// Schema 内存在重复标签名。
    pub const DUPLICATE_NAME: &str = "labels.duplicate_name";
    /// 标签名为空字符串。
    pub const EMPTY_NAME: &str = "labels.empty_name";
    /// 标签值结构体与 Schema 结构不一致。
    pub const SCHEMA_MISMATCH: &str = "labels.schema_mismatch";
    /// 注册表校验失败。
    pub const VALIDATION_FAILED: &str = "labels.validation_failed";
    /// 记录路径上标签名与标签值数量不一致。
    pub const ARITY: &str = "labels.arity";
    /// 声明句柄来自其他注册表。
    pub const FOREIGN_DECLARATION: &str = "labels.foreign_declaration";
    /// 进程级注册表已安装。
    pub const GLOBAL_INSTALLED: &str = "labels.global_installed";
    /// 缓冲池配置非法。
    pub const CONFIG_INVALID: &str = "labels.config_invalid";
}

/// 标签体系的核心错误。
///
/// # 契约说明（What）
/// - `DuplicateName`/`EmptyName`：Schema 构造失败，属于声明错误；
/// - `SchemaMismatch`：绑定器创建失败，细节见 [`ShapeMismatch`]；
/// - `LabelArity`：记录路径上写入的标签值数量与 Schema 宽度不一致。只可能由绑定实现的缺陷触发，
///   不属于可恢复的输入错误；
/// - `ForeignDeclaration`：使用了其他注册表签发的 [`Declared`](crate::Declared) 句柄；
/// - `GlobalAlreadyInstalled`：重复调用 [`install_global`](crate::install_global)；
/// - `InvalidConfig`：缓冲池配置不满足约束。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LabelError {
    #[error("标签名 `{name}` 在同一 Schema 层级链中重复声明")]
    DuplicateName { name: LabelName },
    #[error("第 {position} 个标签名为空字符串")]
    EmptyName { position: usize },
    #[error(transparent)]
    SchemaMismatch(#[from] ShapeMismatch),
    #[error("标签数量不一致：Schema 宽度为 {expected}，实际提供 {actual} 个标签值")]
    LabelArity { expected: usize, actual: usize },
    #[error("指标 `{metric}` 的声明句柄不属于当前注册表")]
    ForeignDeclaration { metric: &'static str },
    #[error("进程级指标注册表已安装，禁止重复安装")]
    GlobalAlreadyInstalled,
    #[error("缓冲池配置非法: {reason}")]
    InvalidConfig { reason: String },
}

impl LabelError {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        match self {
            LabelError::DuplicateName { .. } => codes::DUPLICATE_NAME,
            LabelError::EmptyName { .. } => codes::EMPTY_NAME,
            LabelError::SchemaMismatch(_) => codes::SCHEMA_MISMATCH,
            LabelError::LabelArity { .. } => codes::ARITY,
            LabelError::ForeignDeclaration { .. } => codes::FOREIGN_DECLARATION,
            LabelError::GlobalAlreadyInstalled => codes::GLOBAL_INSTALLED,
            LabelError::InvalidConfig { .. } => codes::CONFIG_INVALID,
        }
    }
}

/// 标签值结构体与 Schema 之间的结构差异。
///
/// 层级编号从 0 开始，0 表示根层级（最远的祖先）。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ShapeMismatch {
    #[error(
        "层级数量不一致：Schema 共 {expected} 层，标签结构体 `{type_name}` 共 {actual} 层"
    )]
    LevelCount {
        type_name: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error(
        "第 {level} 层宽度不一致：Schema 声明 {expected} 个标签 {expected_names:?}，\
         结构体 `{type_name}` 提供 {actual} 个字段 {actual_fields:?}"
    )]
    LevelWidth {
        level: usize,
        type_name: &'static str,
        expected: usize,
        actual: usize,
        expected_names: Vec<LabelName>,
        actual_fields: Vec<&'static str>,
    },
    #[error(
        "第 {level} 层第 {position} 个字段 `{type_name}::{field}` 绑定标签 `{declared}`，\
         但 Schema 在该位置声明的是 `{expected}`"
    )]
    NameMismatch {
        level: usize,
        position: usize,
        type_name: &'static str,
        field: &'static str,
        declared: &'static str,
        expected: LabelName,
    },
    #[error(
        "第 {level} 层第 {position} 个字段 `{type_name}::{field}` 与 Schema 在该位置声明的标签 \
         `{expected}` 名称不符"
    )]
    FieldName {
        level: usize,
        position: usize,
        type_name: &'static str,
        field: &'static str,
        expected: LabelName,
    },
}

impl ShapeMismatch {
    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        codes::SCHEMA_MISMATCH
    }
}

/// 单条校验发现的分类。
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum FindingKind {
    /// 指标引用的 Schema 标识未注册。
    UnknownSchema { schema: &'static str },
    /// 同一 Schema 标识被注册多次。
    DuplicateSchemaId,
    /// 同名指标被声明多次，首个声明之后的重复项均记为该发现。
    DuplicateMetricName,
    /// 指标名称为空。
    EmptyMetricName,
    /// 标签值结构体与 Schema 结构不一致。
    Shape(ShapeMismatch),
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::UnknownSchema { schema } => write!(f, "引用了未注册的 Schema `{schema}`"),
            FindingKind::DuplicateSchemaId => f.write_str("Schema 标识重复注册"),
            FindingKind::DuplicateMetricName => f.write_str("指标名称重复声明"),
            FindingKind::EmptyMetricName => f.write_str("指标名称为空"),
            FindingKind::Shape(mismatch) => fmt::Display::fmt(mismatch, f),
        }
    }
}

/// 注册表校验过程中的单条发现。
///
/// `subject` 为指标名称；对于 [`FindingKind::DuplicateSchemaId`] 则为 Schema 标识。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFinding {
    pub subject: Cow<'static, str>,
    pub kind: FindingKind,
}

impl fmt::Display for ValidationFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.subject, self.kind)
    }
}

/// 整个声明集合的校验报告。
///
/// # 契约说明（What）
/// - 报告覆盖全部声明：某条声明失败不会跳过其他声明的校验；
/// - `findings` 按声明顺序排列，Schema 级别的发现排在指标级别之前；
/// - 只要报告非空，注册表就不会被构建；
/// - 报告保留每条声明校验结束时的状态（`Valid` 或 `Invalid`），按声明顺序排列。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    findings: Vec<ValidationFinding>,
    states: Vec<(&'static str, DeclarationState)>,
}

impl ValidationReport {
    pub(crate) fn new(
        findings: Vec<ValidationFinding>,
        states: Vec<(&'static str, DeclarationState)>,
    ) -> Self {
        Self { findings, states }
    }

    /// 返回稳定错误码。
    pub fn code(&self) -> &'static str {
        codes::VALIDATION_FAILED
    }

    /// 全部发现。
    pub fn findings(&self) -> &[ValidationFinding] {
        &self.findings
    }

    /// 参与校验的指标声明总数。
    pub fn declared(&self) -> usize {
        self.states.len()
    }

    /// 每条声明的最终状态，按声明顺序排列。
    pub fn states(&self) -> &[(&'static str, DeclarationState)] {
        &self.states
    }

    /// 指标的最终状态；同名声明中任一条为 `Invalid` 即返回 `Invalid`，未声明时返回 `None`。
    pub fn state(&self, metric: &str) -> Option<DeclarationState> {
        self.states
            .iter()
            .filter(|(name, _)| *name == metric)
            .map(|(_, state)| *state)
            .reduce(|current, next| {
                if next == DeclarationState::Invalid {
                    next
                } else {
                    current
                }
            })
    }

    /// 判定为 `Invalid` 的指标名称（去重，保持首次出现顺序）。
    pub fn invalid_metrics(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for finding in &self.findings {
            if matches!(finding.kind, FindingKind::DuplicateSchemaId) {
                continue;
            }
            let subject: &str = &finding.subject;
            if !names.contains(&subject) {
                names.push(subject);
            }
        }
        names
    }

    /// 查询某个指标的全部发现。
    pub fn findings_for<'a>(
        &'a self,
        metric: &'a str,
    ) -> impl Iterator<Item = &'a ValidationFinding> + 'a {
        self.findings
            .iter()
            .filter(move |finding| finding.subject == metric)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "指标声明校验失败：{} 条声明中发现 {} 项问题",
            self.states.len(),
            self.findings.len()
        )?;
        for finding in &self.findings {
            write!(f, "\n  - {finding}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationReport {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_lists_every_finding() {
        let report = ValidationReport::new(
            vec![
                ValidationFinding {
                    subject: Cow::Borrowed("A"),
                    kind: FindingKind::UnknownSchema { schema: "missing" },
                },
                ValidationFinding {
                    subject: Cow::Borrowed("B"),
                    kind: FindingKind::DuplicateMetricName,
                },
            ],
            vec![
                ("A", DeclarationState::Invalid),
                ("B", DeclarationState::Valid),
                ("B", DeclarationState::Invalid),
            ],
        );

        let rendered = report.to_string();
        assert!(rendered.contains("3 条声明中发现 2 项问题"));
        assert!(rendered.contains("`A`: 引用了未注册的 Schema `missing`"));
        assert!(rendered.contains("`B`: 指标名称重复声明"));
        assert_eq!(report.invalid_metrics(), vec!["A", "B"]);
        assert_eq!(report.code(), codes::VALIDATION_FAILED);
        assert_eq!(report.state("B"), Some(DeclarationState::Invalid));
        assert_eq!(report.state("C"), None);
    }

    #[test]
    fn schema_mismatch_converts_into_label_error() {
        let err: LabelError = ShapeMismatch::LevelCount {
            type_name: "OpLabels",
            expected: 2,
            actual: 1,
        }
        .into();
        assert_eq!(err.code(), codes::SCHEMA_MISMATCH);
        assert!(err.to_string().contains("Schema 共 2 层"));
    }
}
