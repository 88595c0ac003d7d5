//! 层级化标签 Schema。
//!
//! # 契约说明（What）
//! - [`LabelSchema`] 描述一层有序的标签名，并可选地挂接唯一的父 Schema，整体构成一棵树；
//! - 扁平化名称（[`LabelSchema::flattened_names`]）按“祖先优先”顺序拼接，在构造时一次性计算并缓存；
//! - 同一条层级链上的标签名必须唯一（大小写敏感），违反时构造失败并返回
//!   [`LabelError::DuplicateName`]，不会静默去重；
//! - Schema 构造后不可变，通过 `Arc` 在注册表与记录句柄之间共享，读取无需加锁。

use std::{borrow::Cow, collections::HashSet, sync::Arc};

use crate::error::LabelError;

/// 标签名。
///
/// 静态声明使用 `Cow::Borrowed`，运行时拼装的名称使用 `Cow::Owned`。
pub type LabelName = Cow<'static, str>;

/// 一层有序标签名及其可选父层级。
///
/// # 契约说明（What）
/// - `own_names`：本层级声明的标签名，保持声明顺序；
/// - `parent`：父 Schema，最多一个；层级链只能向上引用已构造完成的 Schema，因此不存在环；
/// - `flattened`：父层级扁平化名称 + 本层级名称，构造时计算；
/// - **后置条件**：`flattened_names()` 中任意两个名称互不相同。
#[derive(Debug, PartialEq, Eq)]
pub struct LabelSchema {
    own_names: Box<[LabelName]>,
    parent: Option<Arc<LabelSchema>>,
    flattened: Box<[LabelName]>,
    depth: usize,
}

impl LabelSchema {
    /// 构造无父层级的根 Schema。
    ///
    /// # 契约说明（What）
    /// - **输入**：有序标签名序列，可为 `&'static str` 或 `String`；
    /// - **错误**：名称重复返回 [`LabelError::DuplicateName`]，空字符串返回 [`LabelError::EmptyName`]；
    /// - **后置条件**：`flattened_names() == own_names()`。
    ///
    /// ```rust
    /// use spark_labels::LabelSchema;
    ///
    /// let ambient = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    /// assert_eq!(ambient.flattened_names(), ["ClusterId", "PodId"]);
    /// ```
    pub fn root<I, N>(names: I) -> Result<Arc<Self>, LabelError>
    where
        I: IntoIterator<Item = N>,
        N: Into<LabelName>,
    {
        Self::build(None, names)
    }

    /// 以 `parent` 为父层级构造子 Schema。
    ///
    /// # 契约说明（What）
    /// - **错误**：`names` 内部重复，或与 `parent.flattened_names()` 中任一名称重复，
    ///   均返回 [`LabelError::DuplicateName`]；
    /// - **后置条件**：`flattened_names() == parent.flattened_names() ++ names`。
    ///
    /// ```rust
    /// use spark_labels::LabelSchema;
    ///
    /// let ambient = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
    /// let op = LabelSchema::child(&ambient, ["Operation"]).unwrap();
    /// assert_eq!(op.flattened_names(), ["ClusterId", "PodId", "Operation"]);
    /// assert!(LabelSchema::child(&ambient, ["PodId"]).is_err());
    /// ```
    pub fn child<I, N>(parent: &Arc<LabelSchema>, names: I) -> Result<Arc<Self>, LabelError>
    where
        I: IntoIterator<Item = N>,
        N: Into<LabelName>,
    {
        Self::build(Some(Arc::clone(parent)), names)
    }

    fn build<I, N>(parent: Option<Arc<LabelSchema>>, names: I) -> Result<Arc<Self>, LabelError>
    where
        I: IntoIterator<Item = N>,
        N: Into<LabelName>,
    {
        let own_names: Vec<LabelName> = names.into_iter().map(Into::into).collect();
        let inherited = parent
            .as_deref()
            .map(LabelSchema::flattened_names)
            .unwrap_or_default();

        let mut seen: HashSet<&str> = inherited.iter().map(|name| name.as_ref()).collect();
        for (position, name) in own_names.iter().enumerate() {
            if name.is_empty() {
                return Err(LabelError::EmptyName {
                    position: inherited.len() + position,
                });
            }
            if !seen.insert(name.as_ref()) {
                return Err(LabelError::DuplicateName { name: name.clone() });
            }
        }

        let mut flattened = Vec::with_capacity(inherited.len() + own_names.len());
        flattened.extend_from_slice(inherited);
        flattened.extend_from_slice(&own_names);
        let depth = parent.as_deref().map_or(0, LabelSchema::depth) + 1;

        Ok(Arc::new(Self {
            own_names: own_names.into_boxed_slice(),
            parent,
            flattened: flattened.into_boxed_slice(),
            depth,
        }))
    }

    /// 本层级声明的标签名。
    pub fn own_names(&self) -> &[LabelName] {
        &self.own_names
    }

    /// 父层级 Schema。
    pub fn parent(&self) -> Option<&Arc<LabelSchema>> {
        self.parent.as_ref()
    }

    /// 祖先优先的扁平化标签名，返回构造时缓存的切片。
    pub fn flattened_names(&self) -> &[LabelName] {
        &self.flattened
    }

    /// 扁平化后的标签数量，即记录时缓冲区的宽度。
    pub fn width(&self) -> usize {
        self.flattened.len()
    }

    /// 层级数量，根 Schema 为 1。
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// 按祖先优先顺序返回整条层级链（最后一项为 `self`）。
    pub fn levels(&self) -> Vec<&LabelSchema> {
        let mut chain = Vec::with_capacity(self.depth);
        let mut cursor = Some(self);
        while let Some(level) = cursor {
            chain.push(level);
            cursor = level.parent.as_deref();
        }
        chain.reverse();
        chain
    }

    /// 标签名在扁平化序列中的位置。
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.flattened.iter().position(|candidate| candidate == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_keeps_declaration_order() {
        let schema = LabelSchema::root(["b", "a", "c"]).unwrap();
        assert_eq!(schema.own_names(), ["b", "a", "c"]);
        assert_eq!(schema.flattened_names(), schema.own_names());
        assert_eq!(schema.depth(), 1);
        assert!(schema.parent().is_none());
    }

    #[test]
    fn grandchild_flattens_ancestor_first() {
        let ambient = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
        let op = LabelSchema::child(&ambient, ["Operation"]).unwrap();
        let outcome = LabelSchema::child(&op, [String::from("Outcome")]).unwrap();

        assert_eq!(
            outcome.flattened_names(),
            ["ClusterId", "PodId", "Operation", "Outcome"]
        );
        assert_eq!(outcome.width(), 4);
        assert_eq!(outcome.depth(), 3);
        let own: Vec<_> = outcome
            .levels()
            .iter()
            .map(|level| level.own_names().len())
            .collect();
        assert_eq!(own, vec![2, 1, 1]);
        assert_eq!(outcome.position_of("Operation"), Some(2));
        assert_eq!(outcome.position_of("operation"), None);
    }

    #[test]
    fn duplicate_within_level_is_rejected() {
        let err = LabelSchema::root(["PodId", "PodId"]).unwrap_err();
        assert_eq!(
            err,
            LabelError::DuplicateName {
                name: Cow::Borrowed("PodId")
            }
        );
    }

    #[test]
    fn duplicate_against_grandparent_is_rejected() {
        let ambient = LabelSchema::root(["ClusterId"]).unwrap();
        let op = LabelSchema::child(&ambient, ["Operation"]).unwrap();
        let err = LabelSchema::child(&op, ["Region", "ClusterId"]).unwrap_err();
        assert_eq!(err.code(), crate::error::codes::DUPLICATE_NAME);
    }

    #[test]
    fn names_are_case_sensitive() {
        let schema = LabelSchema::root(["podid", "PodId"]).unwrap();
        assert_eq!(schema.width(), 2);
    }

    #[test]
    fn empty_name_reports_flattened_position() {
        let ambient = LabelSchema::root(["ClusterId", "PodId"]).unwrap();
        let err = LabelSchema::child(&ambient, ["Operation", ""]).unwrap_err();
        assert_eq!(err, LabelError::EmptyName { position: 3 });
    }

    #[test]
    fn empty_level_is_allowed() {
        let ambient = LabelSchema::root(["ClusterId"]).unwrap();
        let marker = LabelSchema::child(&ambient, Vec::<&'static str>::new()).unwrap();
        assert_eq!(marker.flattened_names(), ["ClusterId"]);
        assert_eq!(marker.depth(), 2);
    }
}
