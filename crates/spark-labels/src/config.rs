//! 缓冲池配置。
//!
//! # 契约说明（What）
//! - [`LabelPoolConfig`] 通过 `serde` 反序列化，缺省字段取默认值，未知字段直接拒绝；
//! - 启用 `toml_config` Feature（默认开启）时可用 [`LabelPoolConfig::from_toml_str`] 从 TOML 文本加载；
//! - 所有入口都会调用 [`LabelPoolConfig::validate`]，非法配置返回 [`LabelError::InvalidConfig`]。

use serde::Deserialize;

use crate::error::LabelError;

/// 入池的默认最大宽度。
pub const DEFAULT_MAX_POOLED_WIDTH: usize = 32;
/// 每个宽度默认保留的空闲缓冲数。
pub const DEFAULT_MAX_IDLE_PER_WIDTH: usize = 64;
/// `max_pooled_width` 的上限；缓冲池为 `0..=max_pooled_width` 的每个宽度预先建立分桶。
pub const MAX_POOLED_WIDTH_LIMIT: usize = 1024;
/// `prewarm_per_width` 的上限。
pub const MAX_PREWARM_PER_WIDTH: usize = 1024;

/// 标签值缓冲池的容量策略。
///
/// ```rust
/// use spark_labels::LabelPoolConfig;
///
/// let config = LabelPoolConfig::from_toml_str("max_idle_per_width = 8").unwrap();
/// assert_eq!(config.max_idle_per_width, 8);
/// assert_eq!(config.max_pooled_width, 32);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LabelPoolConfig {
    /// 入池的最大宽度；更宽的缓冲每次新分配、归还即释放。取值范围 `1..=MAX_POOLED_WIDTH_LIMIT`。
    pub max_pooled_width: usize,
    /// 每个宽度最多保留的空闲缓冲数。
    pub max_idle_per_width: usize,
    /// 构建注册表时，为每个被使用的宽度预先分配的缓冲数。不得超过 `max_idle_per_width` 与
    /// `MAX_PREWARM_PER_WIDTH`。
    pub prewarm_per_width: usize,
}

impl Default for LabelPoolConfig {
    fn default() -> Self {
        Self {
            max_pooled_width: DEFAULT_MAX_POOLED_WIDTH,
            max_idle_per_width: DEFAULT_MAX_IDLE_PER_WIDTH,
            prewarm_per_width: 0,
        }
    }
}

impl LabelPoolConfig {
    /// 校验配置约束。
    pub fn validate(&self) -> Result<(), LabelError> {
        if self.max_pooled_width == 0 {
            return Err(LabelError::InvalidConfig {
                reason: "max_pooled_width 必须大于 0".into(),
            });
        }
        if self.max_pooled_width > MAX_POOLED_WIDTH_LIMIT {
            return Err(LabelError::InvalidConfig {
                reason: format!(
                    "max_pooled_width ({}) 超过上限 {MAX_POOLED_WIDTH_LIMIT}",
                    self.max_pooled_width
                ),
            });
        }
        if self.prewarm_per_width > MAX_PREWARM_PER_WIDTH {
            return Err(LabelError::InvalidConfig {
                reason: format!(
                    "prewarm_per_width ({}) 超过上限 {MAX_PREWARM_PER_WIDTH}",
                    self.prewarm_per_width
                ),
            });
        }
        if self.prewarm_per_width > self.max_idle_per_width {
            return Err(LabelError::InvalidConfig {
                reason: format!(
                    "prewarm_per_width ({}) 不得超过 max_idle_per_width ({})",
                    self.prewarm_per_width, self.max_idle_per_width
                ),
            });
        }
        Ok(())
    }

    /// 从 TOML 文本解析并校验配置。
    #[cfg(feature = "toml_config")]
    pub fn from_toml_str(source: &str) -> Result<Self, LabelError> {
        let config: Self = toml::from_str(source).map_err(|err| LabelError::InvalidConfig {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}
