//! 解码器配置。
//!
//! # 设计背景（Why）
//! - 默认行为与 journal 的保守解码策略一致：channel journal 的 LENGTH 仅作参考，不设体积上限；
//! - 部署方可按对端实现的成熟度收紧校验，例如开启长度交叉校验或限制单个 journal 的体积，
//!   与 spark 解码上下文中的 `max_frame_size` 预算同一思路。
//!
//! # 契约说明（What）
//! - 启用 `serde` feature 后可从 TOML/JSON 等配置源反序列化，缺省字段取 [`Default`]；
//! - 配置只影响校验强度，不改变对合法 journal 计算出的长度。

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// recovery journal 解码器配置。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default, deny_unknown_fields))]
pub struct JournalDecoderConfig {
    /// 将每个 channel journal 声明的 LENGTH 与实际走过的字节数交叉校验，不一致即判定结构违规。
    pub verify_channel_length: bool,
    /// 单个 journal 的体积上限（字节）；`None` 表示不限制。
    pub max_journal_len: Option<usize>,
    /// 是否接受顶层头 H 位（enhanced Chapter C 编码）。
    pub allow_enhanced_chapter_c: bool,
}

impl JournalDecoderConfig {
    /// 默认配置。
    #[must_use]
    pub const fn new() -> Self {
        Self {
            verify_channel_length: false,
            max_journal_len: None,
            allow_enhanced_chapter_c: true,
        }
    }

    /// 严格配置：开启长度交叉校验，其余保持默认。
    #[must_use]
    pub const fn strict() -> Self {
        Self {
            verify_channel_length: true,
            ..Self::new()
        }
    }

    /// 设置体积上限。
    #[must_use]
    pub const fn with_max_journal_len(mut self, limit: usize) -> Self {
        self.max_journal_len = Some(limit);
        self
    }
}

impl Default for JournalDecoderConfig {
    fn default() -> Self {
        Self::new()
    }
}
