//! # 解码结果与错误模型
//!
//! ## 角色定位（Why）
//! - 每次解码尝试只有三种结局：完整通过、数据不足、结构违规；前两者是正常控制流，只有最后一种是错误；
//! - 因此「数据不足」以 [`DecodeOutcome::Incomplete`] 承载，结构违规以 [`JournalError`] 走 `Err` 分支，
//!   与 spark 编解码契约中 `DecodeOutcome` + 错误的划分保持一致。
//!
//! ## 契约（What）
//! - 所有 [`JournalError`] 对本 journal 实例都是致命的：调用方不得在同一偏移重试，应丢弃报文并视情况请求重同步；
//! - [`NeedMore`] 只是等待信号，不带超时语义，何时放弃由传输层决定。

use core::fmt;

#[cfg(feature = "std")]
use thiserror::Error;

use crate::chapter::Chapter;

/// 输入不足时的缺口描述。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedMore {
    /// 未能满足的预算（自输入起点计的最小长度）。
    pub required: usize,
    /// 检查时输入的可用长度。
    pub available: usize,
}

impl NeedMore {
    /// 还差多少字节。
    #[must_use]
    pub const fn missing(&self) -> usize {
        self.required.saturating_sub(self.available)
    }
}

impl fmt::Display for NeedMore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recovery journal needs {} bytes, only {} available",
            self.required, self.available
        )
    }
}

/// 一次增量解码尝试的非错误结局。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome<T> {
    /// 结构完整并已通过校验。
    Complete(T),
    /// 目前为止结构一致，但输入尚未到齐；待更多字节到达后从快照重试。
    Incomplete(NeedMore),
}

impl<T> DecodeOutcome<T> {
    /// 是否为 `Complete`。
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }

    /// 取出完整结果；`Incomplete` 返回 `None`。
    pub fn into_complete(self) -> Option<T> {
        match self {
            Self::Complete(value) => Some(value),
            Self::Incomplete(_) => None,
        }
    }

    /// 对完整结果做映射。
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> DecodeOutcome<U> {
        match self {
            Self::Complete(value) => DecodeOutcome::Complete(f(value)),
            Self::Incomplete(need) => DecodeOutcome::Incomplete(need),
        }
    }
}

/// 三态解码状态，供不关心细节的调用方快速分流。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JournalStatus {
    /// journal 及其嵌套结构全部校验通过，总长度已知。
    Ok,
    /// 输入暂不完整。
    NotEnoughData,
    /// 观察到格式禁止的取值组合。
    StructuralViolation,
}

impl JournalStatus {
    /// 由一次解码结果推导状态。
    #[must_use]
    pub fn of<T>(result: &Result<DecodeOutcome<T>, JournalError>) -> Self {
        match result {
            Ok(DecodeOutcome::Complete(_)) => Self::Ok,
            Ok(DecodeOutcome::Incomplete(_)) => Self::NotEnoughData,
            Err(_) => Self::StructuralViolation,
        }
    }

    /// 稳定的字符串标识，用于日志字段。
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NotEnoughData => "not_enough_data",
            Self::StructuralViolation => "structural_violation",
        }
    }
}

impl fmt::Display for JournalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// recovery journal 的结构违规。
///
/// # 教案式说明
/// - **意图 (Why)**：区分具体违规点，方便接收端在丢包与请求重同步之间做决策，也便于日志定位发送端缺陷；
/// - **契约 (What)**：所有变体对应 [`JournalStatus::StructuralViolation`]；启用 `std` 时派生
///   [`thiserror::Error`]，否则提供等价的 `Display`；
/// - **风险 (Trade-offs)**：只校验会影响长度计算的组合，其余畸形内容按「依计算长度跳过」的保守策略信任。
#[cfg_attr(feature = "std", derive(Error))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalError {
    /// Chapter N 头部出现 LOW > HIGH，且不是 (15, 0) / (15, 1) 两个保留组合。
    #[cfg_attr(
        feature = "std",
        error("chapter N header carries LOW={low} > HIGH={high} outside the reserved pairs")
    )]
    InvalidNoteRange {
        /// LOW 半字节。
        low: u8,
        /// HIGH 半字节。
        high: u8,
    },

    /// 带 LENGTH 字段的 chapter 声明的长度连自身头部都容纳不下。
    #[cfg_attr(
        feature = "std",
        error("chapter {chapter} declares length {length}, shorter than its own header")
    )]
    ChapterTooShort {
        /// 出问题的 chapter。
        chapter: Chapter,
        /// 头部声明的长度（字节）。
        length: u16,
    },

    /// system journal 声明的长度小于 2 字节头部。
    #[cfg_attr(
        feature = "std",
        error("system journal declares length {length}, shorter than its 2-byte header")
    )]
    SystemJournalTooShort {
        /// 头部声明的长度（字节）。
        length: u16,
    },

    /// 开启长度交叉校验后，channel journal 声明长度与实际走过的字节数不一致。
    #[cfg_attr(
        feature = "std",
        error("channel {channel} journal declares {declared} bytes but {consumed} were walked")
    )]
    ChannelLengthMismatch {
        /// 头部 CHAN 字段（0-15）。
        channel: u8,
        /// 头部 LENGTH 字段。
        declared: u16,
        /// 实际走过的字节数（含 3 字节头部）。
        consumed: usize,
    },

    /// journal 需求超过配置的体积上限。
    #[cfg_attr(
        feature = "std",
        error("recovery journal requires {required} bytes, exceeding the limit of {limit}")
    )]
    BudgetExceeded {
        /// 配置的上限。
        limit: usize,
        /// 自 journal 起点计的需求。
        required: usize,
    },

    /// 配置禁止 enhanced Chapter C，但头部 H 位被置位。
    #[cfg_attr(
        feature = "std",
        error("enhanced chapter C encoding is flagged but disabled by configuration")
    )]
    EnhancedChapterCDisabled,
}

impl JournalError {
    /// 稳定错误码，便于日志聚合与告警。
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidNoteRange { .. } => "rtpmidi.journal.note_range",
            Self::ChapterTooShort { .. } => "rtpmidi.journal.chapter_length",
            Self::SystemJournalTooShort { .. } => "rtpmidi.journal.system_length",
            Self::ChannelLengthMismatch { .. } => "rtpmidi.journal.channel_length",
            Self::BudgetExceeded { .. } => "rtpmidi.journal.budget_exceeded",
            Self::EnhancedChapterCDisabled => "rtpmidi.journal.enhanced_c",
        }
    }
}

#[cfg(not(feature = "std"))]
impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidNoteRange { low, high } => write!(
                f,
                "chapter N header carries LOW={low} > HIGH={high} outside the reserved pairs"
            ),
            Self::ChapterTooShort { chapter, length } => write!(
                f,
                "chapter {chapter} declares length {length}, shorter than its own header"
            ),
            Self::SystemJournalTooShort { length } => write!(
                f,
                "system journal declares length {length}, shorter than its 2-byte header"
            ),
            Self::ChannelLengthMismatch {
                channel,
                declared,
                consumed,
            } => write!(
                f,
                "channel {channel} journal declares {declared} bytes but {consumed} were walked"
            ),
            Self::BudgetExceeded { limit, required } => write!(
                f,
                "recovery journal requires {required} bytes, exceeding the limit of {limit}"
            ),
            Self::EnhancedChapterCDisabled => {
                f.write_str("enhanced chapter C encoding is flagged but disabled by configuration")
            }
        }
    }
}

/// 解码内部的提前返回信号，使各级解码函数可以统一用 `?` 传播两类中止。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Halt {
    Incomplete(NeedMore),
    Violation(JournalError),
}

impl From<NeedMore> for Halt {
    fn from(need: NeedMore) -> Self {
        Self::Incomplete(need)
    }
}

impl From<JournalError> for Halt {
    fn from(err: JournalError) -> Self {
        Self::Violation(err)
    }
}
