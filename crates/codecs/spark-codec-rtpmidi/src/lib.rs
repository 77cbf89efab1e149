#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

//! # spark-codec-rtpmidi
//!
//! ## 教案目的（Why）
//! - **定位**：RTP-MIDI（RFC 6295）recovery journal 的增量解码器。journal 携带足以从丢包中恢复
//!   MIDI 状态的冗余信息，接收端在解析 command list 之后、处理下一个报文之前必须先确定它的边界。
//! - **架构角色**：位于 RTP 拆包之后的 payload 解析流水线中，与 `spark-codec-rtp` 的报文解析互补：
//!   后者给出 payload 区间，本 crate 在该区间内走完 journal 并交还推进后的游标。
//! - **设计策略**：只做结构校验与长度计算，不解释 MIDI 语义；输入可能分片到达，
//!   因此每一步读取前都先做「最小需求长度」预算，不足时给出可重试的 `Incomplete` 结局。
//!
//! ## 交互契约（What）
//! - **输入**：实现 [`JournalInput`] 的只读缓冲（切片、`Vec<u8>`、`VecDeque<u8>` 环形缓冲），
//!   以及调用方持有的 [`DecodeCursor`]；
//! - **输出**：
//!   1. [`DecodeOutcome::Complete`] 携带 [`JournalSection`]（顶层头、system journal 头、
//!      各 channel journal 及其 chapter 区间）；
//!   2. [`DecodeOutcome::Incomplete`] 携带 [`NeedMore`]，说明至少还需要多少字节；
//!   3. [`JournalError`] 表示结构违规，对本 journal 实例致命；
//! - **快速分流**：[`JournalStatus::of`] 把以上三种结局折叠为 `Ok / NotEnoughData / StructuralViolation`。
//!
//! ## 实现策略（How）
//! - `cursor` 提供预算与字节读取，`header` 拆解三级头部位域，`chapter` 按 P C M W N E T A
//!   顺序分派 8 种 chapter，`journal` 串起整体流程并在出口记录 `tracing` 事件；
//! - `config` 允许部署方收紧校验（channel LENGTH 交叉校验、体积上限、enhanced Chapter C 开关）。
//!
//! ## 风险提示（Trade-offs）
//! - **不透明负载**：chapter 负载、system journal 内容只按长度跳过，畸形内容不会被发现；
//! - **无状态**：解码器不缓存历史，数据不足时游标原样退回，重试会重复走过已到达的前缀；
//! - **no_std**：关闭 `std` 后依赖 `alloc`，错误类型退化为手写 `Display`。

extern crate alloc;

pub mod chapter;
pub mod config;
pub mod cursor;
pub mod error;
pub mod header;
pub mod journal;

pub use chapter::{Chapter, ChapterLayout, ChapterSpan, LogChapterHeader, NoteChapterHeader};
pub use config::JournalDecoderConfig;
pub use cursor::{ByteSpan, DecodeCursor, JournalInput};
pub use error::{DecodeOutcome, JournalError, JournalStatus, NeedMore};
pub use header::{ChannelJournalHeader, ChapterFlags, JournalHeader, SystemJournalHeader};
pub use journal::{ChannelJournal, JournalDecoder, JournalSection, decode_journal};
