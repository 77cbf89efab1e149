//! # recovery journal 解码入口
//!
//! ## 教案目的（Why）
//! - **定位**：RTP-MIDI 报文中 journal 段的解析器，确定该段占用多少字节、这些字节是否已经到齐，
//!   并沿途校验结构不变量；
//! - **架构角色**：journal 只是整包解码中的一个阶段。调用方（报文流水线）持有输入缓冲与 [`DecodeCursor`]，
//!   本模块只负责推进，成功后游标正好停在 journal 之后，供 command list 等后续段继续解析；
//! - **设计策略**：三级结构（顶层头 → system journal → channel journal 循环 → chapter）逐级调用，
//!   每一级都先扩预算再读取，输入不足与结构违规立即向上返回，不做局部恢复。
//!
//! ## 交互契约（What）
//! - **输入**：实现 [`JournalInput`] 的只读缓冲，游标指向 journal 首字节；
//! - **输出**：
//!   1. `Ok(DecodeOutcome::Complete(section))`：journal 完整且合法，游标推进到 journal 末尾；
//!   2. `Ok(DecodeOutcome::Incomplete(need))`：结构一致但字节不足，游标恢复为调用前的值；
//!   3. `Err(JournalError)`：结构违规，本 journal 实例不可再解码；
//! - **重试**：`Incomplete` 时游标不留下任何部分推进，待更多字节到达后用同一个游标再次调用即可；
//!   同一输入前缀上的重复调用结果相同，不依赖历史调用。
//!
//! ## 风险提示（Trade-offs）
//! - system journal 与 chapter 负载只按长度跳过，解析其内容是下游协作方的职责；
//! - channel journal 的 LENGTH 默认不参与边界判断，严格模式见 [`JournalDecoderConfig::verify_channel_length`]。

use alloc::vec::Vec;

use tracing::{debug, trace};

use crate::chapter::ChapterSpan;
use crate::config::JournalDecoderConfig;
use crate::cursor::{ByteReader, ByteSpan, DecodeCursor, JournalInput};
use crate::error::{DecodeOutcome, Halt, JournalError};
use crate::header::{
    CHANNEL_JOURNAL_HEADER_LEN, ChannelJournalHeader, JOURNAL_HEADER_LEN, JournalHeader,
    SYSTEM_JOURNAL_HEADER_LEN, SystemJournalHeader,
};

/// 一次成功解码得到的 journal 结构。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSection {
    /// 顶层头。
    pub header: JournalHeader,
    /// system journal 头部（Y=1 时存在）。
    pub system: Option<SystemJournalHeader>,
    /// channel journal 列表，按线上出现顺序排列。
    pub channels: Vec<ChannelJournal>,
    /// journal 在输入中的完整区间。
    pub span: ByteSpan,
}

impl JournalSection {
    /// journal 总字节数。
    #[must_use]
    pub fn len(&self) -> usize {
        self.span.len()
    }

    /// journal 是否为空（合法 journal 至少含 3 字节头部，恒为 `false`）。
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.span.is_empty()
    }

    /// 按 MIDI channel 号查找 channel journal。
    #[must_use]
    pub fn channel(&self, channel: u8) -> Option<&ChannelJournal> {
        self.channels
            .iter()
            .find(|journal| journal.header.channel == channel)
    }
}

/// 单个 channel journal。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelJournal {
    /// channel journal 头部。
    pub header: ChannelJournalHeader,
    /// 存在的 chapter，按 P C M W N E T A 顺序排列。
    pub chapters: Vec<ChapterSpan>,
    /// 含头部的完整区间。
    pub span: ByteSpan,
}

/// recovery journal 解码器。
///
/// # 教案式说明
/// - **Why**：封装配置，调用方在会话建立时构造一次，之后对每个入站报文复用；
/// - **What**：无内部可变状态，`decode` 只修改调用方传入的游标；
/// - **How**：解码逻辑委托给私有的 `decode_section`，出口处把内部中止信号映射为公开结果并记录日志。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JournalDecoder {
    config: JournalDecoderConfig,
}

impl JournalDecoder {
    /// 使用指定配置构造解码器。
    #[must_use]
    pub const fn new(config: JournalDecoderConfig) -> Self {
        Self { config }
    }

    /// 当前配置。
    #[must_use]
    pub const fn config(&self) -> &JournalDecoderConfig {
        &self.config
    }

    /// 从 `cursor` 处解码一个 recovery journal。
    ///
    /// - **前置条件**：`cursor.position()` 指向 journal 首字节（顶层头 flags 字节）；
    /// - **后置条件**：返回 `Complete` 时 `cursor.position()` 指向 journal 之后的第一个字节，
    ///   且对从零开始的游标有 `cursor.required() == cursor.position()`；返回 `Incomplete` 时
    ///   `cursor` 与调用前完全相同；
    /// - **失败**：见模块文档中的三种结局。
    pub fn decode<I>(
        &self,
        input: &I,
        cursor: &mut DecodeCursor,
    ) -> Result<DecodeOutcome<JournalSection>, JournalError>
    where
        I: JournalInput + ?Sized,
    {
        let snapshot = *cursor;
        let start = cursor.position();
        let mut reader = ByteReader::new(input, cursor, &self.config);
        match self.decode_section(&mut reader, start) {
            Ok(section) => {
                debug!(
                    offset = start,
                    len = section.len(),
                    channels = section.channels.len(),
                    system = section.system.is_some(),
                    "recovery journal decoded"
                );
                Ok(DecodeOutcome::Complete(section))
            }
            Err(Halt::Incomplete(need)) => {
                trace!(
                    offset = start,
                    required = need.required,
                    available = need.available,
                    reached = reader.position(),
                    "recovery journal incomplete"
                );
                *cursor = snapshot;
                Ok(DecodeOutcome::Incomplete(need))
            }
            Err(Halt::Violation(err)) => {
                debug!(
                    offset = start,
                    consumed = reader.consumed(),
                    code = err.code(),
                    error = %err,
                    "recovery journal rejected"
                );
                Err(err)
            }
        }
    }

    fn decode_section<I>(
        &self,
        reader: &mut ByteReader<'_, I>,
        start: usize,
    ) -> Result<JournalSection, Halt>
    where
        I: JournalInput + ?Sized,
    {
        reader.require(1)?;
        let flags = reader.read_u8()?;
        reader.require(JOURNAL_HEADER_LEN - 1)?;
        let checkpoint_seq = reader.read_u16()?;
        let header = JournalHeader::from_parts(flags, checkpoint_seq);

        if header.enhanced_chapter_c && !self.config.allow_enhanced_chapter_c {
            return Err(JournalError::EnhancedChapterCDisabled.into());
        }

        let system = if header.system_journal_present {
            Some(skip_system_journal(reader)?)
        } else {
            None
        };

        let channels = if header.channel_journals_present {
            self.decode_channels(reader, header.total_channels)?
        } else {
            Vec::new()
        };

        Ok(JournalSection {
            header,
            system,
            channels,
            span: reader.span_from(start),
        })
    }

    fn decode_channels<I>(
        &self,
        reader: &mut ByteReader<'_, I>,
        total_channels: u8,
    ) -> Result<Vec<ChannelJournal>, Halt>
    where
        I: JournalInput + ?Sized,
    {
        let mut channels = Vec::with_capacity(usize::from(total_channels));
        for _ in 0..total_channels {
            channels.push(self.decode_channel(reader)?);
        }
        Ok(channels)
    }

    fn decode_channel<I>(&self, reader: &mut ByteReader<'_, I>) -> Result<ChannelJournal, Halt>
    where
        I: JournalInput + ?Sized,
    {
        let start = reader.position();
        reader.require(CHANNEL_JOURNAL_HEADER_LEN)?;
        let header = ChannelJournalHeader::from_u24(reader.read_u24()?);

        let mut chapters = Vec::with_capacity(header.chapters.len());
        for chapter in header.chapters.iter() {
            let chapter_start = reader.position();
            let layout = chapter.decode(reader)?;
            let span = reader.span_from(chapter_start);
            trace!(
                channel = header.channel,
                chapter = chapter.as_str(),
                offset = span.offset(),
                len = span.len(),
                "chapter walked"
            );
            chapters.push(ChapterSpan {
                chapter,
                layout,
                span,
            });
        }

        let span = reader.span_from(start);
        if self.config.verify_channel_length && span.len() != usize::from(header.length) {
            return Err(JournalError::ChannelLengthMismatch {
                channel: header.channel,
                declared: header.length,
                consumed: span.len(),
            }
            .into());
        }

        Ok(ChannelJournal {
            header,
            chapters,
            span,
        })
    }
}

/// system journal 按 LENGTH 整体跳过；LENGTH 覆盖含头部在内的全部字节。
fn skip_system_journal<I>(reader: &mut ByteReader<'_, I>) -> Result<SystemJournalHeader, Halt>
where
    I: JournalInput + ?Sized,
{
    reader.require(SYSTEM_JOURNAL_HEADER_LEN)?;
    let header = SystemJournalHeader::from_u16(reader.read_u16()?);
    let length = usize::from(header.length);
    if length < SYSTEM_JOURNAL_HEADER_LEN {
        return Err(JournalError::SystemJournalTooShort {
            length: header.length,
        }
        .into());
    }
    let body = length - SYSTEM_JOURNAL_HEADER_LEN;
    reader.require(body)?;
    reader.skip(body)?;
    trace!(len = length, "system journal skipped");
    Ok(header)
}

/// 使用默认配置解码 recovery journal。
pub fn decode_journal<I>(
    input: &I,
    cursor: &mut DecodeCursor,
) -> Result<DecodeOutcome<JournalSection>, JournalError>
where
    I: JournalInput + ?Sized,
{
    JournalDecoder::default().decode(input, cursor)
}
