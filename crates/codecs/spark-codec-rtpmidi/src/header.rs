//! recovery journal 三级结构中的头部：顶层头、system journal 头与 channel journal 头。
//!
//! 位域布局遵循 RFC 6295 §5：
//!
//! ```text
//! 顶层头      S | Y | A | H | TOTCHAN(4)            + checkpoint seqnum(16)
//! system 头   S | D | V | Q | F | X | LENGTH(10)
//! channel 头  S | CHAN(4) | H | LENGTH(10) | P C M W N E T A
//! ```

use core::fmt;

use crate::chapter::Chapter;

/// 顶层头 S 位：单包丢失即可恢复。
pub const JOURNAL_FLAG_S: u8 = 0x80;
/// 顶层头 Y 位：system journal 紧随顶层头出现。
pub const JOURNAL_FLAG_Y: u8 = 0x40;
/// 顶层头 A 位：journal 以 TOTCHAN + 1 个 channel journal 结尾。
pub const JOURNAL_FLAG_A: u8 = 0x20;
/// 顶层头 H 位：流中的 channel 使用 enhanced Chapter C 编码。
pub const JOURNAL_FLAG_H: u8 = 0x10;
/// 顶层头 TOTCHAN 字段掩码。
pub const JOURNAL_MASK_TOTCHAN: u8 = 0x0F;

/// 顶层头的定长部分：flags 字节 + 16 bit checkpoint seqnum。
pub const JOURNAL_HEADER_LEN: usize = 3;
/// system journal 头部长度。
pub const SYSTEM_JOURNAL_HEADER_LEN: usize = 2;
/// channel journal 头部长度。
pub const CHANNEL_JOURNAL_HEADER_LEN: usize = 3;

const LENGTH_MASK_10: u16 = 0x03FF;

/// recovery journal 顶层头。
///
/// - **Invariant**：`total_channels == (flags & 0x0F) + 1`，取值 1..=16；
/// - `checkpoint_seq` 为 checkpoint 报文的 RTP 序列号（网络字节序解码后）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JournalHeader {
    /// S 位。
    pub single_loss: bool,
    /// Y 位。
    pub system_journal_present: bool,
    /// A 位。
    pub channel_journals_present: bool,
    /// H 位。
    pub enhanced_chapter_c: bool,
    /// TOTCHAN + 1。
    pub total_channels: u8,
    /// checkpoint 报文序列号。
    pub checkpoint_seq: u16,
}

impl JournalHeader {
    /// 由 flags 字节与 checkpoint seqnum 组装。
    #[must_use]
    pub const fn from_parts(flags: u8, checkpoint_seq: u16) -> Self {
        Self {
            single_loss: flags & JOURNAL_FLAG_S != 0,
            system_journal_present: flags & JOURNAL_FLAG_Y != 0,
            channel_journals_present: flags & JOURNAL_FLAG_A != 0,
            enhanced_chapter_c: flags & JOURNAL_FLAG_H != 0,
            total_channels: (flags & JOURNAL_MASK_TOTCHAN) + 1,
            checkpoint_seq,
        }
    }

    /// 还原 flags 字节。
    #[must_use]
    pub const fn flags(&self) -> u8 {
        let mut flags = (self.total_channels.wrapping_sub(1)) & JOURNAL_MASK_TOTCHAN;
        if self.single_loss {
            flags |= JOURNAL_FLAG_S;
        }
        if self.system_journal_present {
            flags |= JOURNAL_FLAG_Y;
        }
        if self.channel_journals_present {
            flags |= JOURNAL_FLAG_A;
        }
        if self.enhanced_chapter_c {
            flags |= JOURNAL_FLAG_H;
        }
        flags
    }
}

/// system journal 头部。
///
/// 本 crate 只按 LENGTH 跳过 system journal；D/V/Q/F/X 标记原样暴露，
/// 具体 chapter 的解析属于 system journal 解码器的职责。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemJournalHeader {
    /// S 位。
    pub single_loss: bool,
    /// D 位：简单系统命令 chapter。
    pub simple_system: bool,
    /// V 位：Active Sense chapter。
    pub active_sense: bool,
    /// Q 位：Sequencer State chapter。
    pub sequencer_state: bool,
    /// F 位：MIDI Time Code chapter。
    pub time_code: bool,
    /// X 位：System Exclusive chapter。
    pub system_exclusive: bool,
    /// 整个 system journal 的长度（含头部）。
    pub length: u16,
}

impl SystemJournalHeader {
    /// 从 16 bit 头部解码。
    #[must_use]
    pub const fn from_u16(raw: u16) -> Self {
        Self {
            single_loss: raw & 0x8000 != 0,
            simple_system: raw & 0x4000 != 0,
            active_sense: raw & 0x2000 != 0,
            sequencer_state: raw & 0x1000 != 0,
            time_code: raw & 0x0800 != 0,
            system_exclusive: raw & 0x0400 != 0,
            length: raw & LENGTH_MASK_10,
        }
    }
}

/// channel journal 头部中的 chapter 存在位集合。
///
/// 位序与线格式一致：P 为最高位，A 为最低位。
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ChapterFlags(u8);

impl ChapterFlags {
    /// 空集合。
    pub const EMPTY: Self = Self(0);

    /// 由原始字节构造。
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// 原始字节。
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// 是否包含某个 chapter。
    #[must_use]
    pub const fn contains(self, chapter: Chapter) -> bool {
        self.0 & chapter.flag() != 0
    }

    /// 加入一个 chapter。
    #[must_use]
    pub const fn with(self, chapter: Chapter) -> Self {
        Self(self.0 | chapter.flag())
    }

    /// 是否没有任何 chapter。
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// 存在的 chapter 数。
    #[must_use]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// 按线格式固定顺序（P C M W N E T A）遍历存在的 chapter。
    pub fn iter(self) -> impl Iterator<Item = Chapter> {
        Chapter::ALL
            .into_iter()
            .filter(move |chapter| self.contains(*chapter))
    }
}

impl fmt::Debug for ChapterFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ChapterFlags(")?;
        for chapter in Chapter::ALL {
            if self.contains(chapter) {
                write!(f, "{}", chapter.letter())?;
            } else {
                f.write_str("-")?;
            }
        }
        f.write_str(")")
    }
}

impl FromIterator<Chapter> for ChapterFlags {
    fn from_iter<T: IntoIterator<Item = Chapter>>(iter: T) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// channel journal 头部。
///
/// - `channel` 取自 CHAN 字段，channel 身份不依赖循环顺序；
/// - `length` 覆盖整个 channel journal（含 3 字节头部），默认只作参考，不参与边界判断。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelJournalHeader {
    /// S 位。
    pub single_loss: bool,
    /// MIDI channel 号（0-15）。
    pub channel: u8,
    /// H 位：该 channel 的 Chapter C 使用 enhanced 编码。
    pub enhanced_chapter_c: bool,
    /// 声明长度。
    pub length: u16,
    /// chapter 存在位。
    pub chapters: ChapterFlags,
}

impl ChannelJournalHeader {
    /// 从 24 bit 字段（位于 `u32` 低 24 位）解码。
    #[must_use]
    pub const fn from_u24(raw: u32) -> Self {
        Self {
            single_loss: raw & 0x80_0000 != 0,
            channel: ((raw >> 19) & 0x0F) as u8,
            enhanced_chapter_c: raw & 0x04_0000 != 0,
            length: ((raw >> 8) as u16) & LENGTH_MASK_10,
            chapters: ChapterFlags::from_bits((raw & 0xFF) as u8),
        }
    }
}
