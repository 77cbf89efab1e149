//! # channel journal 的 chapter 解码
//!
//! ## 设计意图（Why）
//! - 8 个 chapter 存在位各自选择一套独立的子语法，这里以 [`Chapter`] 枚举显式列出，
//!   每个变体对应一个解码函数，由 channel journal 循环按线格式固定顺序分派；
//! - 本模块只回答「这个 chapter 占多少字节、字节是否到齐、长度字段是否自洽」，
//!   负载本身（音符、program 号、压力值……）保持不透明，由下游事件消费者按 [`ChapterSpan`] 定位解析。
//!
//! ## 线格式（What）
//!
//! | chapter | 头部 | 总长度 |
//! |---------|------|--------|
//! | P Program Change | 无 | 3 |
//! | C Control Change | `S \| LEN(7)` | `1 + 2*(LEN+1)` |
//! | M Parameter System | `S P E U W Z \| LENGTH(10)` | `LENGTH`（含头部） |
//! | W Pitch Wheel | 无 | 2 |
//! | N Note On/Off | `B \| LEN(7) \| LOW(4) \| HIGH(4)` | `2 + 2*LEN' + offbit` |
//! | E Note Command Extras | `S \| LEN(7)` | `1 + 2*(LEN+1)` |
//! | T Channel Aftertouch | 无 | 1 |
//! | A Poly Aftertouch | `S \| LEN(7)` | `1 + 2*(LEN+1)` |
//!
//! ## 实现策略（How）
//! - 每个函数先 `require` 头部，再读头部推导剩余长度，再 `require` 剩余长度后整体跳过；
//!   绝不先读后回滚，`NotEnoughData` 语义因此与预算检查严格一致。

use core::fmt;

use crate::cursor::{ByteReader, ByteSpan, JournalInput};
use crate::error::{Halt, JournalError};

/// Chapter P 固定长度。
pub const CHAPTER_P_LEN: usize = 3;
/// Chapter W 固定长度。
pub const CHAPTER_W_LEN: usize = 2;
/// Chapter T 固定长度。
pub const CHAPTER_T_LEN: usize = 1;

/// 每条 log（note/controller + value）固定 2 字节。
const LOG_ENTRY_LEN: usize = 2;
const LOG_LEN_MASK: u8 = 0x7F;
const CHAPTER_M_LENGTH_MASK: u16 = 0x03FF;
const CHAPTER_M_FLAG_P: u16 = 0x4000;
const CHAPTER_M_HEADER_LEN: u16 = 2;

/// channel journal 中的 chapter 种类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Chapter {
    /// P：Program Change。
    ProgramChange,
    /// C：Control Change。
    ControlChange,
    /// M：Parameter System（RPN/NRPN）。
    ParameterSystem,
    /// W：Pitch Wheel。
    PitchWheel,
    /// N：Note On/Off。
    Note,
    /// E：Note Command Extras。
    NoteExtras,
    /// T：Channel Aftertouch。
    ChannelAftertouch,
    /// A：Poly Aftertouch。
    PolyAftertouch,
}

impl Chapter {
    /// 线格式中的固定出现顺序。
    pub const ALL: [Chapter; 8] = [
        Chapter::ProgramChange,
        Chapter::ControlChange,
        Chapter::ParameterSystem,
        Chapter::PitchWheel,
        Chapter::Note,
        Chapter::NoteExtras,
        Chapter::ChannelAftertouch,
        Chapter::PolyAftertouch,
    ];

    /// RFC 6295 中的字母代号。
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Chapter::ProgramChange => 'P',
            Chapter::ControlChange => 'C',
            Chapter::ParameterSystem => 'M',
            Chapter::PitchWheel => 'W',
            Chapter::Note => 'N',
            Chapter::NoteExtras => 'E',
            Chapter::ChannelAftertouch => 'T',
            Chapter::PolyAftertouch => 'A',
        }
    }

    /// channel journal 头部最低字节中的存在位。
    #[must_use]
    pub const fn flag(self) -> u8 {
        match self {
            Chapter::ProgramChange => 0x80,
            Chapter::ControlChange => 0x40,
            Chapter::ParameterSystem => 0x20,
            Chapter::PitchWheel => 0x10,
            Chapter::Note => 0x08,
            Chapter::NoteExtras => 0x04,
            Chapter::ChannelAftertouch => 0x02,
            Chapter::PolyAftertouch => 0x01,
        }
    }

    /// 稳定的字符串标识，用于日志字段。
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Chapter::ProgramChange => "program_change",
            Chapter::ControlChange => "control_change",
            Chapter::ParameterSystem => "parameter_system",
            Chapter::PitchWheel => "pitch_wheel",
            Chapter::Note => "note",
            Chapter::NoteExtras => "note_extras",
            Chapter::ChannelAftertouch => "channel_aftertouch",
            Chapter::PolyAftertouch => "poly_aftertouch",
        }
    }

    /// 在读取器当前位置解码本 chapter，并将游标推进到 chapter 末尾。
    pub(crate) fn decode<I>(self, reader: &mut ByteReader<'_, I>) -> Result<ChapterLayout, Halt>
    where
        I: JournalInput + ?Sized,
    {
        match self {
            Chapter::ProgramChange => {
                skip_fixed(reader, CHAPTER_P_LEN)?;
                Ok(ChapterLayout::ProgramChange)
            }
            Chapter::ControlChange => decode_log_chapter(reader).map(ChapterLayout::ControlChange),
            Chapter::ParameterSystem => decode_parameter_system(reader),
            Chapter::PitchWheel => {
                skip_fixed(reader, CHAPTER_W_LEN)?;
                Ok(ChapterLayout::PitchWheel)
            }
            Chapter::Note => decode_note(reader).map(ChapterLayout::Note),
            Chapter::NoteExtras => decode_log_chapter(reader).map(ChapterLayout::NoteExtras),
            Chapter::ChannelAftertouch => {
                skip_fixed(reader, CHAPTER_T_LEN)?;
                Ok(ChapterLayout::ChannelAftertouch)
            }
            Chapter::PolyAftertouch => {
                decode_log_chapter(reader).map(ChapterLayout::PolyAftertouch)
            }
        }
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

/// 单个 chapter 解码后得到的结构信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterLayout {
    /// 定长 3 字节。
    ProgramChange,
    /// controller log 列表。
    ControlChange(LogChapterHeader),
    /// 声明长度（含头部）。
    ParameterSystem {
        /// LENGTH 字段。
        length: u16,
        /// P 位：头部后跟随 PENDING 字节。
        pending: bool,
    },
    /// 定长 2 字节。
    PitchWheel,
    /// note log 列表 + offbit 字节。
    Note(NoteChapterHeader),
    /// note command extras log 列表。
    NoteExtras(LogChapterHeader),
    /// 定长 1 字节。
    ChannelAftertouch,
    /// poly aftertouch log 列表。
    PolyAftertouch(LogChapterHeader),
}

/// chapter 在输入中的位置及其结构信息。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChapterSpan {
    /// chapter 种类。
    pub chapter: Chapter,
    /// 解码出的结构信息。
    pub layout: ChapterLayout,
    /// 含头部的完整字节区间。
    pub span: ByteSpan,
}

/// Chapter N 的 16 bit 头部。
///
/// ### Why
/// - 该 chapter 的总长度同时取决于两个独立编码、又相互约束的子字段（log 数与 LOW/HIGH 窗口），
///   是整个 journal 中最容易出错的地方，因此把解析与合法性判断收敛到一个纯函数里单独测试。
///
/// ### What
/// - `LOW <= HIGH`：offbit 字节数为 `HIGH - LOW + 1`；
/// - `(15, 0)` 与 `(15, 1)` 为保留组合，offbit 字节数为 0；
/// - 其余 `LOW > HIGH` 组合一律视为结构违规；
/// - `LEN == 127 && (LOW, HIGH) == (15, 0)` 表示 128 条 note log（7 bit 字段无法直接表达 128）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteChapterHeader {
    b: bool,
    log_count: u8,
    low: u8,
    high: u8,
}

impl NoteChapterHeader {
    /// 解析并校验头部。
    pub fn parse(raw: u16) -> Result<Self, JournalError> {
        let b = raw & 0x8000 != 0;
        let log_count = ((raw >> 8) & 0x7F) as u8;
        let low = ((raw >> 4) & 0x0F) as u8;
        let high = (raw & 0x0F) as u8;

        if low > high && !(low == 15 && high <= 1) {
            return Err(JournalError::InvalidNoteRange { low, high });
        }

        Ok(Self {
            b,
            log_count,
            low,
            high,
        })
    }

    /// B 位（头部最高位），不参与长度计算。
    #[must_use]
    pub const fn b_flag(&self) -> bool {
        self.b
    }

    /// note log 条数（0..=128），已应用 127→128 转义。
    #[must_use]
    pub const fn log_count(&self) -> usize {
        if self.log_count == 127 && self.low == 15 && self.high == 0 {
            128
        } else {
            self.log_count as usize
        }
    }

    /// LOW 半字节。
    #[must_use]
    pub const fn low(&self) -> u8 {
        self.low
    }

    /// HIGH 半字节。
    #[must_use]
    pub const fn high(&self) -> u8 {
        self.high
    }

    /// offbit 字节数。
    #[must_use]
    pub const fn offbit_count(&self) -> usize {
        if self.low <= self.high {
            (self.high - self.low) as usize + 1
        } else {
            0
        }
    }

    /// 头部之后的字节数：log 列表 + offbit 字节。
    #[must_use]
    pub const fn body_len(&self) -> usize {
        self.log_count() * LOG_ENTRY_LEN + self.offbit_count()
    }
}

/// Chapter C / E / A 共用的 8 bit 头部：`S | LEN(7)`，log 条数为 `LEN + 1`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogChapterHeader {
    raw: u8,
}

impl LogChapterHeader {
    /// 解析头部；7 bit 长度字段的所有取值都合法。
    #[must_use]
    pub const fn parse(raw: u8) -> Self {
        Self { raw }
    }

    /// S 位。
    #[must_use]
    pub const fn single_loss(&self) -> bool {
        self.raw & 0x80 != 0
    }

    /// log 条数（1..=128）。
    #[must_use]
    pub const fn log_count(&self) -> usize {
        (self.raw & LOG_LEN_MASK) as usize + 1
    }

    /// 头部之后的字节数。
    #[must_use]
    pub const fn body_len(&self) -> usize {
        self.log_count() * LOG_ENTRY_LEN
    }
}

fn skip_fixed<I>(reader: &mut ByteReader<'_, I>, len: usize) -> Result<(), Halt>
where
    I: JournalInput + ?Sized,
{
    reader.require(len)?;
    reader.skip(len)
}

fn decode_log_chapter<I>(reader: &mut ByteReader<'_, I>) -> Result<LogChapterHeader, Halt>
where
    I: JournalInput + ?Sized,
{
    reader.require(1)?;
    let header = LogChapterHeader::parse(reader.read_u8()?);
    let body = header.body_len();
    reader.require(body)?;
    reader.skip(body)?;
    Ok(header)
}

fn decode_note<I>(reader: &mut ByteReader<'_, I>) -> Result<NoteChapterHeader, Halt>
where
    I: JournalInput + ?Sized,
{
    reader.require(2)?;
    let header = NoteChapterHeader::parse(reader.read_u16()?)?;
    let body = header.body_len();
    reader.require(body)?;
    reader.skip(body)?;
    Ok(header)
}

fn decode_parameter_system<I>(reader: &mut ByteReader<'_, I>) -> Result<ChapterLayout, Halt>
where
    I: JournalInput + ?Sized,
{
    reader.require(usize::from(CHAPTER_M_HEADER_LEN))?;
    let raw = reader.read_u16()?;
    let length = raw & CHAPTER_M_LENGTH_MASK;
    let pending = raw & CHAPTER_M_FLAG_P != 0;

    let minimum = CHAPTER_M_HEADER_LEN + u16::from(pending);
    if length < minimum {
        return Err(JournalError::ChapterTooShort {
            chapter: Chapter::ParameterSystem,
            length,
        }
        .into());
    }

    let body = usize::from(length - CHAPTER_M_HEADER_LEN);
    reader.require(body)?;
    reader.skip(body)?;
    Ok(ChapterLayout::ParameterSystem { length, pending })
}
