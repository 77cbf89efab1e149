//! # 游标与长度预算
//!
//! ## 设计意图（Why）
//! - recovery journal 几乎每个子结构的长度都取决于前面刚解出的位域，传输层又可能只交付了半个报文，
//!   因此每一次读取前都必须先确认「到目前为止至少需要多少字节」是否已经到齐；
//! - 该模块把「位置」与「最小需求长度」合并为 [`DecodeCursor`]，由上层报文流水线持有并在多个段之间传递，
//!   journal 解码只负责推进，不负责重置。
//!
//! ## 契约（What）
//! - [`DecodeCursor::require`] 先累加预算再比较可用长度；失败时游标保持调用前原样，并返回 [`NeedMore`]；
//! - [`ByteReader`] 的读取方法只在匹配的 `require` 成功之后调用，永远不会越过已预算的区间；
//! - 输入缓冲通过 [`JournalInput`] 抽象，只读、可随机访问、可查询长度。

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::config::JournalDecoderConfig;
use crate::error::{Halt, JournalError, NeedMore};

/// 只读、可按下标窥视的字节输入。
///
/// - **Contract**：`peek(i)` 不推进任何状态；`i >= available()` 时必须返回 `None`。
/// - **实现提示**：环形缓冲可直接实现该 trait，无需先拼接成连续切片。
pub trait JournalInput {
    /// 当前已到达的字节数。
    fn available(&self) -> usize;

    /// 返回下标 `index` 处的字节，不消费输入。
    fn peek(&self, index: usize) -> Option<u8>;
}

impl JournalInput for [u8] {
    fn available(&self) -> usize {
        self.len()
    }

    fn peek(&self, index: usize) -> Option<u8> {
        self.get(index).copied()
    }
}

impl<const N: usize> JournalInput for [u8; N] {
    fn available(&self) -> usize {
        N
    }

    fn peek(&self, index: usize) -> Option<u8> {
        self.get(index).copied()
    }
}

impl JournalInput for Vec<u8> {
    fn available(&self) -> usize {
        self.len()
    }

    fn peek(&self, index: usize) -> Option<u8> {
        self.get(index).copied()
    }
}

impl JournalInput for VecDeque<u8> {
    fn available(&self) -> usize {
        self.len()
    }

    fn peek(&self, index: usize) -> Option<u8> {
        self.get(index).copied()
    }
}

/// 解码进度：读位置 + 已承诺需要的最小字节数。
///
/// ### Why
/// - journal 只是整个 RTP-MIDI 报文解码中的一段，前后段共享同一对状态，因此它由调用方持有；
/// - 类型为 `Copy`；journal 解码收到 `Incomplete` 时把游标恢复为调用前的值，待更多字节到达后原样重试即可。
///
/// ### What
/// - `position`：下一个未读字节的下标；
/// - `required`：为完成已检查部分所需的最小输入长度，单调不减。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeCursor {
    position: usize,
    required: usize,
}

impl DecodeCursor {
    /// 从输入起点开始的游标。
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: 0,
            required: 0,
        }
    }

    /// 从指定偏移开始的游标，预算等于偏移本身（偏移之前的字节视为已确认存在）。
    #[must_use]
    pub const fn at(position: usize) -> Self {
        Self {
            position,
            required: position,
        }
    }

    /// 当前读位置。
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// 当前预算（最小需求长度）。
    #[must_use]
    pub const fn required(&self) -> usize {
        self.required
    }

    /// 将预算增加 `len` 字节，并校验输入是否已覆盖新预算。
    ///
    /// - **成功**：预算被永久计入，之后可安全读取 `len` 字节；
    /// - **失败**：返回 [`NeedMore`]，游标与预算均保持调用前的值；
    /// - 预算累加溢出时饱和到 `usize::MAX`，必然落入失败分支。
    pub fn require<I>(&mut self, input: &I, len: usize) -> Result<(), NeedMore>
    where
        I: JournalInput + ?Sized,
    {
        let required = self.required.saturating_add(len);
        let available = input.available();
        if available < required {
            return Err(NeedMore {
                required,
                available,
            });
        }
        self.required = required;
        Ok(())
    }
}

/// 表示某段结构在原始输入中的逻辑位置。
///
/// - **Why**：chapter 负载在本 crate 内保持不透明，只记录区间，供下游事件消费者按需定位原始字节。
/// - **Contract**：`offset + len` 不超过解码时的可用长度；`len` 可为 0。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteSpan {
    offset: usize,
    len: usize,
}

impl ByteSpan {
    /// 构造新的 `ByteSpan`。
    #[must_use]
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// 起始偏移。
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// 跨度长度。
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// 是否为空区间。
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 结束位置（开区间），溢出时返回 `None`。
    #[must_use]
    pub const fn end(&self) -> Option<usize> {
        self.offset.checked_add(self.len)
    }
}

/// 绑定输入与游标的读取器，供各级解码函数按引用传递。
///
/// 除了可用长度，读取器还执行配置中的 journal 体积上限：预算一旦超过
/// `max_journal_len`，无论字节是否到齐都直接拒绝。
pub(crate) struct ByteReader<'a, I: ?Sized> {
    input: &'a I,
    cursor: &'a mut DecodeCursor,
    start: usize,
    limit: Option<usize>,
}

impl<'a, I> ByteReader<'a, I>
where
    I: JournalInput + ?Sized,
{
    pub(crate) fn new(
        input: &'a I,
        cursor: &'a mut DecodeCursor,
        config: &JournalDecoderConfig,
    ) -> Self {
        let start = cursor.position();
        Self {
            input,
            cursor,
            start,
            limit: config.max_journal_len,
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor.position
    }

    /// 自 journal 起点以来走过的字节数。
    pub(crate) fn consumed(&self) -> usize {
        self.cursor.position - self.start
    }

    /// 以 `from` 为起点、当前位置为终点的区间。
    pub(crate) fn span_from(&self, from: usize) -> ByteSpan {
        ByteSpan::new(from, self.cursor.position - from)
    }

    pub(crate) fn require(&mut self, len: usize) -> Result<(), Halt> {
        if let Some(limit) = self.limit {
            let required = self
                .cursor
                .required
                .saturating_add(len)
                .saturating_sub(self.start);
            if required > limit {
                return Err(JournalError::BudgetExceeded { limit, required }.into());
            }
        }
        self.cursor.require(self.input, len)?;
        Ok(())
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Halt> {
        let position = self.cursor.position;
        let byte = self.input.peek(position).ok_or(NeedMore {
            required: position + 1,
            available: self.input.available(),
        })?;
        self.cursor.position = position + 1;
        Ok(byte)
    }

    pub(crate) fn read_u16(&mut self) -> Result<u16, Halt> {
        let hi = self.read_u8()?;
        let lo = self.read_u8()?;
        Ok(u16::from_be_bytes([hi, lo]))
    }

    /// 读取 3 字节字段，高位补零后按大端组装为 `u32`。
    pub(crate) fn read_u24(&mut self) -> Result<u32, Halt> {
        let b0 = self.read_u8()?;
        let b1 = self.read_u8()?;
        let b2 = self.read_u8()?;
        Ok(u32::from_be_bytes([0, b0, b1, b2]))
    }

    /// 跳过已预算的 `len` 字节。
    pub(crate) fn skip(&mut self, len: usize) -> Result<(), Halt> {
        let end = self.cursor.position.saturating_add(len);
        if end > self.cursor.required {
            return Err(NeedMore {
                required: end,
                available: self.input.available(),
            }
            .into());
        }
        self.cursor.position = end;
        Ok(())
    }
}
