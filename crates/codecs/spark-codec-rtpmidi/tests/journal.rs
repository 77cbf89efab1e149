//! recovery journal 解码的端到端契约测试。
//!
//! # 教案级注释概览
//!
//! - **核心目标 (Why)**：从调用方视角验证三种结局的边界：完整 journal 必须 `Complete` 且游标正好停在末尾，
//!   任意严格前缀必须 `Incomplete`，结构违规必须 `Err`；同时验证重复调用不依赖历史。
//! - **设计手法 (How)**：`JournalPlan` 描述一个合法 journal，`encode` 按线格式生成字节，
//!   Proptest 随机组合 channel 数、chapter 集合与各 chapter 的 log 数，再对生成字节断言性质。
//! - **合同 (What)**：生成器只产出合法 journal，channel journal 的 LENGTH 与真实长度一致，
//!   因此严格模式下也应通过。

use std::collections::VecDeque;

use proptest::prelude::*;
use spark_codec_rtpmidi::{
    ByteSpan, Chapter, DecodeCursor, DecodeOutcome, JournalDecoder, JournalDecoderConfig,
    JournalError, JournalSection, JournalStatus, NeedMore, decode_journal,
};

/// 单个 chapter 的生成参数。
#[derive(Debug, Clone, Copy)]
struct ChapterPlan {
    entries: u8,
    low: u8,
    high: u8,
    fill: u8,
}

#[derive(Debug, Clone)]
struct ChannelPlan {
    channel: u8,
    chapters: u8,
    params: Vec<ChapterPlan>,
}

#[derive(Debug, Clone)]
struct JournalPlan {
    single_loss: bool,
    checkpoint_seq: u16,
    system: Option<u8>,
    channels: Vec<ChannelPlan>,
}

fn encode_chapter(chapter: Chapter, plan: ChapterPlan) -> Vec<u8> {
    let ChapterPlan {
        entries,
        low,
        high,
        fill,
    } = plan;
    match chapter {
        Chapter::ProgramChange => vec![fill & 0x7F, 0x00, 0x00],
        Chapter::PitchWheel => vec![0x40, fill & 0x7F],
        Chapter::ChannelAftertouch => vec![fill & 0x7F],
        Chapter::ControlChange | Chapter::NoteExtras | Chapter::PolyAftertouch => {
            let mut bytes = vec![entries & 0x7F];
            bytes.extend(std::iter::repeat_n(fill, 2 * (usize::from(entries) + 1)));
            bytes
        }
        Chapter::ParameterSystem => {
            let length = 2 + u16::from(entries);
            let mut bytes = vec![(length >> 8) as u8 & 0x03, length as u8];
            bytes.extend(std::iter::repeat_n(fill, usize::from(entries)));
            bytes
        }
        Chapter::Note => {
            let offbits = if low <= high {
                usize::from(high - low) + 1
            } else {
                0
            };
            let mut bytes = vec![entries & 0x7F, (low << 4) | high];
            bytes.extend(std::iter::repeat_n(fill, 2 * usize::from(entries) + offbits));
            bytes
        }
    }
}

fn encode_channel(plan: &ChannelPlan) -> Vec<u8> {
    let mut body = Vec::new();
    for (index, chapter) in Chapter::ALL.into_iter().enumerate() {
        if plan.chapters & chapter.flag() != 0 {
            body.extend(encode_chapter(chapter, plan.params[index]));
        }
    }
    let length = 3 + body.len();
    let mut bytes = vec![
        (plan.channel << 3) | ((length >> 8) as u8 & 0x03),
        length as u8,
        plan.chapters,
    ];
    bytes.extend(body);
    bytes
}

fn encode(plan: &JournalPlan) -> Vec<u8> {
    let mut flags = 0u8;
    if plan.single_loss {
        flags |= 0x80;
    }
    if plan.system.is_some() {
        flags |= 0x40;
    }
    if !plan.channels.is_empty() {
        flags |= 0x20 | (plan.channels.len() as u8 - 1);
    }
    let mut bytes = vec![flags];
    bytes.extend(plan.checkpoint_seq.to_be_bytes());
    if let Some(body) = plan.system {
        let length = 2 + u16::from(body);
        bytes.extend([(length >> 8) as u8 & 0x03, length as u8]);
        bytes.extend(std::iter::repeat_n(0x5A, usize::from(body)));
    }
    for channel in &plan.channels {
        bytes.extend(encode_channel(channel));
    }
    bytes
}

fn chapter_plan() -> impl Strategy<Value = ChapterPlan> {
    let window = prop_oneof![
        (0u8..16).prop_flat_map(|low| (Just(low), low..16)),
        Just((15u8, 0u8)),
        Just((15u8, 1u8)),
    ];
    (0u8..6, window, any::<u8>()).prop_map(|(entries, (low, high), fill)| ChapterPlan {
        entries,
        low,
        high,
        fill,
    })
}

fn channel_plan() -> impl Strategy<Value = ChannelPlan> {
    (
        0u8..16,
        any::<u8>(),
        prop::collection::vec(chapter_plan(), 8),
    )
        .prop_map(|(channel, chapters, params)| ChannelPlan {
            channel,
            chapters,
            params,
        })
}

fn journal_plan() -> impl Strategy<Value = JournalPlan> {
    (
        any::<bool>(),
        any::<u16>(),
        prop::option::of(0u8..6),
        prop::collection::vec(channel_plan(), 0..=4),
    )
        .prop_map(
            |(single_loss, checkpoint_seq, system, channels)| JournalPlan {
                single_loss,
                checkpoint_seq,
                system,
                channels,
            },
        )
}

fn decode_fresh(
    decoder: &JournalDecoder,
    input: &[u8],
) -> (
    Result<DecodeOutcome<JournalSection>, JournalError>,
    DecodeCursor,
) {
    let mut cursor = DecodeCursor::new();
    let result = decoder.decode(input, &mut cursor);
    (result, cursor)
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 256, .. ProptestConfig::default() })]

    #[test]
    fn prop_full_journal_completes_at_its_end(plan in journal_plan()) {
        let bytes = encode(&plan);
        for decoder in [JournalDecoder::default(), JournalDecoder::new(JournalDecoderConfig::strict())] {
            let (result, cursor) = decode_fresh(&decoder, &bytes);
            let section = match result {
                Ok(DecodeOutcome::Complete(section)) => section,
                other => return Err(TestCaseError::fail(format!("{other:?}"))),
            };
            prop_assert_eq!(cursor.position(), bytes.len());
            prop_assert_eq!(cursor.required(), bytes.len());
            prop_assert_eq!(section.span, ByteSpan::new(0, bytes.len()));
            prop_assert_eq!(section.header.checkpoint_seq, plan.checkpoint_seq);
            prop_assert_eq!(section.system.is_some(), plan.system.is_some());
            prop_assert_eq!(section.channels.len(), plan.channels.len());
            for (decoded, planned) in section.channels.iter().zip(&plan.channels) {
                prop_assert_eq!(decoded.header.channel, planned.channel);
                prop_assert_eq!(decoded.header.chapters.bits(), planned.chapters);
                prop_assert_eq!(decoded.span.len(), usize::from(decoded.header.length));
                let order: Vec<Chapter> = decoded.chapters.iter().map(|span| span.chapter).collect();
                let expected: Vec<Chapter> = decoded.header.chapters.iter().collect();
                prop_assert_eq!(order, expected);
            }
        }
    }

    #[test]
    fn prop_every_strict_prefix_needs_more(plan in journal_plan()) {
        let bytes = encode(&plan);
        let decoder = JournalDecoder::default();
        let mut last_required = 0;
        for cut in 0..bytes.len() {
            let (result, cursor) = decode_fresh(&decoder, &bytes[..cut]);
            prop_assert_eq!(JournalStatus::of(&result), JournalStatus::NotEnoughData);
            let need = match result {
                Ok(DecodeOutcome::Incomplete(need)) => need,
                other => return Err(TestCaseError::fail(format!("prefix {cut}: {other:?}"))),
            };
            prop_assert_eq!(need.available, cut);
            prop_assert!(need.required > cut);
            prop_assert!(need.required <= bytes.len());
            prop_assert!(need.required >= last_required);
            prop_assert_eq!(cursor, DecodeCursor::new());
            last_required = need.required;
        }
    }

    #[test]
    fn prop_retry_from_snapshot_is_idempotent(plan in journal_plan(), cut in any::<prop::sample::Index>()) {
        let bytes = encode(&plan);
        let prefix = &bytes[..cut.index(bytes.len() + 1)];
        let decoder = JournalDecoder::default();
        let snapshot = DecodeCursor::new();

        let mut first_cursor = snapshot;
        let first = decoder.decode(prefix, &mut first_cursor);
        let mut second_cursor = snapshot;
        let second = decoder.decode(prefix, &mut second_cursor);
        prop_assert_eq!(first, second);
        prop_assert_eq!(first_cursor, second_cursor);
    }

    #[test]
    fn prop_incremental_feeding_reuses_one_cursor(plan in journal_plan(), step in 1usize..32) {
        let bytes = encode(&plan);
        let decoder = JournalDecoder::default();
        let mut cursor = DecodeCursor::new();
        let mut arrived = 0;
        let outcome = loop {
            arrived = (arrived + step).min(bytes.len());
            match decoder.decode(&bytes[..arrived], &mut cursor) {
                Ok(DecodeOutcome::Incomplete(_)) if arrived < bytes.len() => {
                    prop_assert_eq!(cursor, DecodeCursor::new());
                }
                other => break other,
            }
        };
        let (expected, fresh) = decode_fresh(&decoder, &bytes);
        prop_assert_eq!(outcome, expected);
        prop_assert_eq!(cursor, fresh);
    }

    #[test]
    fn prop_trailing_bytes_are_left_for_the_next_section(plan in journal_plan(), tail in prop::collection::vec(any::<u8>(), 1..16)) {
        let journal = encode(&plan);
        let mut bytes = journal.clone();
        bytes.extend(&tail);
        let (result, cursor) = decode_fresh(&JournalDecoder::default(), &bytes);
        prop_assert!(matches!(result, Ok(DecodeOutcome::Complete(_))));
        prop_assert_eq!(cursor.position(), journal.len());
    }

    #[test]
    fn prop_journal_limit_is_exact(plan in journal_plan()) {
        let bytes = encode(&plan);
        let at_limit = JournalDecoder::new(JournalDecoderConfig::new().with_max_journal_len(bytes.len()));
        let (result, _) = decode_fresh(&at_limit, &bytes);
        prop_assert!(matches!(result, Ok(DecodeOutcome::Complete(_))));

        let limit = bytes.len() - 1;
        let below = JournalDecoder::new(JournalDecoderConfig::new().with_max_journal_len(limit));
        let (result, _) = decode_fresh(&below, &bytes);
        match result {
            Err(JournalError::BudgetExceeded { limit: reported, required }) => {
                prop_assert_eq!(reported, limit);
                prop_assert!(required > limit);
            }
            other => return Err(TestCaseError::fail(format!("{other:?}"))),
        }
    }

    #[test]
    fn prop_ring_buffer_matches_slice(plan in journal_plan()) {
        let bytes = encode(&plan);
        let mut ring: VecDeque<u8> = VecDeque::with_capacity(bytes.len());
        // 让环形缓冲的内容跨越底层存储的回绕点。
        ring.extend(std::iter::repeat_n(0u8, bytes.len() / 2));
        ring.extend(&bytes);
        ring.drain(..bytes.len() / 2);

        let mut slice_cursor = DecodeCursor::new();
        let from_slice = decode_journal(&bytes[..], &mut slice_cursor);
        let mut ring_cursor = DecodeCursor::new();
        let from_ring = decode_journal(&ring, &mut ring_cursor);
        prop_assert_eq!(from_slice, from_ring);
        prop_assert_eq!(slice_cursor, ring_cursor);
    }
}

#[test]
fn pitch_wheel_journal_reports_the_missing_byte() {
    let bytes = [0x20u8, 0x00, 0x01, 0x00, 0x00, 0x10, 0x40, 0x00];

    let mut cursor = DecodeCursor::new();
    let result = decode_journal(&bytes, &mut cursor);
    assert_eq!(JournalStatus::of(&result), JournalStatus::Ok);
    assert_eq!(cursor.position(), 8);

    let mut cursor = DecodeCursor::new();
    let result = decode_journal(&bytes[..7], &mut cursor);
    assert_eq!(JournalStatus::of(&result), JournalStatus::NotEnoughData);
    assert_eq!(
        result,
        Ok(DecodeOutcome::Incomplete(NeedMore {
            required: 8,
            available: 7,
        }))
    );
}

#[test]
fn two_channels_are_walked_in_order() {
    let mut full = vec![
        0x21, 0xAB, 0xCD, // A=1, TOTCHAN=1, checkpoint 0xABCD
        0x08, 0x08, 0x88, // channel 1, LENGTH=8, chapters P|N
        0x05, 0x00, 0x00, // chapter P
        0x00, 0xF1, // chapter N: 0 logs, (15, 1) 无 offbit
        0x10, 0x04, 0x01, // channel 2, LENGTH=4, chapter A
        0x7F, // chapter A header: 128 logs
    ];
    full.extend(std::iter::repeat_n(0x11, 256));

    let mut cursor = DecodeCursor::new();
    let section = decode_journal(&full, &mut cursor)
        .expect("no violation")
        .into_complete()
        .expect("complete");
    assert_eq!(section.header.total_channels, 2);
    assert_eq!(section.header.checkpoint_seq, 0xABCD);
    assert_eq!(section.channels[0].header.channel, 1);
    assert_eq!(section.channels[0].span, ByteSpan::new(3, 8));
    assert_eq!(section.channels[1].header.channel, 2);
    assert_eq!(section.channels[1].span, ByteSpan::new(11, 4 + 256));
    assert_eq!(section.channel(2).map(|c| c.chapters.len()), Some(1));
    assert_eq!(cursor.position(), full.len());

    // 第二个 channel 的 chapter A 只到了部分 log。
    let mut cursor = DecodeCursor::new();
    let result = decode_journal(&full[..100], &mut cursor);
    assert_eq!(
        result,
        Ok(DecodeOutcome::Incomplete(NeedMore {
            required: 15 + 256,
            available: 100,
        }))
    );
    assert_eq!(cursor, DecodeCursor::new());
}

#[test]
fn retry_with_the_same_cursor_matches_a_fresh_decode() {
    // 单个 channel，chapter N 头部 0x7FF0：128 条 log，无 offbit。
    let mut full = vec![0x20, 0x00, 0x00, 0x01, 0x05, 0x08, 0x7F, 0xF0];
    full.extend(std::iter::repeat_n(0x3C, 256));
    assert_eq!(full.len(), 264);

    let mut reused = DecodeCursor::new();
    let partial = decode_journal(&full[..100], &mut reused);
    assert_eq!(JournalStatus::of(&partial), JournalStatus::NotEnoughData);

    let retried = decode_journal(&full, &mut reused);
    let mut fresh = DecodeCursor::new();
    let expected = decode_journal(&full, &mut fresh);
    assert_eq!(retried, expected);
    assert_eq!(reused, fresh);
    assert_eq!(reused.position(), 264);
}

#[test]
fn channel_header_is_budgeted_per_channel() {
    // TOTCHAN=1 声明两个 channel，但第二个 channel 的头部尚未到达。
    let bytes = [0x21u8, 0x00, 0x00, 0x00, 0x04, 0x02, 0x33, 0x00];
    let mut cursor = DecodeCursor::new();
    assert_eq!(
        decode_journal(&bytes, &mut cursor),
        Ok(DecodeOutcome::Incomplete(NeedMore {
            required: 10,
            available: 8,
        }))
    );
    assert_eq!(cursor, DecodeCursor::new());
}

#[test]
fn header_alone_is_a_complete_journal() {
    let mut cursor = DecodeCursor::new();
    let result = decode_journal(&[0x80u8, 0x00, 0x01][..], &mut cursor);
    let section = result.expect("no violation").into_complete().expect("complete");
    assert!(section.header.single_loss);
    assert!(section.channels.is_empty());
    assert_eq!(section.len(), 3);

    for cut in 0..3 {
        let mut cursor = DecodeCursor::new();
        let result = decode_journal(&[0x80u8, 0x00, 0x01][..cut], &mut cursor);
        assert_eq!(JournalStatus::of(&result), JournalStatus::NotEnoughData);
    }
}

#[test]
fn illegal_note_window_is_a_structural_violation() {
    let bytes = [0x20u8, 0x00, 0x00, 0x00, 0x00, 0x08, 0x01, 0xE2];
    let mut cursor = DecodeCursor::new();
    let result = decode_journal(&bytes, &mut cursor);
    assert_eq!(JournalStatus::of(&result), JournalStatus::StructuralViolation);
    assert_eq!(
        result,
        Err(JournalError::InvalidNoteRange { low: 14, high: 2 })
    );
}

#[test]
fn violation_wins_over_missing_bytes_once_header_is_read() {
    // Chapter N 头部已到齐且非法；后续 log 是否到齐无关紧要。
    let bytes = [0x20u8, 0x00, 0x00, 0x00, 0x00, 0x08, 0x05, 0x53];
    let mut cursor = DecodeCursor::new();
    assert_eq!(
        decode_journal(&bytes, &mut cursor),
        Err(JournalError::InvalidNoteRange { low: 5, high: 3 })
    );
}
