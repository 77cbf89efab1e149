#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spark_codec_rtpmidi::{DecodeCursor, DecodeOutcome, JournalDecoder, JournalDecoderConfig};

/// Fuzz 输入：任意字节 + journal 起始偏移 + 配置开关。
///
/// - **Why**：journal 的每个长度都由前面刚解出的位域决定，恶意对端可以构造任意组合；
///   解码器必须在任何输入上都不 panic、不越界读取。
/// - **What**：`Complete` 时游标必须落在输入之内，`Incomplete` 时报告的需求必须超过可用长度且游标保持原样。
#[derive(Debug, Arbitrary)]
struct JournalCase {
    offset: u8,
    verify_channel_length: bool,
    allow_enhanced_chapter_c: bool,
    max_journal_len: Option<u16>,
    data: Vec<u8>,
}

fuzz_target!(|case: JournalCase| {
    let offset = usize::from(case.offset).min(case.data.len());
    let config = JournalDecoderConfig {
        verify_channel_length: case.verify_channel_length,
        max_journal_len: case.max_journal_len.map(usize::from),
        allow_enhanced_chapter_c: case.allow_enhanced_chapter_c,
    };
    let decoder = JournalDecoder::new(config);

    let snapshot = DecodeCursor::at(offset);
    let mut cursor = snapshot;
    let first = decoder.decode(&case.data[..], &mut cursor);
    match &first {
        Ok(DecodeOutcome::Complete(section)) => {
            assert!(cursor.required() <= case.data.len());
            assert_eq!(cursor.position(), cursor.required());
            assert_eq!(section.span.offset(), offset);
            assert_eq!(section.span.end(), Some(cursor.position()));
        }
        Ok(DecodeOutcome::Incomplete(need)) => {
            assert!(need.required > case.data.len());
            assert_eq!(cursor, snapshot);
        }
        Err(_) => {}
    }

    let mut replay = snapshot;
    assert_eq!(decoder.decode(&case.data[..], &mut replay), first);
    assert_eq!(replay, cursor);
});
