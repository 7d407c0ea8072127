use super::*;
use proptest::prelude::*;

#[test]
fn snapshot_concatenates_in_order() {
    let mut buf = ChunkRingBuffer::new(1024);
    buf.append("hello ");
    buf.append("world");
    assert_eq!(buf.snapshot(), "hello world");
}

#[test]
fn trims_oldest_chunks_when_over_cap() {
    let mut buf = ChunkRingBuffer::new(5);
    buf.append("abc");
    buf.append("def");
    assert!(buf.snapshot().chars().count() <= 5);
    assert_eq!(buf.snapshot(), "cdef");
}

#[test]
fn single_chunk_larger_than_cap_keeps_trailing_slice() {
    let mut buf = ChunkRingBuffer::new(3);
    buf.append("abcdefgh");
    assert_eq!(buf.snapshot(), "fgh");
}

#[test]
fn set_max_chars_zero_clears() {
    let mut buf = ChunkRingBuffer::new(100);
    buf.append("hello");
    buf.set_max_chars(0);
    assert_eq!(buf.snapshot(), "");
    assert_eq!(buf.total_chars(), 0);
}

#[test]
fn set_max_chars_shrink_trims_existing_content() {
    let mut buf = ChunkRingBuffer::new(100);
    buf.append("0123456789");
    buf.set_max_chars(4);
    assert_eq!(buf.snapshot(), "6789");
}

#[test]
fn clear_empties_buffer() {
    let mut buf = ChunkRingBuffer::new(100);
    buf.append("data");
    buf.clear();
    assert_eq!(buf.snapshot(), "");
    assert_eq!(buf.total_chars(), 0);
}

#[test]
fn multibyte_chars_never_split_mid_codepoint() {
    let mut buf = ChunkRingBuffer::new(3);
    buf.append("a😀b😀c");
    let snap = buf.snapshot();
    assert!(snap.chars().count() <= 3);
    assert!(snap.is_char_boundary(0));
    // Every char in the result must round-trip through `chars()` cleanly.
    assert_eq!(snap.chars().collect::<String>(), snap);
}

#[test]
fn empty_append_is_noop() {
    let mut buf = ChunkRingBuffer::new(10);
    buf.append("");
    assert_eq!(buf.total_chars(), 0);
}

#[test]
fn invariant_holds_after_many_appends() {
    let mut buf = ChunkRingBuffer::new(16);
    for i in 0..100 {
        buf.append(format!("chunk{i}-"));
        assert!(buf.total_chars() <= 16);
    }
}

proptest! {
    #[test]
    fn total_chars_never_exceeds_cap_for_arbitrary_chunks(
        cap in 1usize..64,
        chunks in proptest::collection::vec("[a-zA-Z0-9 ]{0,20}", 0..30),
    ) {
        let mut buf = ChunkRingBuffer::new(cap);
        for chunk in chunks {
            buf.append(chunk);
            prop_assert!(buf.total_chars() <= cap);
            prop_assert_eq!(buf.snapshot().chars().count(), buf.total_chars());
        }
    }
}
