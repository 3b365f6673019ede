use dynarec_backend::{CodeSink, CodeWriter, SizeCounter};

#[test]
fn test_size_counter() {
    let mut sink = SizeCounter::new();
    sink.emit_u32(0xdead_beef);
    sink.emit_u32(0);
    assert_eq!(sink.offset(), 8);
    assert_eq!(sink.base_addr(), 0);
    assert!(!sink.is_writing());
}

#[test]
fn test_emit_and_read() {
    let mut buf = vec![0u8; 16];
    let mut w = CodeWriter::new(&mut buf, 0x4000);
    w.emit_u32(0xD65F_03C0);
    w.emit_u32(0x1234_5678);
    assert_eq!(w.offset(), 8);
    assert!(w.is_writing());
    assert_eq!(w.read_u32(0), 0xD65F_03C0);
    assert_eq!(w.read_u32(4), 0x1234_5678);
    assert_eq!(w.as_slice(), &[0xc0, 0x03, 0x5f, 0xd6, 0x78, 0x56, 0x34, 0x12]);
}

#[test]
fn test_overflow_keeps_counting() {
    let mut buf = vec![0u8; 8];
    let mut w = CodeWriter::new(&mut buf, 0x4000);
    for i in 0..3 {
        w.emit_u32(i);
    }
    assert!(w.overflowed());
    assert_eq!(w.offset(), 12);
    assert_eq!(w.capacity(), 8);
    assert_eq!(w.as_slice().len(), 8);
    assert_eq!(w.read_u32(4), 1);
}
