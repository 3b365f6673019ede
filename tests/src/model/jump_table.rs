use dynarec_core::jump_table::{SLOT_DISPATCH, SLOT_LINK, SLOT_OWNER, SLOT_TARGET};
use dynarec_core::{x31_hash, JumpTable, JMP_TABLE_STRIDE};

#[test]
fn table_layout() {
    let table = JumpTable::new(3);
    assert_eq!(table.records(), 3);
    assert_eq!(table.len(), 3 * JMP_TABLE_STRIDE);
    assert_eq!(table.record_addr(0), table.base_addr());
    assert_eq!(table.record_addr(2) - table.base_addr(), 64);
    assert!(JumpTable::new(0).is_empty());
}

#[test]
fn table_slots() {
    let table = JumpTable::new(2);
    table.set(1, SLOT_TARGET, 0x4000);
    table.set(1, SLOT_DISPATCH, 0xdead);
    assert_eq!(table.get(1, SLOT_TARGET), 0x4000);
    assert_eq!(table.get(1, SLOT_DISPATCH), 0xdead);
    assert_eq!(table.get(0, SLOT_TARGET), 0);
}

#[test]
fn table_owner_and_links() {
    let table = JumpTable::new(2);
    table.fix_owner(0x1234);
    assert_eq!(table.get(0, SLOT_OWNER), 0x1234);
    assert_eq!(table.get(1, SLOT_OWNER), 0x1234);

    table.link(0, 0x8000);
    table.link(1, 0x9000);
    assert_eq!(table.get(0, SLOT_LINK), 0x8000);
    table.unlink_all();
    assert_eq!(table.get(0, SLOT_LINK), 0);
    assert_eq!(table.get(1, SLOT_LINK), 0);
    // Owner survives unlinking.
    assert_eq!(table.get(1, SLOT_OWNER), 0x1234);
}

#[test]
#[should_panic]
fn table_record_out_of_bounds() {
    JumpTable::new(1).record_addr(1);
}

#[test]
fn hash_x31() {
    assert_eq!(x31_hash(&[]), 0);
    assert_eq!(x31_hash(&[1]), 1);
    assert_eq!(x31_hash(&[1, 2]), 33);
    assert_ne!(x31_hash(&[0x90, 0xc3]), x31_hash(&[0xc3, 0x90]));
}
