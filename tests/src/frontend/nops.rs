use dynarec_frontend::{is_nops, is_nops_at, FlatMemory};

const PADDING: &[&[u8]] = &[
    &[0x90],
    &[0x66, 0x90],
    &[0x0f, 0x1f, 0x00],
    &[0x8d, 0x76, 0x00],
    &[0x0f, 0x1f, 0x40, 0x00],
    &[0x8d, 0x74, 0x26, 0x00],
    &[0x0f, 0x1f, 0x44, 0x00, 0x00],
    &[0x66, 0x0f, 0x1f, 0x44, 0x00, 0x00],
    &[0x8d, 0xb6, 0x00, 0x00, 0x00, 0x00],
    &[0x0f, 0x1f, 0x80, 0x00, 0x00, 0x00, 0x00],
    &[0x8d, 0xb4, 0x26, 0x00, 0x00, 0x00, 0x00],
    &[0x0f, 0x1f, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
    &[0x66, 0x0f, 0x1f, 0x84, 0x00, 0x00, 0x00, 0x00, 0x00],
];

#[test]
fn empty_is_padding() {
    assert!(is_nops(&[]));
}

#[test]
fn every_form_is_padding() {
    for form in PADDING {
        assert!(is_nops(form), "{form:02x?}");
    }
}

#[test]
fn concatenations_are_padding() {
    for a in PADDING {
        for b in PADDING {
            let joined = [*a, *b].concat();
            assert!(is_nops(&joined), "{joined:02x?}");
        }
    }
}

#[test]
fn truncated_forms_are_not_padding() {
    for form in PADDING.iter().filter(|f| f.len() > 1) {
        let cut = &form[..form.len() - 1];
        // A shorter prefix may itself be padding (66 90 -> 66 is not).
        if !PADDING.contains(&cut) {
            assert!(!is_nops(cut), "{cut:02x?}");
        }
        let tail = [&[0x90][..], cut].concat();
        if !PADDING.contains(&cut) {
            assert!(!is_nops(&tail), "{tail:02x?}");
        }
    }
}

#[test]
fn lone_prefix_is_not_padding() {
    assert!(!is_nops(&[0x66]));
    assert!(!is_nops(&[0x90, 0x66]));
}

#[test]
fn real_code_is_not_padding() {
    assert!(!is_nops(&[0xc3]));
    assert!(!is_nops(&[0x90, 0x90, 0x40]));
    // lea esi,[esi+1] is not an identity.
    assert!(!is_nops(&[0x8d, 0x76, 0x01]));
    // lea edi,[edi+0]
    assert!(!is_nops(&[0x8d, 0x7f, 0x00]));
}

#[test]
fn at_reads_only_n_bytes() {
    let mem = FlatMemory::new(0x1000, vec![0x90, 0x90, 0xc3]);
    assert!(is_nops_at(&mem, 0x1000, 2));
    assert!(!is_nops_at(&mem, 0x1000, 3));
    assert!(is_nops_at(&mem, 0x1000, 0));
}

#[test]
fn at_fails_when_unmapped() {
    let mem = FlatMemory::new(0x1000, vec![0x90, 0x90]);
    assert!(!is_nops_at(&mem, 0x1000, 4));
    assert!(!is_nops_at(&mem, 0x2000, 1));
}
