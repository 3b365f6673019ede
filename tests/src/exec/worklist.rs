use dynarec_exec::AddressWorklist;

#[test]
fn add_deduplicates() {
    let mut wl = AddressWorklist::new();
    wl.add(0x1010);
    wl.add(0x1008);
    wl.add(0x1010);
    assert_eq!(wl.len(), 2);
    assert!(wl.contains(0x1008));
    assert!(!wl.contains(0x1000));
}

#[test]
fn pop_returns_closest_at_or_after() {
    let mut wl = AddressWorklist::new();
    for a in [0x1030, 0x1010, 0x1020] {
        wl.add(a);
    }
    assert_eq!(wl.pop_closest_at_or_after(0x1000), Some(0x1010));
    assert_eq!(wl.pop_closest_at_or_after(0x1000), Some(0x1020));
    assert_eq!(wl.len(), 1);
}

#[test]
fn pop_is_inclusive_of_floor() {
    let mut wl = AddressWorklist::new();
    wl.add(0x1010);
    assert_eq!(wl.pop_closest_at_or_after(0x1010), Some(0x1010));
    assert!(wl.is_empty());
}

#[test]
fn pop_discards_addresses_below_floor() {
    let mut wl = AddressWorklist::new();
    for a in [0x1004, 0x1008, 0x1040] {
        wl.add(a);
    }
    assert_eq!(wl.pop_closest_at_or_after(0x1010), Some(0x1040));
    assert!(wl.is_empty());
    assert_eq!(wl.pop_closest_at_or_after(0), None);
}

#[test]
fn pop_on_empty() {
    let mut wl = AddressWorklist::new();
    assert_eq!(wl.pop_closest_at_or_after(0x1000), None);
}

#[test]
fn grows_in_steps() {
    let mut wl = AddressWorklist::new();
    assert_eq!(wl.capacity(), 0);
    wl.add(1);
    assert!(wl.capacity() >= 16);
    for a in 2..=17 {
        wl.add(a);
    }
    assert_eq!(wl.len(), 17);
    assert!(wl.capacity() >= 32);
    wl.clear();
    assert!(wl.is_empty());
}

#[test]
fn drains_in_ascending_order() {
    let mut wl = AddressWorklist::new();
    let addrs = [0x1050, 0x1003, 0x1044, 0x1010, 0x1027, 0x1003];
    for a in addrs {
        wl.add(a);
    }
    let mut out = Vec::new();
    while let Some(a) = wl.pop_closest_at_or_after(0) {
        out.push(a);
    }
    assert_eq!(out, vec![0x1003, 0x1010, 0x1027, 0x1044, 0x1050]);
}
