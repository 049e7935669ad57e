//! Persisted snapshots must reload to the same record set, including ids and
//! amounts wider than 64 bits, and zero balances must never be written.

use nftsnap_store::*;

fn addr(s: &str) -> Address {
    parse_address(s).unwrap()
}

fn big(exp: usize) -> U256 {
    (U256::from(1u8) << exp) + U256::from(7u8)
}

#[test]
fn ownership_round_trip_preserves_wide_ids_and_address_bytes() {
    let mut snap = OwnershipSnapshot::new();
    snap.put(OwnershipRecord::new(
        addr("0xAbCdEf0000000000000000000000000000000001"),
        U256::ZERO,
    ));
    snap.put(OwnershipRecord::new(
        addr("0x00000000000000000000000000000000000000FF"),
        big(63),
    ));
    snap.put(OwnershipRecord::new(
        addr("0x1111111111111111111111111111111111111111"),
        U256::MAX,
    ));

    let text = snap.to_csv_string().unwrap();
    let back = OwnershipSnapshot::from_csv_str(&text).unwrap();
    assert_eq!(back, snap);
    assert_eq!(
        back.owner_of(U256::MAX),
        Some(addr("0x1111111111111111111111111111111111111111"))
    );
}

#[test]
fn balance_round_trip_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("proj_balances.csv");

    let mut snap = BalanceSnapshot::new();
    let holder = addr("0x2222222222222222222222222222222222222222");
    snap.put(BalanceRecord::new(holder, U256::from(1u8), big(200)));
    snap.put(BalanceRecord::new(holder, big(100), U256::from(3u8)));
    snap.save(&path).unwrap();

    let back = BalanceSnapshot::load(&path).unwrap();
    assert_eq!(back, snap);
    assert_eq!(back.amount_of(U256::from(1u8), holder), big(200));
    assert!(!path.with_extension("csv.tmp").exists());
}

#[test]
fn save_replaces_previous_file_wholesale() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p_instances.csv");
    let a = addr("0x3333333333333333333333333333333333333333");

    let first: OwnershipSnapshot = (0u64..5)
        .map(|i| OwnershipRecord::new(a, U256::from(i)))
        .collect();
    first.save(&path).unwrap();

    let second: OwnershipSnapshot = (10u64..12)
        .map(|i| OwnershipRecord::new(a, U256::from(i)))
        .collect();
    second.save(&path).unwrap();

    let back = OwnershipSnapshot::load(&path).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back, second);
}

#[test]
fn zero_amount_put_leaves_no_row() {
    let mut snap = BalanceSnapshot::new();
    let holder = addr("0x4444444444444444444444444444444444444444");
    snap.put(BalanceRecord::new(holder, U256::from(9u8), U256::ZERO));
    snap.put(BalanceRecord::new(holder, U256::from(9u8), U256::ZERO));

    let text = snap.to_csv_string().unwrap();
    assert_eq!(text.trim_end(), "address,tokenId,balance");
}

#[test]
fn empty_snapshot_round_trips() {
    let snap = OwnershipSnapshot::new();
    let back = OwnershipSnapshot::from_csv_str(&snap.to_csv_string().unwrap()).unwrap();
    assert!(back.is_empty());
}
