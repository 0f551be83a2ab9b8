//! Replica convergence property
//!
//! Whatever sequence of writes hits the store, and however often the feed
//! duplicates deliveries, the replica ends up equal to a fresh snapshot.

use billsync_record::{decode_record_at, RawRecord, RecordId};
use billsync_replica::RemoteStore;
use billsync_test_utils::{fixed_now, partition, row, sorted_by_id, wait_for_replica, Harness, RowBuilder};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Insert(u8, u64),
    Amount(u8, u64),
    Pay(u8, bool),
    Delete(u8),
    Duplicates(bool),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..8u8, 1..1_000_000u64).prop_map(|(id, amount)| Op::Insert(id, amount)),
        2 => (0..8u8, 1..1_000_000u64).prop_map(|(id, amount)| Op::Amount(id, amount)),
        2 => (0..8u8, any::<bool>()).prop_map(|(id, transfer)| Op::Pay(id, transfer)),
        2 => (0..8u8).prop_map(Op::Delete),
        1 => any::<bool>().prop_map(Op::Duplicates),
    ]
}

fn id(n: u8) -> String {
    format!("c-{n}")
}

async fn run(ops: Vec<Op>) -> Result<(), TestCaseError> {
    let h = Harness::admin();
    let bills = partition("customer_bills");
    h.store.seed(&bills, [row("seeded", "Seeded", 10)]);
    h.activate().await;

    for op in ops {
        // Conflicts and missing rows are expected; only the end state matters
        let _ = match op {
            Op::Insert(n, amount) => h.store.insert(&bills, row(&id(n), "Customer", amount)).await,
            Op::Amount(n, amount) => {
                let patch = RawRecord::new().with("amount", amount);
                h.store.update(&bills, &RecordId::new(id(n)), patch).await
            }
            Op::Pay(n, transfer) => {
                let method = if transfer { "transfer" } else { "cash" };
                let patch = RowBuilder::new(&id(n)).paid(method).build();
                h.store.update(&bills, &RecordId::new(id(n)), patch).await
            }
            Op::Delete(n) => h.store.delete(&bills, &RecordId::new(id(n))).await,
            Op::Duplicates(on) => {
                h.store.duplicate_deliveries(on);
                Ok(())
            }
        };
    }

    let expected = sorted_by_id(
        h.store
            .rows(&bills)
            .iter()
            .map(|raw| decode_record_at(raw, fixed_now()).unwrap())
            .collect(),
    );
    let actual = wait_for_replica(&h.engine, |records| sorted_by_id(records.to_vec()) == expected).await;
    prop_assert_eq!(sorted_by_id(actual), expected);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_replica_converges_to_snapshot(ops in proptest::collection::vec(op(), 0..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(run(ops))?;
    }
}
