use std::sync::{Arc, Barrier};
use std::thread;

use crate::common::*;

#[test]
fn test_concurrent_debits_only_one_wins() {
    const RACERS: usize = 8;
    let (state, _dir) = file_state(RACERS as u32);
    fund(&state, "owner-1", 10);

    let barrier = Arc::new(Barrier::new(RACERS));
    let handles: Vec<_> = (0..RACERS)
        .map(|i| {
            let ledger = state.ledger.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                ledger.debit("owner-1", 10, &format!("racer {}", i), None)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let insufficient = results
        .iter()
        .filter(|r| {
            r.as_ref().err().and_then(|e| e.denial()) == Some(DenialReason::InsufficientCredits)
        })
        .count();
    assert_eq!(successes, 1);
    assert_eq!(insufficient, RACERS - 1);

    assert_eq!(state.ledger.get_balance("owner-1").unwrap(), 0);
    let (txns, total) = state.ledger.list_transactions("owner-1", 50, 0).unwrap();
    assert_eq!(total, 2, "one purchase plus exactly one usage row");
    assert_eq!(
        txns.iter()
            .filter(|t| t.transaction_type == TransactionType::Usage)
            .count(),
        1
    );
    assert!(state.ledger.reconcile("owner-1").unwrap().consistent);
}

#[test]
fn test_interleaved_credits_and_debits_reconcile() {
    let (state, _dir) = file_state(6);
    fund(&state, "owner-1", 20);

    let handles: Vec<_> = (0..6)
        .map(|i| {
            let ledger = state.ledger.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    if i % 2 == 0 {
                        ledger
                            .credit("owner-1", 3, TransactionType::Bonus, "bonus", None)
                            .unwrap();
                    } else {
                        let _ = ledger.debit("owner-1", 5, "usage", None);
                    }
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let report = state.ledger.reconcile("owner-1").unwrap();
    assert!(report.consistent, "{:?}", report);
    assert!(report.stored_balance >= 0);
}
