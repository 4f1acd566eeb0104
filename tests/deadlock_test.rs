// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Deadlock detection tests using parking_lot's built-in deadlock detector.
//!
//! These tests share one engine across many threads and verify that the
//! engine mutex and the event journal never end up in a lock cycle.
//!
//! The dev build enables parking_lot's `deadlock_detection` feature, so
//! the engine's own mutex takes part in detection.

use parking_lot::deadlock;
use rayon::prelude::*;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tranche_ledger::config::FacilityTerms;
use tranche_ledger::math::{CURRENCY_SCALE as USDC, SECONDS_PER_DAY as DAY};
use tranche_ledger::{ActorId, Engine, Event, EventKind, FacilityId, Outcome, ProtocolConfig, TrancheKind};

const ADMIN: u16 = 0;
const BORROWER: u16 = 10;
const FACILITY: FacilityId = FacilityId(0);

// === Helpers ===

fn make_engine() -> Engine {
    let config = ProtocolConfig {
        facilities: vec![FacilityTerms {
            borrower: ActorId(BORROWER),
            max_limit: dec!(1000000),
            ..FacilityTerms::default()
        }],
        ..ProtocolConfig::default()
    };
    Engine::new(&config).unwrap()
}

fn make_junior_deposit(amount: u128) -> EventKind {
    EventKind::Deposit {
        facility: FACILITY,
        tranche: TrancheKind::Junior,
        amount,
    }
}

/// Junior 20, pool 80, all drawn at t = 0. Uses event IDs 1..=6.
fn make_drawn_engine() -> Engine {
    let engine = make_engine();
    let setup = [
        (20, make_junior_deposit(20 * USDC)),
        (30, EventKind::PoolDeposit { amount: 80 * USDC }),
        (BORROWER, EventKind::LockJunior { facility: FACILITY }),
        (ADMIN, EventKind::Invest { facility: FACILITY }),
        (BORROWER, EventKind::LockPool { facility: FACILITY }),
        (
            BORROWER,
            EventKind::Drawdown {
                facility: FACILITY,
                amount: 100 * USDC,
            },
        ),
    ];
    for (id, (actor, kind)) in setup.into_iter().enumerate() {
        engine.process(Event::new(id as u64 + 1, actor, 0, kind)).unwrap();
    }
    engine
}

// === Deadlock Detection Infrastructure ===

/// Starts a background thread that checks for deadlocks.
/// Returns a handle to stop the detector.
fn start_deadlock_detector() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    thread::spawn(move || {
        while running_clone.load(Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(100));
            let deadlocks = deadlock::check_deadlock();
            if !deadlocks.is_empty() {
                eprintln!("\n=== DEADLOCK DETECTED ===");
                for (i, threads) in deadlocks.iter().enumerate() {
                    eprintln!("\nDeadlock #{}", i + 1);
                    for t in threads {
                        eprintln!("Thread ID: {:?}", t.thread_id());
                        eprintln!("Backtrace:\n{:#?}", t.backtrace());
                    }
                }
                panic!("Deadlock detected! See output above for details.");
            }
        }
    });

    running
}

/// Stops the deadlock detector.
fn stop_deadlock_detector(running: Arc<AtomicBool>) {
    running.store(false, Ordering::SeqCst);
    thread::sleep(Duration::from_millis(150)); // Let detector thread exit
}

// === Tests ===

/// Many threads depositing into the same tranche.
#[test]
fn no_deadlock_concurrent_deposits() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(make_engine());
    let event_ids = Arc::new(AtomicU64::new(1));

    const NUM_THREADS: usize = 16;
    const OPS_PER_THREAD: usize = 100;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for thread_index in 0..NUM_THREADS {
        let engine = engine.clone();
        let event_ids = event_ids.clone();
        handles.push(thread::spawn(move || {
            for _ in 0..OPS_PER_THREAD {
                let id = event_ids.fetch_add(1, Ordering::SeqCst);
                let actor = 100 + thread_index as u16;
                engine
                    .process(Event::new(id, actor, 0, make_junior_deposit(USDC)))
                    .unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    let status = engine.facility_status(FACILITY).unwrap();
    let expected = (NUM_THREADS * OPS_PER_THREAD) as u128 * USDC;
    assert_eq!(status.junior.principal_deposited(), expected);
    assert_eq!(engine.positions().unwrap().len(), NUM_THREADS * OPS_PER_THREAD);
    assert_eq!(engine.events().len(), NUM_THREADS * OPS_PER_THREAD);
}

/// Readers take snapshots while writers move money through the pool.
#[test]
fn no_deadlock_readers_during_mutation() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(make_engine());
    let event_ids = Arc::new(AtomicU64::new(1));
    let stop = Arc::new(AtomicBool::new(false));

    const WRITERS: usize = 8;
    const READERS: usize = 8;
    const OPS_PER_WRITER: usize = 200;

    let mut readers = Vec::with_capacity(READERS);
    for _ in 0..READERS {
        let engine = engine.clone();
        let stop = stop.clone();
        readers.push(thread::spawn(move || {
            let mut snapshots = 0usize;
            while !stop.load(Ordering::SeqCst) {
                let pool = engine.pool_status();
                assert!(pool.total_shares <= pool.assets);
                let _ = engine.facilities();
                let _ = engine.positions().unwrap();
                let _ = engine.events().len();
                snapshots += 1;
            }
            snapshots
        }));
    }

    let mut writers = Vec::with_capacity(WRITERS);
    for thread_index in 0..WRITERS {
        let engine = engine.clone();
        let event_ids = event_ids.clone();
        writers.push(thread::spawn(move || {
            let actor = 200 + thread_index as u16;
            for i in 0..OPS_PER_WRITER {
                let id = event_ids.fetch_add(1, Ordering::SeqCst);
                let kind = if i % 2 == 0 {
                    EventKind::PoolDeposit { amount: 10 * USDC }
                } else {
                    EventKind::PoolWithdraw { amount: 5 * USDC }
                };
                engine.process(Event::new(id, actor, 0, kind)).unwrap();
            }
        }));
    }

    for writer in writers {
        writer.join().expect("Writer panicked");
    }
    stop.store(true, Ordering::SeqCst);
    for reader in readers {
        reader.join().expect("Reader panicked");
    }

    stop_deadlock_detector(detector);

    let per_writer = (OPS_PER_WRITER / 2) as u128 * 5 * USDC;
    assert_eq!(engine.pool_status().total_shares, WRITERS as u128 * per_writer);
    for thread_index in 0..WRITERS {
        assert_eq!(engine.pool_shares(ActorId(200 + thread_index as u16)), per_writer);
    }
}

/// Every thread replays the same IDs; each ID is applied exactly once.
#[test]
fn no_deadlock_duplicate_ids_across_threads() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(make_engine());
    let applied = Arc::new(AtomicUsize::new(0));

    const NUM_THREADS: usize = 8;
    const IDS: u64 = 250;

    let mut handles = Vec::with_capacity(NUM_THREADS);
    for _ in 0..NUM_THREADS {
        let engine = engine.clone();
        let applied = applied.clone();
        handles.push(thread::spawn(move || {
            for id in 1..=IDS {
                if engine
                    .process(Event::new(id, 7, 0, make_junior_deposit(USDC)))
                    .is_ok()
                {
                    applied.fetch_add(1, Ordering::SeqCst);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    stop_deadlock_detector(detector);

    assert_eq!(applied.load(Ordering::SeqCst), IDS as usize);
    assert_eq!(
        engine.facility_status(FACILITY).unwrap().junior.principal_deposited(),
        IDS as u128 * USDC
    );
}

/// Parallel payments through the waterfall keep the reserve consistent.
#[test]
fn no_deadlock_parallel_payments() {
    let detector = start_deadlock_detector();
    let engine = make_drawn_engine();
    let now = 365 * DAY;

    let reserve: u128 = (100u64..300)
        .into_par_iter()
        .map(|id| match engine.process(Event::new(id, 40, now, EventKind::Pay { facility: FACILITY, amount: USDC })) {
            Ok(Outcome::Allocated(receipt)) => {
                assert_eq!(receipt.total(), USDC);
                receipt.reserve
            }
            other => panic!("payment not allocated: {other:?}"),
        })
        .sum();

    stop_deadlock_detector(detector);

    assert_eq!(engine.reserve(), reserve);
    let status = engine.facility_status(FACILITY).unwrap();
    assert_eq!(status.balance, 0);
    assert_eq!(status.reserve_collected, reserve);
}

/// Draining the journal while events are submitted loses nothing.
#[test]
fn no_deadlock_drain_during_processing() {
    let detector = start_deadlock_detector();
    let engine = Arc::new(make_engine());
    let stop = Arc::new(AtomicBool::new(false));

    const EVENTS: u64 = 2_000;

    let drainer = {
        let engine = engine.clone();
        let stop = stop.clone();
        thread::spawn(move || {
            let mut drained = 0usize;
            while !stop.load(Ordering::SeqCst) {
                drained += engine.events().drain().len();
            }
            drained
        })
    };

    (1..=EVENTS).into_par_iter().for_each(|id| {
        engine
            .process(Event::new(id, 9, 0, make_junior_deposit(USDC)))
            .unwrap();
    });

    stop.store(true, Ordering::SeqCst);
    let drained = drainer.join().expect("Drainer panicked") + engine.events().drain().len();

    stop_deadlock_detector(detector);

    assert_eq!(drained, EVENTS as usize);
    assert_eq!(engine.events().len(), EVENTS as usize);
}
