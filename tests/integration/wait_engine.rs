//! Integration tests for the wait-until primitives

use super::test_utils::single_rank_registry;
use pgas_comms::context::ContextOptions;
use pgas_comms::transport::Transport;
use pgas_comms::wait::{test, wait_until, Comparator};
use std::sync::atomic::{AtomicBool, AtomicI16, AtomicI32, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// (initial, value, store) per comparator: `initial` fails the predicate,
/// `store` satisfies it.
fn case(comparator: Comparator) -> (i16, i16, i16) {
    match comparator {
        Comparator::Eq => (4, 5, 5),
        Comparator::Ne => (5, 5, 6),
        Comparator::Gt => (5, 5, 6),
        Comparator::Lt => (5, 5, 4),
        Comparator::Ge => (4, 5, 5),
        Comparator::Le => (6, 5, 5),
    }
}

macro_rules! wait_every_comparator {
    ($name:ident, $atomic:ty, $value:ty) => {
        #[test]
        fn $name() {
            let (_fabric, registry) = single_rank_registry();
            let ctx = registry.create(ContextOptions::empty()).unwrap();

            for comparator in Comparator::ALL {
                let (initial, value, store) = case(comparator);
                let word = Arc::new(<$atomic>::new(<$value>::from(initial)));
                assert!(!test(word.as_ref(), comparator, <$value>::from(value)));

                let writer = {
                    let word = Arc::clone(&word);
                    thread::spawn(move || {
                        thread::sleep(Duration::from_millis(5));
                        word.store(<$value>::from(store), Ordering::Release);
                    })
                };

                wait_until(&ctx, word.as_ref(), comparator, <$value>::from(value));
                assert!(
                    comparator.compare(word.load(Ordering::Acquire), <$value>::from(value)),
                    "{} returned with predicate false",
                    comparator
                );
                writer.join().unwrap();
            }
        }
    };
}

wait_every_comparator!(test_wait_until_16, AtomicI16, i16);
wait_every_comparator!(test_wait_until_32, AtomicI32, i32);
wait_every_comparator!(test_wait_until_64, AtomicI64, i64);

#[test]
fn test_does_not_return_while_predicate_false() {
    let (_fabric, registry) = single_rank_registry();
    let ctx = registry.create(ContextOptions::empty()).unwrap();
    let word = Arc::new(AtomicI32::new(4));
    let returned = Arc::new(AtomicBool::new(false));

    let waiter = {
        let word = Arc::clone(&word);
        let returned = Arc::clone(&returned);
        thread::spawn(move || {
            wait_until(&ctx, word.as_ref(), Comparator::Eq, 5);
            returned.store(true, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!returned.load(Ordering::SeqCst));

    // Unrelated values must not release the waiter either.
    word.store(6, Ordering::Release);
    thread::sleep(Duration::from_millis(20));
    assert!(!returned.load(Ordering::SeqCst));

    word.store(5, Ordering::Release);
    waiter.join().unwrap();
    assert!(returned.load(Ordering::SeqCst));
}

#[test]
fn test_remote_put_releases_waiter() {
    let (fabric, registry) = single_rank_registry();
    let word = Arc::new(AtomicI64::new(0));
    let addr = registry
        .transport()
        .register_symmetric(Arc::clone(&word))
        .unwrap();

    let writer_ctx = registry.create(ContextOptions::SERIALIZED).unwrap();
    let waiter_ctx = registry.create(ContextOptions::PRIVATE).unwrap();

    let waiter = {
        let word = Arc::clone(&word);
        thread::spawn(move || wait_until(&waiter_ctx, word.as_ref(), Comparator::Gt, 10))
    };

    writer_ctx.put_i64(addr, 11, 0).unwrap();
    writer_ctx.quiet().unwrap();
    waiter.join().unwrap();
    assert_eq!(fabric.peek(0, addr), Some(11));
}
