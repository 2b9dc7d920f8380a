//! Integration tests for context creation, destruction and the registry

use super::test_utils::single_rank_registry;
use pgas_comms::context::{ContextOptions, CONTEXT_BLOCK};
use pgas_comms::error::ContextError;
use pgas_comms::transport::{worker_id_from_address, ThreadMode, Transport, WorkerOp};
use std::sync::atomic::AtomicI64;
use std::sync::Arc;

#[test]
fn test_ids_are_never_reused_after_destroy() {
    let (_fabric, registry) = single_rank_registry();

    let a = registry.create(ContextOptions::empty()).unwrap();
    let b = registry.create(ContextOptions::empty()).unwrap();
    assert_eq!((a.id(), b.id()), (0, 1));

    registry.destroy(Some(a)).unwrap();
    let c = registry.create(ContextOptions::empty()).unwrap();
    assert_eq!(c.id(), 2);

    assert!(registry.get(0).is_none());
    assert_eq!(registry.get(1).unwrap().id(), 1);
    assert_eq!(registry.get(2).unwrap().id(), 2);
}

#[test]
fn test_storage_never_shrinks() {
    let (_fabric, registry) = single_rank_registry();

    let contexts: Vec<_> = (0..CONTEXT_BLOCK + 3)
        .map(|_| registry.create(ContextOptions::empty()).unwrap())
        .collect();
    let capacity = registry.capacity();
    assert!(capacity >= 2 * CONTEXT_BLOCK);

    let destroyed = 5;
    for ctx in contexts.into_iter().take(destroyed) {
        registry.destroy(Some(ctx)).unwrap();
    }

    assert_eq!(registry.live(), CONTEXT_BLOCK + 3 - destroyed);
    assert_eq!(registry.high_water(), CONTEXT_BLOCK + 3);
    assert!(registry.capacity() >= capacity);
}

#[test]
fn test_destroy_quiets_before_release() {
    let (fabric, registry) = single_rank_registry();
    let transport = registry.transport().clone();
    let target = transport
        .register_symmetric(Arc::new(AtomicI64::new(0)))
        .unwrap();

    let ctx = registry.create(ContextOptions::empty()).unwrap();
    let worker = worker_id_from_address(&ctx.address().unwrap()).unwrap();
    ctx.put_i64(target, 9, 0).unwrap();
    assert_eq!(fabric.peek(0, target), Some(0));

    registry.destroy(Some(ctx)).unwrap();
    assert_eq!(fabric.peek(0, target), Some(9));

    let ops = fabric.worker_journal(worker);
    assert_eq!(
        ops,
        vec![
            WorkerOp::Create(ThreadMode::Multi),
            WorkerOp::Put {
                dest: target,
                value: 9,
                target: 0
            },
            WorkerOp::Deliver {
                dest: target,
                target: 0
            },
            WorkerOp::Quiet,
            WorkerOp::Release,
        ]
    );
}

#[test]
fn test_thread_mode_follows_options() {
    let (_fabric, registry) = single_rank_registry();

    let cases = [
        (ContextOptions::SERIALIZED, ThreadMode::Serialized),
        (ContextOptions::PRIVATE, ThreadMode::Single),
        (ContextOptions::empty(), ThreadMode::Multi),
        (ContextOptions::NOSTORE, ThreadMode::Multi),
        (
            ContextOptions::SERIALIZED | ContextOptions::PRIVATE,
            ThreadMode::Serialized,
        ),
        (
            ContextOptions::PRIVATE | ContextOptions::NOSTORE,
            ThreadMode::Single,
        ),
    ];

    for (options, expected) in cases {
        let ctx = registry.create(options).unwrap();
        assert_eq!(ctx.thread_mode(), expected, "options {:?}", options);
        assert_eq!(ctx.flags().thread_mode(), expected);
        assert_eq!(
            ctx.flags().nostore,
            options.contains(ContextOptions::NOSTORE)
        );
    }
}

#[test]
fn test_default_context_publishes_address() {
    let (_fabric, registry) = single_rank_registry();
    assert_eq!(registry.addresses().published(), 0);

    let ctx = registry.create_default().unwrap();
    assert_eq!(ctx.id(), 0);

    let published = registry.addresses().get(0).unwrap();
    assert_eq!(published, ctx.address().unwrap());
    assert!(!published.is_empty());
}

#[test]
fn test_default_context_address_failure() {
    let (fabric, registry) = single_rank_registry();
    fabric.fail_address(true);

    let err = registry.create_default().unwrap_err();
    assert!(matches!(err, ContextError::AddressUnavailable(_)));
    assert_eq!(registry.live(), 0);
    assert_eq!(registry.addresses().published(), 0);
    assert!(registry.default_context().is_none());

    fabric.fail_address(false);
    let ctx = registry.create_default().unwrap();
    assert_eq!(ctx.id(), 1);
}

#[test]
fn test_worker_create_failure_leaves_no_slot() {
    let (fabric, registry) = single_rank_registry();
    fabric.fail_worker_create(true);
    assert!(matches!(
        registry.create(ContextOptions::empty()),
        Err(ContextError::Transport(_))
    ));
    fabric.fail_worker_create(false);
    assert_eq!(registry.create(ContextOptions::empty()).unwrap().id(), 0);
}
