//! Property-based tests for context id assignment and registry growth

use pgas_comms::context::{ContextOptions, ContextRegistry};
use pgas_comms::transport::LoopbackFabric;
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
enum Op {
    Create(u64),
    Destroy(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u64..8).prop_map(Op::Create),
        any::<usize>().prop_map(Op::Destroy),
    ]
}

proptest! {
    /// Ids are handed out 0, 1, 2, ... and never reused, whatever mix of
    /// creates and destroys happens in between.
    #[test]
    fn test_ids_sequential_and_stable(ops in proptest::collection::vec(op(), 1..64)) {
        let fabric = LoopbackFabric::new(1);
        let registry = ContextRegistry::new(Arc::new(fabric.endpoint(0).unwrap()));
        let mut live = Vec::new();
        let mut created = 0usize;

        for op in ops {
            match op {
                Op::Create(bits) => {
                    let ctx = registry
                        .create(ContextOptions::from_bits_truncate(bits))
                        .unwrap();
                    prop_assert_eq!(ctx.id(), created);
                    created += 1;
                    live.push(ctx);
                }
                Op::Destroy(pick) => {
                    if !live.is_empty() {
                        let ctx = live.swap_remove(pick % live.len());
                        let id = ctx.id();
                        registry.destroy(Some(ctx)).unwrap();
                        prop_assert!(registry.get(id).is_none());
                    }
                }
            }

            prop_assert_eq!(registry.live(), live.len());
            prop_assert_eq!(registry.high_water(), created);
            prop_assert!(registry.capacity() >= registry.high_water());
            for ctx in &live {
                let slot = registry.get(ctx.id());
                prop_assert!(slot.is_some_and(|s| Arc::ptr_eq(&s, ctx)));
            }
        }
    }
}
