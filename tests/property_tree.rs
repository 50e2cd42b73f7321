//! Property-based tests: randomly generate trees of combinators up to depth
//! 8, inject completion/cancellation/failure at the leaves, and verify the
//! combinator contract holds regardless of shape.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use promise_rs::{DirectScheduler, Future, Promise};

fn direct_scheduler() -> Arc<dyn promise_rs::Scheduler> {
    Arc::new(DirectScheduler)
}

/// What actually happens to a leaf promise.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum LeafOutcome {
    Success(i32),
    Failure,
    Cancelled,
}

fn random_leaf_outcome(rng: &mut StdRng) -> LeafOutcome {
    match rng.gen_range(0..3) {
        0 => LeafOutcome::Success(rng.gen_range(-50..50)),
        1 => LeafOutcome::Failure,
        _ => LeafOutcome::Cancelled,
    }
}

fn apply_leaf_outcome(promise: &Promise<i32>, outcome: LeafOutcome) {
    match outcome {
        LeafOutcome::Success(v) => {
            promise.try_success(v);
        }
        LeafOutcome::Failure => {
            promise.try_failure(promise_rs::into_cause(promise_rs::ResultRequired::default()));
        }
        LeafOutcome::Cancelled => {
            promise.cancel(true);
        }
    }
}

/// A single-leaf chain of `map`/`error_handling` nodes, depth 0..=8.
#[derive(Clone, Copy, Debug)]
enum UnaryOp {
    Map,
    ErrorHandling,
}

fn random_chain(rng: &mut StdRng, depth: usize) -> Vec<UnaryOp> {
    (0..depth)
        .map(|_| {
            if rng.gen_bool(0.5) {
                UnaryOp::Map
            } else {
                UnaryOp::ErrorHandling
            }
        })
        .collect()
}

fn build_chain(leaf: Future<i32>, ops: &[UnaryOp]) -> Future<i32> {
    ops.iter().fold(leaf, |acc, op| match op {
        UnaryOp::Map => acc.map(|v| v + 1),
        UnaryOp::ErrorHandling => acc.error_handling(|_cause| 0),
    })
}

/// Reference interpreter mirroring `build_chain`'s semantics for a leaf that
/// *succeeded*, used to cross-check the combinator chain's actual output.
fn interpret_success_chain(mut value: i32, ops: &[UnaryOp]) -> i32 {
    for op in ops {
        if let UnaryOp::Map = op {
            value += 1;
        }
        // error_handling only touches a failure; a success passes through.
    }
    value
}

#[test]
fn property_unary_chains_up_to_depth_8() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);

    for _ in 0..200 {
        let depth = rng.gen_range(0..=8);
        let ops = random_chain(&mut rng, depth);
        let outcome = random_leaf_outcome(&mut rng);

        let promise: Promise<i32> = Promise::new_on(direct_scheduler());
        let root = build_chain(promise.future(), &ops);

        apply_leaf_outcome(&promise, outcome);

        // Property (1): every derived node terminates.
        assert!(root.is_done(), "chain of {ops:?} applied to {outcome:?} never settled");

        let has_error_handling = ops.iter().any(|op| matches!(op, UnaryOp::ErrorHandling));

        match outcome {
            LeafOutcome::Success(v) => {
                // Property (3): success propagates through every node
                // untouched by `map`'s `+1`, matching the reference
                // interpreter exactly.
                assert_eq!(root.get_now(), Some(interpret_success_chain(v, &ops)));
            }
            LeafOutcome::Cancelled => {
                // Property (2): a leaf cancellation always reaches the
                // root, whatever nodes the chain passes through --
                // `error_handling` only recovers ordinary failures, never a
                // cancellation.
                assert!(root.is_cancelled(), "a cancellation must propagate through every unary chain");
            }
            LeafOutcome::Failure => {
                if has_error_handling {
                    assert!(root.is_success(), "error_handling should have recovered the failure");
                    assert_eq!(root.get_now(), Some(0));
                } else {
                    assert!(root.is_failed() && !root.is_cancelled());
                }
            }
        }
    }
}

/// A recursive tree including `zip_with` branch points, depth 0..=8.
enum TreeOp {
    Leaf(usize),
    Map(Box<TreeOp>),
    ErrorHandling(Box<TreeOp>),
    Zip(Box<TreeOp>, Box<TreeOp>),
}

fn random_tree(rng: &mut StdRng, depth: usize, next_leaf: &mut usize) -> TreeOp {
    if depth == 0 || rng.gen_bool(0.35) {
        let id = *next_leaf;
        *next_leaf += 1;
        return TreeOp::Leaf(id);
    }
    match rng.gen_range(0..3) {
        0 => TreeOp::Map(Box::new(random_tree(rng, depth - 1, next_leaf))),
        1 => TreeOp::ErrorHandling(Box::new(random_tree(rng, depth - 1, next_leaf))),
        _ => TreeOp::Zip(
            Box::new(random_tree(rng, depth - 1, next_leaf)),
            Box::new(random_tree(rng, depth - 1, next_leaf)),
        ),
    }
}

fn build_tree(op: &TreeOp, leaves: &[Promise<i32>]) -> Future<i32> {
    match op {
        TreeOp::Leaf(id) => leaves[*id].future(),
        TreeOp::Map(child) => build_tree(child, leaves).map(|v| v + 1),
        TreeOp::ErrorHandling(child) => build_tree(child, leaves).error_handling(|_cause| 0),
        TreeOp::Zip(l, r) => build_tree(l, leaves).zip_with(&build_tree(r, leaves), |a, b| a + b),
    }
}

#[test]
fn property_branching_trees_with_zip_always_terminate() {
    let mut rng = StdRng::seed_from_u64(0x5EED5EED);

    for _ in 0..100 {
        let depth = rng.gen_range(0..=8);
        let mut leaf_count = 0usize;
        let tree = random_tree(&mut rng, depth, &mut leaf_count);

        let leaves: Vec<Promise<i32>> = (0..leaf_count.max(1))
            .map(|_| Promise::new_on(direct_scheduler()))
            .collect();
        let root = build_tree(&tree, &leaves);

        let outcomes: Vec<LeafOutcome> = leaves.iter().map(|_| random_leaf_outcome(&mut rng)).collect();
        for (promise, outcome) in leaves.iter().zip(outcomes.iter()) {
            apply_leaf_outcome(promise, *outcome);
        }

        // Property (1): every derived node in the tree terminates, however
        // it is shaped, once all of its leaves have.
        assert!(root.is_done(), "tree with {leaf_count} leaves never settled");

        // Property (3): whatever the final state, it is internally
        // consistent -- a cancelled root always carries a cancellation
        // cause, and any other failure carries a concrete, readable one.
        if root.is_cancelled() {
            root.with_cause(|cause| {
                assert!(promise_rs::is_cancellation(cause.expect("cancelled futures have a cause")));
            });
        } else if root.is_failed() {
            root.with_cause(|cause| {
                assert!(cause.is_some());
            });
        }
    }
}
