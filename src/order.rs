//! Render and interaction order of the window forest
//!
//! The solver assigns every open window an integer order; higher values draw
//! above and receive input before lower ones. It guarantees that:
//!
//! - among windows of equal weight, a window opened later orders above one
//!   opened earlier, both for roots and for siblings under one parent
//! - a child always orders above its parent
//! - a window's weight (its kind's position in the sort table, times
//!   [`WEIGHT_SCALE`]) dominates open time across kinds
//!
//! Roots are sorted by open stamp and walked in that order, each window taking
//! the next slot. Children are walked right after their parent, sorted the
//! same way, and never weigh less than their parent.

use std::time::Instant;

/// Room left between two weights for per-window fine placement (for example
/// 3D content nested in a 2D window).
pub const WEIGHT_SCALE: i32 = 100;

/// Largest sort weight whose scaled order still leaves room for a window slot
/// per open window. Orders beyond it saturate.
pub const MAX_WEIGHT: i32 = 10_000_000;

/// When a window was last opened or refreshed.
///
/// The sequence number is handed out by the manager and breaks ties between
/// windows opened within the same clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OpenStamp {
    at: Instant,
    seq: u64,
}

impl OpenStamp {
    pub fn new(at: Instant, seq: u64) -> Self {
        Self { at, seq }
    }

    pub fn at(&self) -> Instant {
        self.at
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// One window of the forest handed to the solver.
#[derive(Debug, Clone)]
pub struct OrderNode<K> {
    pub key: K,
    pub stamp: OpenStamp,
    pub weight: i32,
    pub children: Vec<OrderNode<K>>,
}

impl<K> OrderNode<K> {
    pub fn leaf(key: K, stamp: OpenStamp, weight: i32) -> Self {
        Self {
            key,
            stamp,
            weight,
            children: Vec::new(),
        }
    }
}

/// Computed placement of one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement<K> {
    pub key: K,
    pub order: i32,
    /// Index among all roots, for root windows only
    pub root_index: Option<usize>,
}

/// Assigns orders to the whole forest. Placements come back in walk order.
pub fn solve<K>(mut roots: Vec<OrderNode<K>>) -> Vec<Placement<K>> {
    // Stable: equal stamps keep their input order
    roots.sort_by_key(|node| node.stamp);

    let mut placements = Vec::new();
    let mut slot = 0;
    for (root_index, root) in roots.into_iter().enumerate() {
        slot += 1;
        assign(root, None, &mut slot, Some(root_index), &mut placements);
    }
    placements
}

fn assign<K>(
    node: OrderNode<K>,
    floor: Option<i32>,
    slot: &mut i32,
    root_index: Option<usize>,
    out: &mut Vec<Placement<K>>,
) {
    let weight = match floor {
        Some(floor) => node.weight.max(floor),
        None => node.weight,
    };
    out.push(Placement {
        key: node.key,
        order: weight.saturating_mul(WEIGHT_SCALE).saturating_add(*slot),
        root_index,
    });

    let mut children = node.children;
    children.sort_by_key(|child| child.stamp);
    for child in children {
        *slot += 1;
        assign(child, Some(weight), slot, None, out);
    }
}
