use std::cell::Cell;

/// Depth cap on a reference chain: a chain of more than this many distinct values is reported
/// as a cycle. Rendering reaches its own element depth limit (32) first; clip walks stop at
/// the same 64 levels.
pub(crate) const DECYCLER_CAPACITY: usize = 64;

/// Cycle detector for recursive reference resolution.
///
/// Every recursion level holds a [`DecyclerNode`] and records the value it is about to
/// follow. The values along the current chain live in a fixed inline array; a visit compares
/// the new value (the hare, at depth `d`) with the value at depth `d / 2` (the tortoise), so a
/// chain that loops is caught within a couple of turns around the loop and a chain of distinct
/// values is never flagged. Nothing is allocated.
pub(crate) struct Decycler {
    values: [Cell<usize>; DECYCLER_CAPACITY],
    depth: Cell<usize>,
}

impl Default for Decycler {
    fn default() -> Self {
        Self::new()
    }
}

impl Decycler {
    pub fn new() -> Self {
        Self {
            values: std::array::from_fn(|_| Cell::new(0)),
            depth: Cell::new(0),
        }
    }

    /// Opens one recursion level. The level closes when the node drops.
    pub fn node(&self) -> DecyclerNode<'_> {
        DecyclerNode {
            decycler: self,
            slot: self.depth.get(),
        }
    }

    pub fn depth(&self) -> usize {
        self.depth.get()
    }
}

pub(crate) struct DecyclerNode<'d> {
    decycler: &'d Decycler,
    slot: usize,
}

impl DecyclerNode<'_> {
    /// Records `value` as this level's target. Returns false when following it would repeat
    /// the chain (or the chain is too long); the caller must not descend.
    pub fn visit(&mut self, value: usize) -> bool {
        let d = self.slot;
        if d >= DECYCLER_CAPACITY {
            return false;
        }
        self.decycler.values[d].set(value);
        self.decycler.depth.set(d + 1);
        if d == 0 {
            return true;
        }
        self.decycler.values[d / 2].get() != value
    }
}

impl Drop for DecyclerNode<'_> {
    fn drop(&mut self) {
        self.decycler.depth.set(self.slot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Follows `next` from `at` until the decycler objects; returns how many levels were
    /// entered.
    fn follow(decycler: &Decycler, next: &dyn Fn(usize) -> Option<usize>, at: usize) -> usize {
        let mut node = decycler.node();
        if !node.visit(at) {
            return 0;
        }
        match next(at) {
            Some(n) => 1 + follow(decycler, next, n),
            None => 1,
        }
    }

    #[test]
    fn distinct_chain_is_never_flagged() {
        let decycler = Decycler::new();
        let n = 40;
        let next = |v: usize| (v + 1 < n).then_some(v + 1);
        assert_eq!(follow(&decycler, &next, 0), n);
        assert_eq!(decycler.depth(), 0);
    }

    #[test]
    fn loop_is_reported_within_linear_visits() {
        for len in 1..=12usize {
            let decycler = Decycler::new();
            let next = |v: usize| Some((v + 1) % len);
            let entered = follow(&decycler, &next, 0);
            assert!(entered <= 2 * len + 1, "len {len} entered {entered}");
            assert_eq!(decycler.depth(), 0);
        }
    }

    #[test]
    fn tail_before_loop_is_tolerated() {
        let decycler = Decycler::new();
        // 100, 101, 102 lead into the loop 0 -> 1 -> 2 -> 0.
        let next = |v: usize| Some(if v >= 100 { if v == 102 { 0 } else { v + 1 } } else { (v + 1) % 3 });
        let entered = follow(&decycler, &next, 100);
        assert!(entered >= 3 && entered < 20, "entered {entered}");
    }

    #[test]
    fn siblings_reuse_their_level() {
        let decycler = Decycler::new();
        let mut parent = decycler.node();
        assert!(parent.visit(7));
        for child in [1usize, 2, 3] {
            let mut node = decycler.node();
            assert!(node.visit(child));
            assert_eq!(decycler.depth(), 2);
        }
        assert_eq!(decycler.depth(), 1);
        assert!(parent.visit(8));
        drop(parent);
        assert_eq!(decycler.depth(), 0);
    }

    #[test]
    fn capacity_overflow_counts_as_cycle() {
        let decycler = Decycler::new();
        let next = |v: usize| Some(v + 1);
        assert_eq!(follow(&decycler, &next, 0), DECYCLER_CAPACITY);
    }
}
