//! Augmented red-black interval tree over code-unit offsets.
//!
//! Nodes live in an index arena (no raw pointers); index 0 is the shared NIL
//! sentinel. Keys are interval start offsets. Two augmentations ride along:
//!
//! * `max_end`: the largest interval end in a node's subtree, enabling the
//!   usual pruned overlap search;
//! * `delta`: a lazily applied offset for a whole subtree, so an edit that
//!   shifts everything to its right costs `O(log n)` instead of `O(n)`.
//!
//! Stored `start`/`end`/`max_end` values of a node are relative: the absolute
//! value adds the `delta` of the node itself and of every ancestor.
//! Rotations and deletions first push the pivot nodes' deltas down one level
//! so that local surgery never changes any absolute interval.
//!
//! `accept_replace` is the single entry point for text edits: overlapping
//! nodes are detached, the remainder of the tree is shifted wholesale, and
//! the detached nodes are re-inserted at positions computed from their
//! stickiness policy.

mod stickiness;

pub use stickiness::Stickiness;

use std::cell::Cell;

/// Handle to a node in the arena. Index 0 is reserved for the sentinel.
pub type NodeId = u32;

const NIL: NodeId = 0;

#[derive(Debug)]
struct Node {
    parent: NodeId,
    left: NodeId,
    right: NodeId,
    red: bool,
    /// Interval start, relative to the accumulated ancestor deltas.
    start: i64,
    /// Interval end, same frame as `start`.
    end: i64,
    /// Offset applied to this node and its entire subtree.
    delta: i64,
    /// Max interval end within the subtree, same frame as `start`.
    max_end: i64,
    in_tree: bool,

    owner_id: usize,
    stickiness: Stickiness,
    collapse_on_replace: bool,
    is_for_validation: bool,

    cached_abs_start: Cell<usize>,
    cached_abs_end: Cell<usize>,
    cached_version: Cell<u64>,
}

impl Node {
    fn detached() -> Self {
        Node {
            parent: NIL,
            left: NIL,
            right: NIL,
            red: false,
            start: 0,
            end: 0,
            delta: 0,
            max_end: 0,
            in_tree: false,
            owner_id: 0,
            stickiness: Stickiness::AlwaysGrowsWhenTypingAtEdges,
            collapse_on_replace: false,
            is_for_validation: false,
            cached_abs_start: Cell::new(0),
            cached_abs_end: Cell::new(0),
            cached_version: Cell::new(0),
        }
    }
}

/// Metadata attached to a node at allocation time.
#[derive(Debug, Clone, Copy)]
pub struct NodeData {
    pub owner_id: usize,
    pub stickiness: Stickiness,
    pub collapse_on_replace: bool,
    pub is_for_validation: bool,
}

pub struct IntervalTree {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    root: NodeId,
    len: usize,
}

impl Default for IntervalTree {
    fn default() -> Self {
        Self::new()
    }
}

impl IntervalTree {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::detached()],
            free: Vec::new(),
            root: NIL,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocate a detached node. The caller inserts it with [`Self::insert`].
    pub fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = match self.free.pop() {
            Some(id) => {
                self.nodes[id as usize] = Node::detached();
                id
            }
            None => {
                self.nodes.push(Node::detached());
                (self.nodes.len() - 1) as NodeId
            }
        };
        let n = &mut self.nodes[id as usize];
        n.owner_id = data.owner_id;
        n.stickiness = data.stickiness;
        n.collapse_on_replace = data.collapse_on_replace;
        n.is_for_validation = data.is_for_validation;
        id
    }

    /// Return a detached node to the free list.
    pub fn dealloc(&mut self, id: NodeId) {
        debug_assert!(!self.nodes[id as usize].in_tree, "dealloc of live node");
        self.free.push(id);
    }

    /// Replace the metadata of a node (detached or live; the interval key is
    /// untouched).
    pub fn set_data(&mut self, id: NodeId, data: NodeData) {
        let n = &mut self.nodes[id as usize];
        n.owner_id = data.owner_id;
        n.stickiness = data.stickiness;
        n.collapse_on_replace = data.collapse_on_replace;
        n.is_for_validation = data.is_for_validation;
    }

    pub fn owner_id(&self, id: NodeId) -> usize {
        self.nodes[id as usize].owner_id
    }

    /// Insert a detached node with the given absolute interval.
    pub fn insert(&mut self, z: NodeId, abs_start: usize, abs_end: usize) {
        debug_assert!(abs_start <= abs_end);
        debug_assert!(!self.nodes[z as usize].in_tree, "double insert");
        let abs_start = abs_start as i64;
        let abs_end = abs_end as i64;
        {
            let n = &mut self.nodes[z as usize];
            n.left = NIL;
            n.right = NIL;
            n.delta = 0;
            n.red = true;
            n.in_tree = true;
            n.cached_version.set(0);
        }
        self.len += 1;

        if self.root == NIL {
            let n = &mut self.nodes[z as usize];
            n.parent = NIL;
            n.start = abs_start;
            n.end = abs_end;
            n.max_end = abs_end;
            n.red = false;
            self.root = z;
            return;
        }

        let mut x = self.root;
        let mut acc = 0i64;
        loop {
            acc += self.nodes[x as usize].delta;
            let x_start = acc + self.nodes[x as usize].start;
            if abs_start < x_start {
                let left = self.nodes[x as usize].left;
                if left == NIL {
                    self.nodes[x as usize].left = z;
                    break;
                }
                x = left;
            } else {
                let right = self.nodes[x as usize].right;
                if right == NIL {
                    self.nodes[x as usize].right = z;
                    break;
                }
                x = right;
            }
        }
        {
            let n = &mut self.nodes[z as usize];
            n.parent = x;
            n.start = abs_start - acc;
            n.end = abs_end - acc;
            n.max_end = n.end;
        }
        // Bubble the new end up before rebalancing.
        let mut up = x;
        while up != NIL {
            self.recompute_max_end(up);
            up = self.nodes[up as usize].parent;
        }
        self.insert_fixup(z);
    }

    /// Detach a node from the tree. The node keeps its identity and can be
    /// re-inserted.
    pub fn delete(&mut self, z: NodeId) {
        debug_assert!(self.nodes[z as usize].in_tree, "delete of detached node");
        self.push_path_deltas(z);
        let has_both =
            self.nodes[z as usize].left != NIL && self.nodes[z as usize].right != NIL;
        let mut y = z;
        if has_both {
            y = self.minimum(self.nodes[z as usize].right);
            self.push_path_deltas(y);
        }
        let mut y_was_red = self.nodes[y as usize].red;
        let x;
        if self.nodes[z as usize].left == NIL {
            x = self.nodes[z as usize].right;
            self.transplant(z, x);
        } else if self.nodes[z as usize].right == NIL {
            x = self.nodes[z as usize].left;
            self.transplant(z, x);
        } else {
            y_was_red = self.nodes[y as usize].red;
            x = self.nodes[y as usize].right;
            if self.nodes[y as usize].parent == z {
                self.nodes[x as usize].parent = y;
            } else {
                self.transplant(y, x);
                let zr = self.nodes[z as usize].right;
                self.nodes[y as usize].right = zr;
                self.nodes[zr as usize].parent = y;
            }
            self.transplant(z, y);
            let zl = self.nodes[z as usize].left;
            self.nodes[y as usize].left = zl;
            self.nodes[zl as usize].parent = y;
            self.nodes[y as usize].red = self.nodes[z as usize].red;
        }

        // Repair max_end from the surgery point upward. When x is the
        // sentinel its parent was set by the transplant above.
        let mut up = self.nodes[x as usize].parent;
        while up != NIL {
            self.recompute_max_end(up);
            up = self.nodes[up as usize].parent;
        }

        if !y_was_red {
            self.delete_fixup(x);
        }

        let n = &mut self.nodes[z as usize];
        n.parent = NIL;
        n.left = NIL;
        n.right = NIL;
        n.red = false;
        n.delta = 0;
        n.in_tree = false;
        self.len -= 1;
        self.nodes[NIL as usize].parent = NIL;
        self.nodes[NIL as usize].red = false;
    }

    /// Absolute interval of a node, using the cached value when it is still
    /// valid for `version`.
    pub fn resolve(&self, id: NodeId, version: u64) -> (usize, usize) {
        let n = &self.nodes[id as usize];
        if n.cached_version.get() == version {
            return (n.cached_abs_start.get(), n.cached_abs_end.get());
        }
        let mut s = n.start;
        let mut e = n.end;
        let mut walk = id;
        while walk != NIL {
            let w = &self.nodes[walk as usize];
            s += w.delta;
            e += w.delta;
            walk = w.parent;
        }
        debug_assert!(s >= 0 && e >= s);
        n.cached_abs_start.set(s as usize);
        n.cached_abs_end.set(e as usize);
        n.cached_version.set(version);
        (s as usize, e as usize)
    }

    /// Absolute interval of a node, always freshly computed (no cache
    /// read or write). For callers about to restructure the tree.
    pub fn current_interval(&self, id: NodeId) -> (usize, usize) {
        let n = &self.nodes[id as usize];
        let mut s = n.start;
        let mut e = n.end;
        let mut walk = id;
        while walk != NIL {
            let w = &self.nodes[walk as usize];
            s += w.delta;
            e += w.delta;
            walk = w.parent;
        }
        (s.max(0) as usize, e.max(0) as usize)
    }

    /// Every node whose interval overlaps `[lo, hi]` (closed on both sides),
    /// in ascending start order. `filter_owner == 0` matches any owner.
    pub fn interval_search(
        &self,
        lo: usize,
        hi: usize,
        filter_owner: usize,
        filter_out_validation: bool,
        version: u64,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.search_rec(
            self.root,
            0,
            Some((lo as i64, hi as i64)),
            filter_owner,
            filter_out_validation,
            version,
            &mut out,
        );
        out
    }

    /// Full in-order scan with the same filters as `interval_search`.
    pub fn search(
        &self,
        filter_owner: usize,
        filter_out_validation: bool,
        version: u64,
    ) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.search_rec(
            self.root,
            0,
            None,
            filter_owner,
            filter_out_validation,
            version,
            &mut out,
        );
        out
    }

    /// All nodes registered by `owner_id`, in ascending start order.
    pub fn collect_from_owner(&self, owner_id: usize, version: u64) -> Vec<NodeId> {
        self.search(owner_id, false, version)
    }

    /// Adjust every interval for the replacement of `[offset, offset+length)`
    /// with `text_length` units of new text.
    pub fn accept_replace(
        &mut self,
        offset: usize,
        length: usize,
        text_length: usize,
        force_move_markers: bool,
    ) {
        let lo = offset as i64;
        let hi = (offset + length) as i64;
        let edit_delta = text_length as i64 - length as i64;

        let mut hits: Vec<(NodeId, i64, i64)> = Vec::new();
        self.collect_editing(self.root, 0, lo, hi, &mut hits);
        for &(id, _, _) in &hits {
            self.delete(id);
        }
        self.shift_after(self.root, 0, hi, edit_delta);
        for (id, abs_start, abs_end) in hits {
            let (stickiness, collapse) = {
                let n = &self.nodes[id as usize];
                (n.stickiness, n.collapse_on_replace)
            };
            let (new_start, new_end) = accept_edit_for_interval(
                abs_start,
                abs_end,
                lo,
                hi,
                text_length as i64,
                force_move_markers,
                stickiness,
                collapse,
            );
            self.insert(id, new_start as usize, new_end as usize);
        }
    }

    // ------------------------------------------------------------------
    // internal machinery
    // ------------------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    fn search_rec(
        &self,
        n: NodeId,
        acc: i64,
        window: Option<(i64, i64)>,
        filter_owner: usize,
        filter_out_validation: bool,
        version: u64,
        out: &mut Vec<NodeId>,
    ) {
        if n == NIL {
            return;
        }
        let node = &self.nodes[n as usize];
        let acc = acc + node.delta;
        if let Some((lo, _)) = window {
            if acc + node.max_end < lo {
                return;
            }
        }
        self.search_rec(
            node.left,
            acc,
            window,
            filter_owner,
            filter_out_validation,
            version,
            out,
        );
        let s = acc + node.start;
        if let Some((_, hi)) = window {
            if s > hi {
                return;
            }
        }
        let e = acc + node.end;
        let overlaps = match window {
            Some((lo, _)) => e >= lo,
            None => true,
        };
        if overlaps {
            node.cached_abs_start.set(s as usize);
            node.cached_abs_end.set(e as usize);
            node.cached_version.set(version);
            let owner_ok = filter_owner == 0 || node.owner_id == filter_owner;
            let validation_ok = !filter_out_validation || !node.is_for_validation;
            if owner_ok && validation_ok {
                out.push(n);
            }
        }
        self.search_rec(
            node.right,
            acc,
            window,
            filter_owner,
            filter_out_validation,
            version,
            out,
        );
    }

    fn collect_editing(
        &self,
        n: NodeId,
        acc: i64,
        lo: i64,
        hi: i64,
        out: &mut Vec<(NodeId, i64, i64)>,
    ) {
        if n == NIL {
            return;
        }
        let node = &self.nodes[n as usize];
        let acc = acc + node.delta;
        if acc + node.max_end < lo {
            return;
        }
        self.collect_editing(node.left, acc, lo, hi, out);
        let s = acc + node.start;
        if s > hi {
            return;
        }
        let e = acc + node.end;
        if e >= lo {
            out.push((n, s, e));
        }
        self.collect_editing(node.right, acc, lo, hi, out);
    }

    /// Shift every node starting after `edit_end` by `edit_delta`. Assumes
    /// no remaining interval overlaps `[edit_start, edit_end]`.
    fn shift_after(&mut self, n: NodeId, acc: i64, edit_end: i64, edit_delta: i64) {
        if n == NIL || edit_delta == 0 {
            return;
        }
        let acc = acc + self.nodes[n as usize].delta;
        let s = acc + self.nodes[n as usize].start;
        if s > edit_end {
            // This node and its whole right subtree move.
            {
                let node = &mut self.nodes[n as usize];
                node.start += edit_delta;
                node.end += edit_delta;
            }
            let right = self.nodes[n as usize].right;
            if right != NIL {
                self.nodes[right as usize].delta += edit_delta;
            }
            let left = self.nodes[n as usize].left;
            self.shift_after(left, acc, edit_end, edit_delta);
        } else {
            // Node ends before the edit; only its right subtree can contain
            // shifted intervals.
            let right = self.nodes[n as usize].right;
            self.shift_after(right, acc, edit_end, edit_delta);
        }
        self.recompute_max_end(n);
    }

    fn minimum(&self, mut n: NodeId) -> NodeId {
        while self.nodes[n as usize].left != NIL {
            n = self.nodes[n as usize].left;
        }
        n
    }

    /// Push the `delta` of every node on the root→n path down one level, so
    /// all nodes on the path end up with `delta == 0`.
    fn push_path_deltas(&mut self, n: NodeId) {
        let mut path = Vec::new();
        let mut walk = n;
        while walk != NIL {
            path.push(walk);
            walk = self.nodes[walk as usize].parent;
        }
        for &node in path.iter().rev() {
            self.push_delta_down(node);
        }
    }

    fn push_delta_down(&mut self, n: NodeId) {
        if n == NIL {
            return;
        }
        let d = self.nodes[n as usize].delta;
        if d == 0 {
            return;
        }
        {
            let node = &mut self.nodes[n as usize];
            node.start += d;
            node.end += d;
            node.max_end += d;
            node.delta = 0;
        }
        let left = self.nodes[n as usize].left;
        if left != NIL {
            self.nodes[left as usize].delta += d;
        }
        let right = self.nodes[n as usize].right;
        if right != NIL {
            self.nodes[right as usize].delta += d;
        }
    }

    fn recompute_max_end(&mut self, n: NodeId) {
        if n == NIL {
            return;
        }
        let mut m = self.nodes[n as usize].end;
        let left = self.nodes[n as usize].left;
        if left != NIL {
            let l = &self.nodes[left as usize];
            m = m.max(l.max_end + l.delta);
        }
        let right = self.nodes[n as usize].right;
        if right != NIL {
            let r = &self.nodes[right as usize];
            m = m.max(r.max_end + r.delta);
        }
        self.nodes[n as usize].max_end = m;
    }

    fn is_red(&self, n: NodeId) -> bool {
        n != NIL && self.nodes[n as usize].red
    }

    fn transplant(&mut self, u: NodeId, v: NodeId) {
        let p = self.nodes[u as usize].parent;
        self.nodes[v as usize].parent = p;
        if p == NIL {
            self.root = v;
        } else if self.nodes[p as usize].left == u {
            self.nodes[p as usize].left = v;
        } else {
            self.nodes[p as usize].right = v;
        }
    }

    fn rotate_left(&mut self, x: NodeId) {
        self.push_delta_down(x);
        let y = self.nodes[x as usize].right;
        debug_assert!(y != NIL);
        self.push_delta_down(y);

        let beta = self.nodes[y as usize].left;
        self.nodes[x as usize].right = beta;
        if beta != NIL {
            self.nodes[beta as usize].parent = x;
        }
        let p = self.nodes[x as usize].parent;
        self.nodes[y as usize].parent = p;
        if p == NIL {
            self.root = y;
        } else if self.nodes[p as usize].left == x {
            self.nodes[p as usize].left = y;
        } else {
            self.nodes[p as usize].right = y;
        }
        self.nodes[y as usize].left = x;
        self.nodes[x as usize].parent = y;

        self.recompute_max_end(x);
        self.recompute_max_end(y);
    }

    fn rotate_right(&mut self, x: NodeId) {
        self.push_delta_down(x);
        let y = self.nodes[x as usize].left;
        debug_assert!(y != NIL);
        self.push_delta_down(y);

        let beta = self.nodes[y as usize].right;
        self.nodes[x as usize].left = beta;
        if beta != NIL {
            self.nodes[beta as usize].parent = x;
        }
        let p = self.nodes[x as usize].parent;
        self.nodes[y as usize].parent = p;
        if p == NIL {
            self.root = y;
        } else if self.nodes[p as usize].left == x {
            self.nodes[p as usize].left = y;
        } else {
            self.nodes[p as usize].right = y;
        }
        self.nodes[y as usize].right = x;
        self.nodes[x as usize].parent = y;

        self.recompute_max_end(x);
        self.recompute_max_end(y);
    }

    fn insert_fixup(&mut self, mut z: NodeId) {
        while self.is_red(self.nodes[z as usize].parent) {
            let p = self.nodes[z as usize].parent;
            let g = self.nodes[p as usize].parent;
            if p == self.nodes[g as usize].left {
                let u = self.nodes[g as usize].right;
                if self.is_red(u) {
                    self.nodes[p as usize].red = false;
                    self.nodes[u as usize].red = false;
                    self.nodes[g as usize].red = true;
                    z = g;
                } else {
                    if z == self.nodes[p as usize].right {
                        z = p;
                        self.rotate_left(z);
                    }
                    let p2 = self.nodes[z as usize].parent;
                    let g2 = self.nodes[p2 as usize].parent;
                    self.nodes[p2 as usize].red = false;
                    self.nodes[g2 as usize].red = true;
                    self.rotate_right(g2);
                }
            } else {
                let u = self.nodes[g as usize].left;
                if self.is_red(u) {
                    self.nodes[p as usize].red = false;
                    self.nodes[u as usize].red = false;
                    self.nodes[g as usize].red = true;
                    z = g;
                } else {
                    if z == self.nodes[p as usize].left {
                        z = p;
                        self.rotate_right(z);
                    }
                    let p2 = self.nodes[z as usize].parent;
                    let g2 = self.nodes[p2 as usize].parent;
                    self.nodes[p2 as usize].red = false;
                    self.nodes[g2 as usize].red = true;
                    self.rotate_left(g2);
                }
            }
            if z == self.root {
                break;
            }
        }
        let root = self.root;
        self.nodes[root as usize].red = false;
    }

    fn delete_fixup(&mut self, mut x: NodeId) {
        while x != self.root && !self.is_red(x) {
            let p = self.nodes[x as usize].parent;
            if p == NIL {
                break;
            }
            if x == self.nodes[p as usize].left {
                let mut w = self.nodes[p as usize].right;
                if self.is_red(w) {
                    self.nodes[w as usize].red = false;
                    self.nodes[p as usize].red = true;
                    self.rotate_left(p);
                    w = self.nodes[self.nodes[x as usize].parent as usize].right;
                }
                let wl = self.nodes[w as usize].left;
                let wr = self.nodes[w as usize].right;
                if !self.is_red(wl) && !self.is_red(wr) {
                    if w != NIL {
                        self.nodes[w as usize].red = true;
                    }
                    x = self.nodes[x as usize].parent;
                } else {
                    if !self.is_red(wr) {
                        if wl != NIL {
                            self.nodes[wl as usize].red = false;
                        }
                        self.nodes[w as usize].red = true;
                        self.rotate_right(w);
                        w = self.nodes[self.nodes[x as usize].parent as usize].right;
                    }
                    let p2 = self.nodes[x as usize].parent;
                    self.nodes[w as usize].red = self.nodes[p2 as usize].red;
                    self.nodes[p2 as usize].red = false;
                    let wr2 = self.nodes[w as usize].right;
                    if wr2 != NIL {
                        self.nodes[wr2 as usize].red = false;
                    }
                    self.rotate_left(p2);
                    x = self.root;
                }
            } else {
                let mut w = self.nodes[p as usize].left;
                if self.is_red(w) {
                    self.nodes[w as usize].red = false;
                    self.nodes[p as usize].red = true;
                    self.rotate_right(p);
                    w = self.nodes[self.nodes[x as usize].parent as usize].left;
                }
                let wl = self.nodes[w as usize].left;
                let wr = self.nodes[w as usize].right;
                if !self.is_red(wl) && !self.is_red(wr) {
                    if w != NIL {
                        self.nodes[w as usize].red = true;
                    }
                    x = self.nodes[x as usize].parent;
                } else {
                    if !self.is_red(wl) {
                        if wr != NIL {
                            self.nodes[wr as usize].red = false;
                        }
                        self.nodes[w as usize].red = true;
                        self.rotate_left(w);
                        w = self.nodes[self.nodes[x as usize].parent as usize].left;
                    }
                    let p2 = self.nodes[x as usize].parent;
                    self.nodes[w as usize].red = self.nodes[p2 as usize].red;
                    self.nodes[p2 as usize].red = false;
                    let wl2 = self.nodes[w as usize].left;
                    if wl2 != NIL {
                        self.nodes[wl2 as usize].red = false;
                    }
                    self.rotate_right(p2);
                    x = self.root;
                }
            }
        }
        if x != NIL {
            self.nodes[x as usize].red = false;
        }
    }
}

/// Move semantics for one endpoint under a replacement of `[start, end)`
/// with `inserting` units.
#[allow(clippy::too_many_arguments)]
fn accept_edit_for_interval(
    node_start: i64,
    node_end: i64,
    start: i64,
    end: i64,
    inserting: i64,
    force_move_markers: bool,
    stickiness: Stickiness,
    collapse_on_replace: bool,
) -> (i64, i64) {
    let deleting = end - start;
    if collapse_on_replace && deleting > 0 && start <= node_start && node_end <= end {
        // The decoration opted into collapsing when fully rewritten.
        return (start, start);
    }
    let (start_sticks, end_sticks) = stickiness.endpoint_affinity();
    let mut new_start = adjust_endpoint(
        node_start,
        start_sticks,
        start,
        end,
        inserting,
        force_move_markers,
    );
    let mut new_end = adjust_endpoint(
        node_end,
        end_sticks,
        start,
        end,
        inserting,
        force_move_markers,
    );
    if new_start > new_end {
        new_end = new_start;
    }
    (new_start.max(0), new_end.max(0))
}

/// Map one marker offset across a replacement of `[start, end)` by
/// `inserting` units. `sticks_to_previous` is the stickiness-derived
/// affinity: a marker that sticks to the previous character stays put when
/// text is inserted exactly at it.
fn adjust_endpoint(
    m: i64,
    sticks_to_previous: bool,
    start: i64,
    end: i64,
    inserting: i64,
    force_move_markers: bool,
) -> i64 {
    let deleting = end - start;
    if m < start {
        return m;
    }
    if m > end {
        return m + inserting - deleting;
    }
    // start <= m <= end: the marker touches the replaced region.
    if force_move_markers {
        return start + inserting;
    }
    if deleting == 0 {
        // Pure insertion at the marker.
        return if sticks_to_previous { start } else { start + inserting };
    }
    if m == start {
        return start;
    }
    let common = deleting.min(inserting);
    let rel = m - start;
    if rel < common {
        // Within the prefix that is overwritten in place.
        return m;
    }
    if rel == common {
        if deleting > inserting {
            return start + common;
        }
        return if sticks_to_previous {
            start + common
        } else {
            start + inserting
        };
    }
    // Beyond the overwritten prefix: that text no longer exists.
    start + common
}
