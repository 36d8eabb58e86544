//! Pairing heap with a contextful comparator, stored in an index arena
//!
//! The heap is *intrusive*: every element embeds a [`HeapLinks`] and all
//! linkage is expressed as indices into a single backing slice, so there are
//! no heap allocations and no self-referential pointers. A node is identified
//! by its position in the slice, which never changes.
//!
//! `heap_push` runs in O(1); `heap_pop` and `heap_remove` are O(log n)
//! amortized. The two-pass pairing merge is iterative, so the stack usage is
//! bounded regardless of heap size (the operations run in interrupt context).

/// Sentinel index meaning "no node".
pub const NONE: usize = usize::MAX;

/// Intrusive linkage embedded in every heap element.
///
/// `prev` points at the parent when the node is the first child, and at the
/// previous sibling otherwise. The root has all links except `child` set to
/// [`NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapLinks {
    child: usize,
    sibling: usize,
    prev: usize,
}

impl HeapLinks {
    /// Links of a node that is not a member of any heap.
    pub const UNLINKED: Self = Self {
        child: NONE,
        sibling: NONE,
        prev: NONE,
    };
}

/// Implemented by element types so the heap can reach their embedded links.
pub trait PairingHeapNode {
    fn heap_links(&self) -> &HeapLinks;
    fn heap_links_mut(&mut self) -> &mut HeapLinks;
}

/// Context type for [`PairingHeap`]'s operations.
pub trait PairingHeapCtx<Element> {
    /// Return `true` iff `x < y`.
    fn lt(&mut self, x: &Element, y: &Element) -> bool;
}

/// Min-heap operations over a slice of intrusive nodes.
///
/// Every operation takes the current root index and returns the new one; an
/// empty heap is represented by [`NONE`]. The caller is responsible for
/// tracking which nodes are currently members (the links of a non-member are
/// meaningless until the next `heap_push`).
pub trait PairingHeap {
    type Element;

    /// Merge the singleton `node` into the heap. Returns the new root.
    fn heap_push(
        &mut self,
        root: usize,
        node: usize,
        ctx: impl PairingHeapCtx<Self::Element>,
    ) -> usize;

    /// Remove the least element. Returns it (if any) and the new root.
    ///
    /// Popping from an empty heap is a no-op.
    fn heap_pop(
        &mut self,
        root: usize,
        ctx: impl PairingHeapCtx<Self::Element>,
    ) -> (Option<usize>, usize);

    /// Remove an arbitrary member `node`. Returns the new root.
    ///
    /// `node` must currently be a member of the heap rooted at `root`.
    fn heap_remove(
        &mut self,
        root: usize,
        node: usize,
        ctx: impl PairingHeapCtx<Self::Element>,
    ) -> usize;
}

impl<Element: PairingHeapNode> PairingHeap for [Element] {
    type Element = Element;

    fn heap_push(
        &mut self,
        root: usize,
        node: usize,
        mut ctx: impl PairingHeapCtx<Element>,
    ) -> usize {
        *self[node].heap_links_mut() = HeapLinks::UNLINKED;
        if root == NONE {
            node
        } else {
            meld(self, root, node, &mut ctx)
        }
    }

    fn heap_pop(
        &mut self,
        root: usize,
        mut ctx: impl PairingHeapCtx<Element>,
    ) -> (Option<usize>, usize) {
        if root == NONE {
            return (None, NONE);
        }

        let first_child = self[root].heap_links().child;
        *self[root].heap_links_mut() = HeapLinks::UNLINKED;

        let new_root = if first_child == NONE {
            NONE
        } else {
            merge_pairs(self, first_child, &mut ctx)
        };

        (Some(root), new_root)
    }

    fn heap_remove(
        &mut self,
        root: usize,
        node: usize,
        mut ctx: impl PairingHeapCtx<Element>,
    ) -> usize {
        if root == NONE {
            return NONE;
        }
        if node == root {
            return self.heap_pop(root, ctx).1;
        }

        let links = *self[node].heap_links();
        if links.prev == NONE {
            // Not the root yet no predecessor: `node` is not a member. The
            // caller tracks membership, so this is a contract violation.
            debug_assert!(false);
            return root;
        }

        // Unsplice `node` from its sibling list.
        if links.sibling != NONE {
            self[links.sibling].heap_links_mut().prev = links.prev;
        }
        if self[links.prev].heap_links().child == node {
            self[links.prev].heap_links_mut().child = links.sibling;
        } else {
            self[links.prev].heap_links_mut().sibling = links.sibling;
        }
        *self[node].heap_links_mut() = HeapLinks::UNLINKED;

        // Merge the orphaned children back into the remaining structure.
        if links.child == NONE {
            root
        } else {
            let subtree = merge_pairs(self, links.child, &mut ctx);
            meld(self, root, subtree, &mut ctx)
        }
    }
}

/// Merge two detached trees (`prev` and `sibling` of both arguments must be
/// [`NONE`]). The larger root becomes the first child of the smaller one.
fn meld<Element: PairingHeapNode>(
    this: &mut [Element],
    a: usize,
    b: usize,
    ctx: &mut impl PairingHeapCtx<Element>,
) -> usize {
    debug_assert_ne!(a, NONE);
    debug_assert_ne!(b, NONE);

    let (small, large) = if ctx.lt(&this[b], &this[a]) {
        (b, a)
    } else {
        (a, b)
    };

    let old_child = this[small].heap_links().child;
    this[large].heap_links_mut().sibling = old_child;
    this[large].heap_links_mut().prev = small;
    if old_child != NONE {
        this[old_child].heap_links_mut().prev = large;
    }
    this[small].heap_links_mut().child = large;

    small
}

/// The "pairing" pass: meld adjacent siblings left-to-right, then fold the
/// resulting pair roots right-to-left into a single tree.
///
/// The intermediate pair roots are chained through their `sibling` links, so
/// no extra storage is needed.
fn merge_pairs<Element: PairingHeapNode>(
    this: &mut [Element],
    first: usize,
    ctx: &mut impl PairingHeapCtx<Element>,
) -> usize {
    // First pass: pair up siblings. `pairs` collects the melded pair roots in
    // reverse order.
    let mut cur = first;
    let mut pairs = NONE;
    while cur != NONE {
        let a = cur;
        let b = self_sibling(this, a);
        if b == NONE {
            detach(this, a);
            this[a].heap_links_mut().sibling = pairs;
            pairs = a;
            break;
        }
        let next = self_sibling(this, b);
        detach(this, a);
        detach(this, b);
        let m = meld(this, a, b, ctx);
        this[m].heap_links_mut().sibling = pairs;
        pairs = m;
        cur = next;
    }

    // Second pass: fold the pair roots (now in right-to-left order).
    let mut result = pairs;
    pairs = self_sibling(this, result);
    this[result].heap_links_mut().sibling = NONE;
    while pairs != NONE {
        let next = self_sibling(this, pairs);
        this[pairs].heap_links_mut().sibling = NONE;
        result = meld(this, result, pairs, ctx);
        pairs = next;
    }
    result
}

#[inline]
fn self_sibling<Element: PairingHeapNode>(this: &[Element], node: usize) -> usize {
    if node == NONE {
        NONE
    } else {
        this[node].heap_links().sibling
    }
}

/// Clear `prev` and `sibling`, keeping the subtree rooted at `node` intact.
#[inline]
fn detach<Element: PairingHeapNode>(this: &mut [Element], node: usize) {
    let links = this[node].heap_links_mut();
    links.prev = NONE;
    links.sibling = NONE;
}
