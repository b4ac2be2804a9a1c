//! SlotGroupTracker
//!
//! A fixed set of indices partitioned into named groups, each group a
//! doubly linked chain through one shared arena.

#[derive(Clone, Copy, Default)]
struct Link {
    prev: Option<u32>,
    next: Option<u32>,
}

/// Tracks which group each of `slot_count` indices belongs to, with O(1)
/// moves between groups.
///
/// Groups are identified by `0..group_count`. Moving a slot detaches it
/// from its current chain and reattaches it at the destination group's
/// head; the relative order of all other members is preserved.
///
/// `next()` trusts the caller to pass the group the index actually
/// belongs to; membership is verified only in debug builds.
pub struct SlotGroupTracker {
    heads: Vec<Option<u32>>,
    links: Vec<Link>,
    #[cfg(debug_assertions)]
    group_of: Vec<usize>,
}

impl SlotGroupTracker {
    /// Create a tracker over `slot_count` indices and `group_count`
    /// groups. Every group starts empty; call [`init_group`] to seed one.
    ///
    /// [`init_group`]: SlotGroupTracker::init_group
    pub fn new(group_count: usize, slot_count: u32) -> Self {
        Self {
            heads: vec![None; group_count],
            links: vec![Link::default(); slot_count as usize],
            #[cfg(debug_assertions)]
            group_of: vec![usize::MAX; slot_count as usize],
        }
    }

    /// Reset the tracker so every index belongs to `group`, linked in
    /// ascending order. All other groups become empty.
    pub fn init_group(&mut self, group: usize) {
        assert!(group < self.heads.len());

        for head in &mut self.heads {
            *head = None;
        }

        let count = self.links.len() as u32;
        if count == 0 {
            return;
        }

        self.heads[group] = Some(0);
        for idx in 0..count {
            self.links[idx as usize] = Link {
                prev: idx.checked_sub(1),
                next: if idx + 1 < count { Some(idx + 1) } else { None },
            };
            #[cfg(debug_assertions)]
            {
                self.group_of[idx as usize] = group;
            }
        }
    }

    /// First member of `group`, or `None` if the group is empty.
    pub fn head(&self, group: usize) -> Option<u32> {
        self.heads[group]
    }

    /// Member of `group` following `idx`.
    pub fn next(&self, group: usize, idx: u32) -> Option<u32> {
        #[cfg(debug_assertions)]
        debug_assert_eq!(self.group_of[idx as usize], group);
        #[cfg(not(debug_assertions))]
        let _ = group;

        self.links[idx as usize].next
    }

    /// Detach `idx` from `from`'s chain and reattach it at the head of
    /// `to`'s chain. Both operations are O(1).
    pub fn move_slot(&mut self, idx: u32, from: usize, to: usize) {
        debug_assert!((idx as usize) < self.links.len());
        #[cfg(debug_assertions)]
        debug_assert_eq!(self.group_of[idx as usize], from);

        // Detach: patch neighbors and the source head if needed.
        let Link { prev, next } = self.links[idx as usize];
        if let Some(p) = prev {
            self.links[p as usize].next = next;
        }
        if let Some(n) = next {
            self.links[n as usize].prev = prev;
        }
        if self.heads[from] == Some(idx) {
            self.heads[from] = next;
        }

        // Attach at the destination head.
        let old_head = self.heads[to];
        self.links[idx as usize] = Link {
            prev: None,
            next: old_head,
        };
        if let Some(h) = old_head {
            self.links[h as usize].prev = Some(idx);
        }
        self.heads[to] = Some(idx);

        #[cfg(debug_assertions)]
        {
            self.group_of[idx as usize] = to;
        }
    }

    /// Forward iterator over a group's members, head first.
    pub fn iter(&self, group: usize) -> GroupIter<'_> {
        GroupIter {
            tracker: self,
            group,
            cursor: self.heads[group],
        }
    }

    /// Total number of indices tracked.
    pub fn slot_count(&self) -> u32 {
        self.links.len() as u32
    }
}

/// Iterator over one group's membership, produced by
/// [`SlotGroupTracker::iter`].
pub struct GroupIter<'a> {
    tracker: &'a SlotGroupTracker,
    group: usize,
    cursor: Option<u32>,
}

impl Iterator for GroupIter<'_> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        let idx = self.cursor?;
        self.cursor = self.tracker.next(self.group, idx);
        Some(idx)
    }
}
