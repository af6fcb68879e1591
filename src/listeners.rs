use std::rc::Rc;

use slabmap::SlabMap;


struct Entry<F: ?Sized> {
    seq: u64,
    f: Rc<F>,
}

/// Callback registry that releases its borrow before callbacks run.
///
/// Keys are slab indices and may be reused after removal, so iteration order
/// follows `seq` instead.
pub(crate) struct Listeners<F: ?Sized> {
    entries: SlabMap<Entry<F>>,
    next_seq: u64,
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self {
            entries: SlabMap::new(),
            next_seq: 0,
        }
    }
    pub fn insert(&mut self, f: Rc<F>) -> usize {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(Entry { seq, f })
    }
    pub fn replace(&mut self, key: usize, f: Rc<F>) -> bool {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.f = f;
            true
        } else {
            false
        }
    }
    pub fn remove(&mut self, key: usize) -> bool {
        self.entries.remove(key).is_some()
    }
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Callbacks in registration order.
    pub fn snapshot(&self) -> Vec<Rc<F>> {
        let mut items: Vec<_> = self.entries.values().map(|e| (e.seq, e.f.clone())).collect();
        items.sort_by_key(|(seq, _)| *seq);
        items.into_iter().map(|(_, f)| f).collect()
    }
}
