use crate::TileHandle;

#[derive(Clone, Copy, Debug, Default)]
struct Links {
    previous: Option<TileHandle>,
    next: Option<TileHandle>,
}

/// A doubly linked list of tiles, threaded through a table indexed by
/// [`TileHandle`], so insertion, removal and moving a tile to the tail are
/// constant time.
#[derive(Clone, Debug, Default)]
pub struct LoadedTileList {
    links: Vec<Option<Links>>,
    head: Option<TileHandle>,
    tail: Option<TileHandle>,
    len: usize,
}

impl LoadedTileList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn head(&self) -> Option<TileHandle> {
        self.head
    }

    pub fn tail(&self) -> Option<TileHandle> {
        self.tail
    }

    pub fn contains(&self, handle: TileHandle) -> bool {
        self.links(handle).is_some()
    }

    pub fn next(&self, handle: TileHandle) -> Option<TileHandle> {
        self.links(handle)?.next
    }

    pub fn previous(&self, handle: TileHandle) -> Option<TileHandle> {
        self.links(handle)?.previous
    }

    /// Appends `handle`, moving it to the tail if it is already listed.
    pub fn insert_at_tail(&mut self, handle: TileHandle) {
        self.remove(handle);

        if self.links.len() <= handle.index() {
            self.links.resize(handle.index() + 1, None);
        }
        self.links[handle.index()] = Some(Links {
            previous: self.tail,
            next: None,
        });

        match self.tail.and_then(|tail| self.links_mut(tail)) {
            Some(tail) => tail.next = Some(handle),
            None => self.head = Some(handle),
        }
        self.tail = Some(handle);
        self.len += 1;
    }

    pub fn remove(&mut self, handle: TileHandle) -> bool {
        let Some(links) = self.links.get_mut(handle.index()).and_then(Option::take) else {
            return false;
        };

        match links.previous.and_then(|previous| self.links_mut(previous)) {
            Some(previous) => previous.next = links.next,
            None => self.head = links.next,
        }
        match links.next.and_then(|next| self.links_mut(next)) {
            Some(next) => next.previous = links.previous,
            None => self.tail = links.previous,
        }
        self.len -= 1;
        true
    }

    /// Walks from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = TileHandle> + '_ {
        std::iter::successors(self.head, |&handle| self.next(handle))
    }

    fn links(&self, handle: TileHandle) -> Option<&Links> {
        self.links.get(handle.index())?.as_ref()
    }

    fn links_mut(&mut self, handle: TileHandle) -> Option<&mut Links> {
        self.links.get_mut(handle.index())?.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handles<const N: usize>() -> [TileHandle; N] {
        std::array::from_fn(TileHandle)
    }

    #[test]
    fn keeps_insertion_order() {
        let [a, b, c] = handles();
        let mut list = LoadedTileList::new();
        list.insert_at_tail(a);
        list.insert_at_tail(b);
        list.insert_at_tail(c);

        assert_eq!(list.iter().collect::<Vec<_>>(), [a, b, c]);
        assert_eq!(list.len(), 3);
        assert_eq!(list.head(), Some(a));
        assert_eq!(list.tail(), Some(c));
        assert_eq!(list.previous(b), Some(a));
        assert_eq!(list.next(b), Some(c));
    }

    #[test]
    fn reinserting_moves_to_the_tail() {
        let [a, b, c] = handles();
        let mut list = LoadedTileList::new();
        for handle in [a, b, c] {
            list.insert_at_tail(handle);
        }

        list.insert_at_tail(a);
        assert_eq!(list.iter().collect::<Vec<_>>(), [b, c, a]);
        list.insert_at_tail(a);
        assert_eq!(list.iter().collect::<Vec<_>>(), [b, c, a]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn removes_from_anywhere() {
        let [a, b, c, d] = handles();
        let mut list = LoadedTileList::new();
        for handle in [a, b, c, d] {
            list.insert_at_tail(handle);
        }

        assert!(list.remove(b));
        assert!(!list.remove(b));
        assert_eq!(list.iter().collect::<Vec<_>>(), [a, c, d]);

        assert!(list.remove(a));
        assert!(list.remove(d));
        assert_eq!(list.head(), Some(c));
        assert_eq!(list.tail(), Some(c));
        assert!(!list.contains(a));

        assert!(list.remove(c));
        assert!(list.is_empty());
        assert_eq!(list.head(), None);
        assert_eq!(list.tail(), None);
    }

    #[test]
    fn unknown_handles_are_ignored() {
        let mut list = LoadedTileList::new();
        assert!(!list.remove(TileHandle(40)));
        assert_eq!(list.next(TileHandle(40)), None);
    }
}
