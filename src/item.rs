/// Anything that can be stored in the index: it only needs a unique,
/// caller-assigned integer id. Ordering in the index is by this id.
pub trait Keyed {
    fn id(&self) -> u64;
}

impl Keyed for u64 {
    fn id(&self) -> u64 {
        return *self;
    }
}

/// A record with an id and an arbitrary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item<P> {
    pub id: u64,
    pub payload: P,
}

impl<P> Item<P> {
    pub fn new(id: u64, payload: P) -> Item<P> {
        return Item { id, payload };
    }
}

impl<P> Keyed for Item<P> {
    fn id(&self) -> u64 {
        return self.id;
    }
}
