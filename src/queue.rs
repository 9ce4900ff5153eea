use std::collections::VecDeque;

use crate::item::ItemKey;

#[derive(Debug, Default, Clone, derive_new::new)]
pub(crate) struct FifoQ {
    #[new(default)]
    inner: VecDeque<ItemKey>,
}

impl FifoQ {
    delegate::delegate! {
        to self.inner {
            #[call(push_back)]
            pub(crate) fn enqueue(&mut self, key: ItemKey);

            #[call(pop_front)]
            pub(crate) fn dequeue(&mut self) -> Option<ItemKey>;

            pub(crate) fn len(&self) -> usize;
            pub(crate) fn is_empty(&self) -> bool;
        }
    }

    pub(crate) fn peek(&self) -> Option<ItemKey> {
        self.inner.front().copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = ItemKey> + '_ {
        self.inner.iter().copied()
    }
}
