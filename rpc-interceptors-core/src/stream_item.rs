//! Identified stream messages.
//!
//! Server-streaming responses that can be resumed carry an ordered id per
//! message. A consumer remembers the highest id it has seen and asks for
//! messages after it when it reconnects.

/// A message with an ordered stream position.
pub trait StreamItem {
    type Id: Ord;

    fn stream_item_id(&self) -> Self::Id;
}

/// A response message that batches several [`StreamItem`]s.
pub trait StreamItemCollection {
    type Item: StreamItem;

    fn stream_items(&self) -> &[Self::Item];

    /// The highest id in the batch, or `None` if it is empty.
    fn last_stream_item_id(&self) -> Option<<Self::Item as StreamItem>::Id> {
        self.stream_items()
            .iter()
            .map(StreamItem::stream_item_id)
            .max()
    }
}

impl<T: StreamItem> StreamItemCollection for Vec<T> {
    type Item = T;

    fn stream_items(&self) -> &[T] {
        self
    }
}
