//! # Messages
//!
//! Messages are plain values routed to the components of an object (or of a
//! whole subtree, or to one component). They are either sent directly, in
//! which case every handler runs before the send returns, or posted to one of
//! the world's queues and delivered at a fixed point of the frame:
//!
//! ```text
//! update():  NextFrame ─ PreAsync ─ Async ─ [PostAsync] ─ transforms ─ [PostTransform] ─ init ─ [AfterInitialized]
//! ```

use std::collections::VecDeque;
use std::fmt;

use super::component::AsAny;
use super::handle::{ComponentHandle, GameObjectHandle};

/// A value that can be routed to components.
///
/// Any `Send + Debug + 'static` type opts in with an empty impl.
pub trait Message: AsAny + Send + fmt::Debug {}

impl dyn Message {
    /// True if the message is of type `M`.
    #[must_use]
    pub fn is<M: Message>(&self) -> bool {
        self.as_any().is::<M>()
    }

    /// Downcasts to a concrete message type.
    #[must_use]
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }

    /// Downcasts to a concrete message type, mutably.
    pub fn downcast_mut<M: Message>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut::<M>()
    }
}

/// Where a message goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageTarget {
    /// All components of one object.
    Object(GameObjectHandle),
    /// All components of an object and of its descendants, depth-first.
    ObjectRecursive(GameObjectHandle),
    /// One component.
    Component(ComponentHandle),
}

/// Delivery point of a posted message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MsgQueueType {
    /// After the async phase, before the `PostAsync` update functions.
    PostAsync,
    /// After global transforms are refreshed.
    PostTransform,
    /// At the start of the next frame.
    NextFrame,
    /// After components created this frame are initialized.
    AfterInitialized,
}

impl MsgQueueType {
    /// Every queue, in delivery order within a frame.
    pub const ALL: [Self; 4] = [Self::NextFrame, Self::PostAsync, Self::PostTransform, Self::AfterInitialized];

    pub(crate) const fn slot(self) -> usize {
        match self {
            Self::PostAsync => 0,
            Self::PostTransform => 1,
            Self::NextFrame => 2,
            Self::AfterInitialized => 3,
        }
    }
}

/// A synchronous send issued from inside a handler, delivered before the
/// outer send returns.
pub struct PendingSend {
    pub(crate) target: MessageTarget,
    pub(crate) message: Box<dyn Message>,
}

impl PendingSend {
    pub(crate) fn new(target: MessageTarget, message: Box<dyn Message>) -> Self {
        Self { target, message }
    }
}

/// A posted message waiting in a queue.
pub(crate) struct QueuedMessage {
    pub(crate) target: MessageTarget,
    pub(crate) message: Box<dyn Message>,
    pub(crate) posted_frame: u64,
}

/// The four posted-message queues of a world.
#[derive(Default)]
pub(crate) struct MessageQueues {
    queues: [VecDeque<QueuedMessage>; 4],
}

impl MessageQueues {
    pub(crate) fn push(&mut self, queue: MsgQueueType, message: QueuedMessage) {
        self.queues[queue.slot()].push_back(message);
    }

    /// Takes every message due at this boundary. `NextFrame` messages posted
    /// during `frame` itself stay queued.
    pub(crate) fn take_due(&mut self, queue: MsgQueueType, frame: u64) -> VecDeque<QueuedMessage> {
        let taken = std::mem::take(&mut self.queues[queue.slot()]);
        if queue != MsgQueueType::NextFrame {
            return taken;
        }
        let (due, waiting): (VecDeque<_>, VecDeque<_>) =
            taken.into_iter().partition(|queued| queued.posted_frame < frame);
        self.queues[queue.slot()] = waiting;
        due
    }

    pub(crate) fn len(&self) -> usize {
        self.queues.iter().map(VecDeque::len).sum()
    }

    pub(crate) fn clear(&mut self) {
        for queue in &mut self.queues {
            queue.clear();
        }
    }
}

// =============================================================================
// BUILT-IN MESSAGES
// =============================================================================

/// Kind of change reported by [`MsgComponentsChanged`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentChange {
    /// A component was attached.
    Added,
    /// A component is about to be removed.
    Removed,
}

/// Sent to an object with `COMPONENT_CHANGES_NOTIFICATIONS` when its
/// component set changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgComponentsChanged {
    /// What happened.
    pub change: ComponentChange,
    /// The owner.
    pub owner: GameObjectHandle,
    /// The component concerned.
    pub component: ComponentHandle,
}

impl Message for MsgComponentsChanged {}

/// Kind of change reported by [`MsgChildrenChanged`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChildChange {
    /// A child was attached.
    Added,
    /// A child was detached.
    Removed,
}

/// Sent to an object with `CHILD_CHANGES_NOTIFICATIONS` when its child list
/// changes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgChildrenChanged {
    /// What happened.
    pub change: ChildChange,
    /// The parent.
    pub parent: GameObjectHandle,
    /// The child concerned.
    pub child: GameObjectHandle,
}

impl Message for MsgChildrenChanged {}

/// Sent to a static object with `STATIC_TRANSFORM_CHANGES_NOTIFICATIONS`
/// whose global transform changed, either directly or through an ancestor.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MsgTransformChanged {
    /// The object that moved.
    pub object: GameObjectHandle,
}

impl Message for MsgTransformChanged {}

/// Asks an object to delete itself. If no component handles it, the world
/// deletes the object at the end of the frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MsgDeleteGameObject;

impl Message for MsgDeleteGameObject {}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Ping(u32);
    impl Message for Ping {}

    fn queued(value: u32, posted_frame: u64) -> QueuedMessage {
        QueuedMessage {
            target: MessageTarget::Object(GameObjectHandle::INVALID),
            message: Box::new(Ping(value)),
            posted_frame,
        }
    }

    #[test]
    fn test_downcast() {
        let mut boxed: Box<dyn Message> = Box::new(Ping(3));
        assert!(boxed.is::<Ping>());
        assert!(!boxed.is::<MsgDeleteGameObject>());
        boxed.downcast_mut::<Ping>().unwrap().0 += 1;
        assert_eq!(boxed.downcast_ref::<Ping>().unwrap().0, 4);
    }

    #[test]
    fn test_next_frame_waits_for_later_frame() {
        let mut queues = MessageQueues::default();
        queues.push(MsgQueueType::NextFrame, queued(1, 4));
        queues.push(MsgQueueType::NextFrame, queued(2, 5));
        queues.push(MsgQueueType::NextFrame, queued(3, 4));

        let due = queues.take_due(MsgQueueType::NextFrame, 5);
        let values: Vec<u32> = due
            .iter()
            .map(|q| q.message.downcast_ref::<Ping>().unwrap().0)
            .collect();
        assert_eq!(values, vec![1, 3]);
        assert_eq!(queues.len(), 1);
    }

    #[test]
    fn test_other_queues_drain_fully() {
        let mut queues = MessageQueues::default();
        queues.push(MsgQueueType::PostAsync, queued(1, 9));
        assert_eq!(queues.take_due(MsgQueueType::PostAsync, 9).len(), 1);
        assert_eq!(queues.len(), 0);
    }
}
