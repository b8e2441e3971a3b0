//! # Deferred World Commands
//!
//! Update functions run in parallel and only see a read-only
//! [`WorldView`](super::WorldView). Everything they want to change goes
//! through this channel and is applied by the world at the next phase
//! barrier, in the order it was sent.

use std::fmt;

use crossbeam_channel::{unbounded, Receiver, Sender};
use hearth_shared::Transform;

use super::handle::{ComponentHandle, GameObjectHandle};
use super::message::{Message, MessageTarget, MsgQueueType};
use super::World;

/// Arbitrary world mutation run at the next barrier.
pub type DeferredFn = Box<dyn FnOnce(&mut World) + Send>;

/// A change requested from a context without `&mut World`.
pub enum WorldCommand {
    /// Queue a message.
    PostMessage {
        /// Receiver.
        target: MessageTarget,
        /// Payload.
        message: Box<dyn Message>,
        /// Delivery point.
        queue: MsgQueueType,
    },
    /// Delete an object at the end of the frame.
    DeleteObject(GameObjectHandle),
    /// Delete a component at the end of the frame.
    DeleteComponent(ComponentHandle),
    /// Change the own active flag of an object.
    SetObjectActive(GameObjectHandle, bool),
    /// Change the own active flag of a component.
    SetComponentActive(ComponentHandle, bool),
    /// Replace the local transform of an object.
    SetLocalTransform(GameObjectHandle, Transform),
    /// Run a closure with full world access.
    Deferred(DeferredFn),
}

impl fmt::Debug for WorldCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PostMessage { target, message, queue } => f
                .debug_struct("PostMessage")
                .field("target", target)
                .field("message", message)
                .field("queue", queue)
                .finish(),
            Self::DeleteObject(handle) => f.debug_tuple("DeleteObject").field(handle).finish(),
            Self::DeleteComponent(handle) => f.debug_tuple("DeleteComponent").field(handle).finish(),
            Self::SetObjectActive(handle, active) => {
                f.debug_tuple("SetObjectActive").field(handle).field(active).finish()
            }
            Self::SetComponentActive(handle, active) => {
                f.debug_tuple("SetComponentActive").field(handle).field(active).finish()
            }
            Self::SetLocalTransform(handle, _) => f.debug_tuple("SetLocalTransform").field(handle).finish(),
            Self::Deferred(_) => f.write_str("Deferred"),
        }
    }
}

/// Thread-safe sink for [`WorldCommand`]s.
///
/// Cheap to share: every update task gets `&WorldCommands` through the view.
pub struct WorldCommands {
    sender: Sender<WorldCommand>,
    receiver: Receiver<WorldCommand>,
}

impl WorldCommands {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    /// Queues a raw command.
    pub fn push(&self, command: WorldCommand) {
        if let Err(error) = self.sender.send(command) {
            tracing::warn!(command = ?error.0, "dropped world command, channel closed");
        }
    }

    /// Posts a message to a queue.
    pub fn post_message(&self, target: MessageTarget, message: impl Message, queue: MsgQueueType) {
        self.push(WorldCommand::PostMessage {
            target,
            message: Box::new(message),
            queue,
        });
    }

    /// Deletes an object at the end of the frame.
    pub fn delete_object_delayed(&self, object: GameObjectHandle) {
        self.push(WorldCommand::DeleteObject(object));
    }

    /// Deletes a component at the end of the frame.
    pub fn delete_component_delayed(&self, component: ComponentHandle) {
        self.push(WorldCommand::DeleteComponent(component));
    }

    /// Changes the own active flag of an object.
    pub fn set_object_active(&self, object: GameObjectHandle, active: bool) {
        self.push(WorldCommand::SetObjectActive(object, active));
    }

    /// Changes the own active flag of a component.
    pub fn set_component_active(&self, component: ComponentHandle, active: bool) {
        self.push(WorldCommand::SetComponentActive(component, active));
    }

    /// Replaces the local transform of an object.
    pub fn set_local_transform(&self, object: GameObjectHandle, local: Transform) {
        self.push(WorldCommand::SetLocalTransform(object, local));
    }

    /// Runs `f` with full world access at the next barrier.
    pub fn defer(&self, f: impl FnOnce(&mut World) + Send + 'static) {
        self.push(WorldCommand::Deferred(Box::new(f)));
    }

    /// Number of commands waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    /// Returns true if no command is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Takes every waiting command, oldest first.
    pub(crate) fn drain(&self) -> Vec<WorldCommand> {
        self.receiver.try_iter().collect()
    }
}

impl Default for WorldCommands {
    fn default() -> Self {
        Self::new()
    }
}
