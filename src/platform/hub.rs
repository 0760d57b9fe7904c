use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use super::{FrameCallback, PointerEvent, PointerHandler, ResizeHandler};

type Shared<T> = Rc<RefCell<T>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Pointer,
    Resize,
    Frame,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    pointer: BTreeMap<u64, Shared<PointerHandler>>,
    resize: BTreeMap<u64, Shared<ResizeHandler>>,
    frames: BTreeMap<u64, FrameCallback>,
}

impl HubState {
    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process registry of listeners and frame callbacks.
///
/// Dispatch never holds the registry borrow while a callback runs, so
/// callbacks may subscribe, unsubscribe or schedule frames freely.
#[derive(Clone, Default)]
pub struct EventHub {
    state: Shared<HubState>,
}

/// Registration handle. Dropping it unregisters the listener or cancels the
/// frame.
#[must_use = "dropping a subscription unregisters it"]
pub struct Subscription {
    id: u64,
    channel: Channel,
    hub: Weak<RefCell<HubState>>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(state) = self.hub.upgrade() else {
            return;
        };
        // removed values are dropped after the borrow ends
        let mut state = state.borrow_mut();
        match self.channel {
            Channel::Pointer => {
                let removed = state.pointer.remove(&self.id);
                drop(state);
                drop(removed);
            }
            Channel::Resize => {
                let removed = state.resize.remove(&self.id);
                drop(state);
                drop(removed);
            }
            Channel::Frame => {
                let removed = state.frames.remove(&self.id);
                drop(state);
                drop(removed);
            }
        }
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn subscription(&self, id: u64, channel: Channel) -> Subscription {
        Subscription {
            id,
            channel,
            hub: Rc::downgrade(&self.state),
        }
    }

    pub fn subscribe_pointer(&self, handler: PointerHandler) -> Subscription {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.pointer.insert(id, Rc::new(RefCell::new(handler)));
        drop(state);
        self.subscription(id, Channel::Pointer)
    }

    pub fn subscribe_resize(&self, handler: ResizeHandler) -> Subscription {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.resize.insert(id, Rc::new(RefCell::new(handler)));
        drop(state);
        self.subscription(id, Channel::Resize)
    }

    pub fn schedule_frame(&self, callback: FrameCallback) -> Subscription {
        let mut state = self.state.borrow_mut();
        let id = state.next();
        state.frames.insert(id, callback);
        drop(state);
        self.subscription(id, Channel::Frame)
    }

    pub fn dispatch_pointer(&self, event: PointerEvent) {
        let handlers: Vec<_> = self.state.borrow().pointer.values().cloned().collect();
        for handler in handlers {
            (handler.borrow_mut())(event);
        }
    }

    pub fn dispatch_resize(&self) {
        let handlers: Vec<_> = self.state.borrow().resize.values().cloned().collect();
        for handler in handlers {
            (handler.borrow_mut())();
        }
    }

    /// Runs every frame callback scheduled before this call and returns how
    /// many ran. Frames requested by those callbacks wait for the next call.
    pub fn run_frames(&self) -> usize {
        let frames = std::mem::take(&mut self.state.borrow_mut().frames);
        let count = frames.len();
        for (_, callback) in frames {
            callback();
        }
        count
    }

    /// Registered pointer plus resize listeners.
    pub fn listener_count(&self) -> usize {
        let state = self.state.borrow();
        state.pointer.len() + state.resize.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.state.borrow().frames.len()
    }
}
