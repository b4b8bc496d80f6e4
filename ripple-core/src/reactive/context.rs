//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a reactive property is
//! read, the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When an effect runs, it pushes itself onto the stack; the returned guard
//! pops it on drop. The entry below the top is the effect's parent, so
//! nested effects restore the outer one when they finish, even when the
//! inner computation panics.
//!
//! [`untracked`] pushes an entry that keeps the running subscriber but
//! switches tracking off: reads inside it subscribe nobody, while writes
//! still see which subscriber is running and do not re-trigger it.

use std::cell::RefCell;
use std::sync::Arc;

use super::subscriber::{Subscriber, SubscriberId};

struct Frame {
    subscriber: Option<Arc<dyn Subscriber>>,
    tracking: bool,
}

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Make `subscriber` the active subscriber until the guard is dropped.
    pub(crate) fn enter(subscriber: Arc<dyn Subscriber>) -> Self {
        let subscriber_id = Some(subscriber.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber: Some(subscriber),
                tracking: true,
            })
        });
        Self { subscriber_id }
    }

    /// Pause tracking until the guard is dropped.
    ///
    /// The running subscriber stays visible to [`current_id`](Self::current_id).
    pub(crate) fn pause() -> Self {
        let subscriber = Self::running();
        let subscriber_id = subscriber.as_ref().map(|s| s.id());
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                subscriber,
                tracking: false,
            })
        });
        Self { subscriber_id }
    }

    fn running() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.subscriber.clone())
        })
    }

    /// The subscriber reads should be attributed to, if any.
    pub(crate) fn current() -> Option<Arc<dyn Subscriber>> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .filter(|frame| frame.tracking)
                .and_then(|frame| frame.subscriber.clone())
        })
    }

    /// ID of the running subscriber, tracked or not.
    pub(crate) fn current_id() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|frame| frame.subscriber.as_ref().map(|s| s.id()))
        })
    }

    /// Whether reads are currently being tracked.
    pub(crate) fn is_tracking() -> bool {
        CONTEXT_STACK.with(|stack| {
            matches!(
                stack.borrow().last(),
                Some(Frame {
                    subscriber: Some(_),
                    tracking: true,
                })
            )
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let popped = CONTEXT_STACK.with(|stack| stack.borrow_mut().pop());

        // Verify we're popping the right context.
        if let Some(frame) = popped {
            debug_assert_eq!(
                frame.subscriber.as_ref().map(|s| s.id()),
                self.subscriber_id,
                "ReactiveContext mismatch"
            );
        }
    }
}

/// Run `f` without tracking any reads it performs.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _paused = ReactiveContext::pause();
    f()
}

/// Whether a subscriber is currently collecting dependencies.
pub fn is_tracking() -> bool {
    ReactiveContext::is_tracking()
}
