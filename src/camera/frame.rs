use crate::errors::AppError;
use opencv::core::Mat;
use opencv::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

pub struct Frame {
    pub image: Mat,
    pub time: u64, // microseconds, never 0
    pub sequence: u64,
}

#[derive(Default)]
struct SlotState {
    frame: Option<Frame>,
    sequence: u64,
    error: Option<String>,
}

#[derive(Default)]
struct SlotInner {
    state: Mutex<SlotState>,
    ready: Condvar,
    consumers: AtomicUsize,
}

/// Latest-frame mailbox between a producer thread and any number of readers.
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<SlotInner>,
}

/// Keeps a slot marked as watched until dropped.
pub struct ConsumerGuard {
    inner: Arc<SlotInner>,
}

impl Drop for ConsumerGuard {
    fn drop(&mut self) {
        self.inner.consumers.fetch_sub(1, Ordering::Relaxed);
    }
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SlotState> {
        self.inner.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Replaces the current frame and wakes waiting readers.
    pub fn publish(&self, image: Mat, time: u64) -> u64 {
        let mut state = self.state();
        state.sequence += 1;
        let sequence = state.sequence;
        state.frame = Some(Frame { image, time, sequence });
        state.error = None;
        drop(state);
        self.inner.ready.notify_all();
        sequence
    }

    pub fn set_error(&self, message: &str) {
        self.state().error = Some(message.to_string());
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().error.clone()
    }

    pub fn sequence(&self) -> u64 {
        self.state().sequence
    }

    pub fn latest(&self) -> Result<Option<Frame>, AppError> {
        let state = self.state();
        state.frame.as_ref().map(clone_frame).transpose()
    }

    /// Blocks until a frame newer than `after` arrives, or `timeout` passes.
    pub fn wait_newer(&self, after: u64, timeout: Duration) -> Result<Option<Frame>, AppError> {
        let guard = self.state();
        let (state, _) = self
            .inner
            .ready
            .wait_timeout_while(guard, timeout, |s| s.sequence <= after)
            .unwrap_or_else(|p| p.into_inner());
        if state.sequence <= after {
            return Ok(None);
        }
        state.frame.as_ref().map(clone_frame).transpose()
    }

    pub fn acquire(&self) -> ConsumerGuard {
        self.inner.consumers.fetch_add(1, Ordering::Relaxed);
        ConsumerGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn same_slot(&self, other: &FrameSlot) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn consumer_count(&self) -> usize {
        self.inner.consumers.load(Ordering::Relaxed)
    }
}

fn clone_frame(frame: &Frame) -> Result<Frame, AppError> {
    Ok(Frame {
        image: frame.image.try_clone()?,
        time: frame.time,
        sequence: frame.sequence,
    })
}
