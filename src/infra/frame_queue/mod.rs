//! Bounded frame queues shared between interrupt context and the cooperative
//! main loop.
//!
//! The CAN receive interrupt pushes into one queue and the transmit-ready
//! interrupt pops from another; the stack only touches them through
//! non-blocking `try_push`/`pop`. Every access is a single critical section
//! around a fixed number of memory operations.
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, channel::Channel};

use crate::error::QueueError;
use crate::protocol::transport::can_frame::CanFrame;

/// Fixed-capacity FIFO of CAN frames.
///
/// Designed to live in a `static` so the interrupt handler and the main loop
/// can both reach it:
///
/// ```rust,ignore
/// static RX: FrameQueue<16> = FrameQueue::new();
///
/// // CAN RX interrupt
/// fn on_can_rx(frame: CanFrame) {
///     // Overflow is counted by the driver, never escalated.
///     let _ = RX.try_push(frame);
/// }
/// ```
pub struct FrameQueue<const N: usize> {
    channel: Channel<CriticalSectionRawMutex, CanFrame, N>,
}

impl<const N: usize> Default for FrameQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> FrameQueue<N> {
    /// Create an empty queue.
    pub const fn new() -> Self {
        Self {
            channel: Channel::new(),
        }
    }

    /// Enqueue without waiting; fails when every slot is taken.
    pub fn try_push(&self, frame: CanFrame) -> Result<(), QueueError> {
        self.channel.try_send(frame).map_err(|_| QueueError::Full)
    }

    /// Dequeue without waiting.
    pub fn pop(&self) -> Option<CanFrame> {
        self.channel.try_receive().ok()
    }

    /// Wait for the next frame (executor-driven drivers only).
    pub async fn recv(&self) -> CanFrame {
        self.channel.receive().await
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.channel.len()
    }

    /// Checks whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.channel.is_empty()
    }

    /// Slots still available.
    pub fn free_capacity(&self) -> usize {
        self.channel.free_capacity()
    }

    /// Total number of slots.
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Drop every queued frame.
    pub fn clear(&self) {
        self.channel.clear();
    }
}

//==================================================================================FRAME_SINK
/// Somewhere outgoing frames can be queued without blocking.
pub trait FrameSink {
    /// Slots still available.
    fn free_capacity(&self) -> usize;
    /// Enqueue one frame; fails when no slot is free.
    fn try_push(&self, frame: CanFrame) -> Result<(), QueueError>;
}

impl<const N: usize> FrameSink for FrameQueue<N> {
    fn free_capacity(&self) -> usize {
        FrameQueue::free_capacity(self)
    }

    fn try_push(&self, frame: CanFrame) -> Result<(), QueueError> {
        FrameQueue::try_push(self, frame)
    }
}

impl<T: FrameSink + ?Sized> FrameSink for &T {
    fn free_capacity(&self) -> usize {
        (**self).free_capacity()
    }

    fn try_push(&self, frame: CanFrame) -> Result<(), QueueError> {
        (**self).try_push(frame)
    }
}
