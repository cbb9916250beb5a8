//! Asynchronous pump between a [`CanBus`] driver and the stack's frame queues.
//!
//! Received frames are pushed into the receive queue polled by the stack;
//! frames the stack queued for transmission are sent on the bus, spaced by
//! [`FAST_PACKET_INTER_FRAME_DELAY_MS`] when they follow each other. The
//! stack itself never awaits: the bridge is the only async part and can live
//! in its own executor task.
use futures_util::future::{select, Either};
use futures_util::pin_mut;

use crate::infra::frame_queue::FrameQueue;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::traits::{bridge_timer::BridgeTimer, can_bus::CanBus};
use crate::protocol::transport::FAST_PACKET_INTER_FRAME_DELAY_MS;

/// Traffic counters kept by the bridge.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BridgeStats {
    /// Frames handed to the receive queue.
    pub received: u32,
    /// Frames sent on the bus.
    pub transmitted: u32,
    /// Frames lost because the receive queue was full.
    pub rx_dropped: u32,
}

/// Direction of the frame moved by one [`CanBridge::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transfer {
    Received,
    Dropped,
    Transmitted,
}

/// Couples a CAN driver to a receive and a transmit [`FrameQueue`].
pub struct CanBridge<'q, C: CanBus, B: BridgeTimer, const RX: usize, const TX: usize> {
    bus: C,
    timer: B,
    rx: &'q FrameQueue<RX>,
    tx: &'q FrameQueue<TX>,
    stats: BridgeStats,
    /// The previous step transmitted; the next frame waits for the gap.
    paced: bool,
}

impl<'q, C, B, const RX: usize, const TX: usize> CanBridge<'q, C, B, RX, TX>
where
    C: CanBus,
    B: BridgeTimer,
{
    pub fn new(bus: C, timer: B, rx: &'q FrameQueue<RX>, tx: &'q FrameQueue<TX>) -> Self {
        Self {
            bus,
            timer,
            rx,
            tx,
            stats: BridgeStats::default(),
            paced: false,
        }
    }

    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Give the driver back.
    pub fn release(self) -> C {
        self.bus
    }

    /// Move one frame, whichever side is ready first.
    ///
    /// Queued transmissions are served before waiting on the bus.
    pub async fn step(&mut self) -> Result<Transfer, C::Error> {
        if let Some(frame) = self.tx.pop() {
            return self.transmit(&frame).await;
        }
        self.paced = false;

        let event = {
            let incoming = self.bus.recv();
            let outgoing = self.tx.recv();
            pin_mut!(incoming, outgoing);
            match select(incoming, outgoing).await {
                Either::Left((received, _)) => Either::Left(received?),
                Either::Right((frame, _)) => Either::Right(frame),
            }
        };

        match event {
            Either::Left(frame) => Ok(self.deliver(frame)),
            Either::Right(frame) => self.transmit(&frame).await,
        }
    }

    /// Pump frames until the driver fails.
    pub async fn run(&mut self) -> C::Error {
        loop {
            if let Err(err) = self.step().await {
                return err;
            }
        }
    }

    fn deliver(&mut self, frame: CanFrame) -> Transfer {
        if self.rx.try_push(frame).is_err() {
            #[cfg(feature = "defmt")]
            defmt::warn!("rx queue full, frame {=u32:#X} dropped", frame.id.0);
            self.stats.rx_dropped = self.stats.rx_dropped.wrapping_add(1);
            return Transfer::Dropped;
        }
        self.stats.received = self.stats.received.wrapping_add(1);
        Transfer::Received
    }

    async fn transmit(&mut self, frame: &CanFrame) -> Result<Transfer, C::Error> {
        if self.paced {
            self.timer.delay_ms(FAST_PACKET_INTER_FRAME_DELAY_MS).await;
        }
        self.bus.send(frame).await?;
        self.paced = true;
        self.stats.transmitted = self.stats.transmitted.wrapping_add(1);
        Ok(Transfer::Transmitted)
    }
}
