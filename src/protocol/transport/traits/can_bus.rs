//! Async CAN driver seam used by [`CanBridge`](crate::protocol::transport::bridge::CanBridge).
//!
//! Implement it over an embedded HAL, SocketCAN or an in-memory bus; only
//! extended data frames ever cross it.
use crate::protocol::transport::can_frame::CanFrame;
use core::future::Future;

/// Frame-level access to one CAN channel.
pub trait CanBus {
    /// Driver failure; ends [`CanBridge::run`](crate::protocol::transport::bridge::CanBridge::run).
    type Error: core::fmt::Debug;
    /// Put `frame` on the bus, completing once the controller accepted it.
    fn send<'a>(
        &'a mut self,
        frame: &'a CanFrame,
    ) -> impl Future<Output = Result<(), Self::Error>> + 'a;
    /// Wait for the next received frame.
    fn recv(&mut self) -> impl Future<Output = Result<CanFrame, Self::Error>> + '_;
}
