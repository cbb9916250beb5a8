//! Asynchronous delay used by the CAN bridge to pace consecutive
//! transmissions.

/// Timer trait abstraction; must remain thread-safe when applicable.
pub trait BridgeTimer {
    /// Asynchronously wait for `millis` milliseconds.
    fn delay_ms<'a>(
        &'a mut self,
        millis: u32,
    ) -> impl core::future::Future<Output = ()> + 'a;
}

