/// Allows a long-running conversion to observe a cancellation request
pub trait Interrupt {
    /// Has cancellation been requested?
    fn is_set(&self) -> bool;
}

/// An interrupt that is never triggered
#[derive(Debug, Default)]
pub struct Never {}

impl Interrupt for Never {
    fn is_set(&self) -> bool { false }
}

impl Interrupt for std::sync::atomic::AtomicBool {
    fn is_set(&self) -> bool { self.load(std::sync::atomic::Ordering::Relaxed) }
}
