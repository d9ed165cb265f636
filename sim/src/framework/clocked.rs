//! Clocked storage elements.
//!
//! Everything that holds a value across a cycle boundary implements
//! [`Clocked`]. During a cycle a new value is only *driven*; it becomes
//! visible to [`Latch::sample`] after the next [`Clocked::update`], i.e. at
//! the rising clock edge. Reads within a cycle therefore never observe writes
//! issued in the same cycle.

/// Interface to a clocked component.
pub trait Clocked {
    /// Simulate a clock edge, committing whatever was driven this cycle.
    fn update(&mut self);
}

/// An edge-triggered register.
#[derive(Debug, Clone, Copy, Default)]
pub struct Latch<T: Copy + Default> {
    /// The value visible during the current cycle.
    data: T,
    /// The value taking effect at the next clock edge.
    next: Option<T>,
}

impl<T: Copy + Default> Latch<T> {
    pub fn new(init: T) -> Self {
        Self { data: init, next: None }
    }
    /// Drive input to this register.
    pub fn drive(&mut self, val: T) {
        self.next = Some(val)
    }
    /// Sample the current value of this register.
    pub fn sample(&self) -> T {
        self.data
    }
}

impl<T: Copy + Default> Clocked for Latch<T> {
    fn update(&mut self) {
        if let Some(next) = self.next.take() {
            self.data = next;
        }
    }
}
