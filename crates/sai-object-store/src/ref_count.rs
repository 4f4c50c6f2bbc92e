//! Reference counts with underflow detection.

/// A reference count that never wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RefCount(u32);

impl RefCount {
    pub const fn new() -> Self {
        RefCount(0)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Increments the count and returns the new value.
    pub fn increment(&mut self) -> u32 {
        self.0 = self.0.saturating_add(1);
        self.0
    }

    /// Decrements the count and returns the new value.
    ///
    /// Returns `None`, leaving the count at zero, if it would underflow.
    pub fn decrement(&mut self) -> Option<u32> {
        self.0 = self.0.checked_sub(1)?;
        Some(self.0)
    }
}

/// Trait for records that carry a reference count.
///
/// Implementors expose their embedded [`RefCount`]; the counting methods
/// are provided.
pub trait RefCounted {
    fn refs(&self) -> &RefCount;

    fn refs_mut(&mut self) -> &mut RefCount;

    /// Increments the reference count and returns the new value.
    fn increment_ref(&mut self) -> u32 {
        self.refs_mut().increment()
    }

    /// Decrements the reference count and returns the new value.
    ///
    /// Returns `None` if the count would underflow.
    fn decrement_ref(&mut self) -> Option<u32> {
        self.refs_mut().decrement()
    }

    /// Returns the current reference count.
    fn ref_count(&self) -> u32 {
        self.refs().get()
    }

    /// Returns true if nothing references the record.
    fn is_unreferenced(&self) -> bool {
        self.ref_count() == 0
    }
}

impl RefCounted for RefCount {
    fn refs(&self) -> &RefCount {
        self
    }

    fn refs_mut(&mut self) -> &mut RefCount {
        self
    }
}
