//! A single-slot, last-value-wins register, implemented as a mutex-guarded
//! `Option<T>` rather than a channel: writers never block on readers, and a
//! reader is only ever interested in the most recent value.

use std::sync::{Arc, Mutex};

/// A last-value-wins register shared between a writer task and one or more
/// readers.
///
/// Two read modes are exposed because the domain needs both: [`LastValue::take`]
/// consumes the slot (used for messages, where an older, un-delivered value
/// is meant to be discarded rather than re-read), while [`LastValue::get`]
/// peeks without consuming (used for status and checkpoint reads, which a
/// reader may poll repeatedly).
#[derive(Debug, Clone)]
pub struct LastValue<T> {
    slot: Arc<Mutex<Option<T>>>,
}

impl<T> Default for LastValue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LastValue<T> {
    /// Creates an empty register.
    pub fn new() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Overwrites the register with a new value, discarding whatever was
    /// there before.
    pub fn set(&self, value: T) {
        let mut slot = self.slot.lock().expect("LastValue mutex poisoned");
        *slot = Some(value);
    }

    /// Takes the current value out of the register, leaving it empty.
    pub fn take(&self) -> Option<T> {
        let mut slot = self.slot.lock().expect("LastValue mutex poisoned");
        slot.take()
    }

    /// Returns a clone of the current value without consuming it.
    pub fn get(&self) -> Option<T>
    where
        T: Clone,
    {
        let slot = self.slot.lock().expect("LastValue mutex poisoned");
        slot.clone()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn take_consumes_the_value() {
        let value = LastValue::new();
        value.set(42);
        assert_eq!(value.take(), Some(42));
        assert_eq!(value.take(), None);
    }

    #[test]
    fn get_does_not_consume_the_value() {
        let value = LastValue::new();
        value.set("checkpoint-1".to_string());
        assert_eq!(value.get(), Some("checkpoint-1".to_string()));
        assert_eq!(value.get(), Some("checkpoint-1".to_string()));
    }

    #[test]
    fn set_overwrites_any_undelivered_value() {
        let value = LastValue::new();
        value.set(1);
        value.set(2);
        assert_eq!(value.take(), Some(2));
    }
}
