//! # Control-Thread to Audio-Thread Parameter Hand-off
//!
//! Setters such as `Biquad::set_frequency()` take `&mut self`, so within one
//! thread a half-updated coefficient set can never be observed. When the
//! values come from a UI or control thread, they travel through a
//! [`param_channel`] instead: the control side pushes complete parameter
//! sets, and the audio side picks up only the newest one at the start of a
//! block and applies it in one step.
//!
//! Both ends are wait-free. The queue is allocated once, when the channel
//! is created.
//!
//! ```ignore
//! let (mut tx, mut rx) = param_channel::<FilterParams>(16);
//!
//! // Control thread
//! tx.send(FilterParams { frequency: 800.0, ..params })?;
//!
//! // Audio thread, start of the block
//! filter.apply_pending(&mut rx);
//! filter.process(buffer);
//! ```

use rtrb::{Consumer, Producer, PushError, RingBuffer};

/// Sending half, owned by the control thread.
pub struct ParamSender<T> {
    producer: Producer<T>,
}

/// Receiving half, owned by the audio thread.
pub struct ParamReceiver<T> {
    consumer: Consumer<T>,
}

/// Create a parameter channel that can hold `capacity` unread updates.
pub fn param_channel<T>(capacity: usize) -> (ParamSender<T>, ParamReceiver<T>) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (ParamSender { producer }, ParamReceiver { consumer })
}

impl<T> ParamSender<T> {
    /// Queue a complete parameter set. Hands the value back if the audio
    /// thread has fallen `capacity` updates behind.
    pub fn send(&mut self, value: T) -> Result<(), T> {
        self.producer.push(value).map_err(|e| match e {
            PushError::Full(value) => value,
        })
    }

    /// `true` once the receiving half has been dropped.
    pub fn is_disconnected(&self) -> bool {
        self.producer.is_abandoned()
    }
}

impl<T> ParamReceiver<T> {
    /// Drain the queue and return only the most recent update, if any.
    pub fn latest(&mut self) -> Option<T> {
        let mut newest = None;
        while let Ok(value) = self.consumer.pop() {
            newest = Some(value);
        }
        newest
    }

    /// Number of updates waiting to be read.
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_collapses_bursts() {
        let (mut tx, mut rx) = param_channel::<f32>(8);
        assert_eq!(rx.latest(), None);

        tx.send(1.0).unwrap();
        tx.send(2.0).unwrap();
        tx.send(3.0).unwrap();
        assert_eq!(rx.pending(), 3);

        assert_eq!(rx.latest(), Some(3.0));
        assert_eq!(rx.pending(), 0);
        assert_eq!(rx.latest(), None);
    }

    #[test]
    fn test_full_queue_returns_value() {
        let (mut tx, _rx) = param_channel::<u32>(2);
        tx.send(1).unwrap();
        tx.send(2).unwrap();
        assert_eq!(tx.send(3), Err(3));
    }

    #[test]
    fn test_disconnect_is_visible() {
        let (tx, rx) = param_channel::<u32>(2);
        assert!(!tx.is_disconnected());
        drop(rx);
        assert!(tx.is_disconnected());
    }
}
