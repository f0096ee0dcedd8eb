//! PCM frames and the lock-free output bus
//!
//! Remote tracks deliver [`AudioFrame`]s; processed stereo frames are pushed
//! into an [`OutputBus`] drained by whatever owns the output device.

use crossbeam::queue::ArrayQueue;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::protocol::{ParticipantId, TrackId};

/// Audio frame containing interleaved samples
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    /// Interleaved audio samples (f32)
    pub samples: Vec<f32>,
    /// Number of channels
    pub channels: u16,
    /// Frame sequence number
    pub sequence: u32,
}

impl AudioFrame {
    pub fn new(samples: Vec<f32>, channels: u16, sequence: u32) -> Self {
        Self {
            samples,
            channels,
            sequence,
        }
    }

    pub fn mono(samples: Vec<f32>, sequence: u32) -> Self {
        Self::new(samples, 1, sequence)
    }

    /// Average all channels into one
    pub fn downmix(&self) -> Vec<f32> {
        match self.channels {
            0 => Vec::new(),
            1 => self.samples.clone(),
            n => self
                .samples
                .chunks_exact(n as usize)
                .map(|group| group.iter().sum::<f32>() / n as f32)
                .collect(),
        }
    }
}

/// A processed frame ready for the output device
#[derive(Debug, Clone)]
pub struct OutputFrame {
    pub track_id: TrackId,
    pub participant_id: ParticipantId,
    /// Always stereo
    pub frame: AudioFrame,
}

/// Lock-free queue of processed frames
pub struct OutputBus {
    queue: ArrayQueue<OutputFrame>,
    overflow_count: AtomicUsize,
}

impl OutputBus {
    /// Create a new output bus with the specified capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            overflow_count: AtomicUsize::new(0),
        }
    }

    /// Push a frame. Returns false if the bus is full (frame dropped)
    pub fn push(&self, frame: OutputFrame) -> bool {
        match self.queue.push(frame) {
            Ok(()) => true,
            Err(_) => {
                self.overflow_count.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    pub fn pop(&self) -> Option<OutputFrame> {
        self.queue.pop()
    }

    /// Drain everything currently queued
    pub fn drain(&self) -> Vec<OutputFrame> {
        std::iter::from_fn(|| self.queue.pop()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    pub fn overflow_count(&self) -> usize {
        self.overflow_count.load(Ordering::Relaxed)
    }
}

/// Thread-safe handle to the output bus
pub type SharedOutputBus = Arc<OutputBus>;

pub fn create_output_bus(capacity: usize) -> SharedOutputBus {
    Arc::new(OutputBus::new(capacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(seq: u32) -> OutputFrame {
        OutputFrame {
            track_id: "TR_1".into(),
            participant_id: "alpha".into(),
            frame: AudioFrame::new(vec![0.0; 4], 2, seq),
        }
    }

    #[test]
    fn test_output_bus_fifo_and_overflow() {
        let bus = OutputBus::new(2);
        assert!(bus.push(output(0)));
        assert!(bus.push(output(1)));
        assert!(!bus.push(output(2)));
        assert_eq!(bus.overflow_count(), 1);

        let drained = bus.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].frame.sequence, 0);
        assert!(bus.is_empty());
    }

    #[test]
    fn test_downmix() {
        let frame = AudioFrame::new(vec![1.0, 0.0, 0.5, 0.5], 2, 0);
        assert_eq!(frame.downmix(), vec![0.5, 0.5]);
    }
}
