pub mod bands;
pub mod spectral;

pub use bands::aggregate;
pub use spectral::{SpectralAnalyzer, SpectralConfig};

use std::sync::{Arc, Mutex};

/// The three macro-bands the animation layer consumes, each in 0..1.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrequencyBands {
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
}

/// Hand-off point between an external capture thread and the pipeline.
///
/// The capture side pushes interleaved PCM from its own thread; the
/// animation thread drains whatever has accumulated once per frame and
/// releases the lock before any FFT or animation work. Samples that
/// arrive faster than they are drained are bounded by `capacity`; the
/// oldest samples are discarded first so the window stays current.
#[derive(Clone)]
pub struct SharedSampleBuffer {
    inner: Arc<Mutex<Vec<f32>>>,
    capacity: usize,
}

impl SharedSampleBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Vec::with_capacity(capacity))),
            capacity,
        }
    }

    /// Append samples from the capture thread.
    pub fn push(&self, samples: &[f32]) {
        let mut buf = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        buf.extend_from_slice(samples);
        if buf.len() > self.capacity {
            let excess = buf.len() - self.capacity;
            buf.drain(..excess);
        }
    }

    /// Take everything accumulated since the last drain. Returns an
    /// empty vec on an underrun frame; callers treat that as a repeat
    /// of the previous analysis window.
    pub fn drain(&self) -> Vec<f32> {
        let mut buf = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        std::mem::take(&mut *buf)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_empties_buffer() {
        let buf = SharedSampleBuffer::new(16);
        buf.push(&[0.1, 0.2, 0.3]);
        assert_eq!(buf.drain(), vec![0.1, 0.2, 0.3]);
        assert!(buf.drain().is_empty());
    }

    #[test]
    fn overflow_drops_oldest() {
        let buf = SharedSampleBuffer::new(4);
        buf.push(&[1.0, 2.0, 3.0]);
        buf.push(&[4.0, 5.0, 6.0]);
        assert_eq!(buf.drain(), vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn shared_across_clones() {
        let writer = SharedSampleBuffer::new(8);
        let reader = writer.clone();
        writer.push(&[0.5; 4]);
        assert_eq!(reader.drain().len(), 4);
    }
}
