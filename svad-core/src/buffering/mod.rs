//! Audio buffering between the capture callback and the run loop.
//!
//! The capture callback writes into a `ringbuf::HeapRb<f32>` producer whose
//! `push_slice` is wait-free; the run loop drains the consumer half in
//! fixed-size blocks and reduces each block into the [`StreamingWindow`].

pub mod chunk;
pub mod window;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Producer};
pub use window::StreamingWindow;

/// Type alias for the producer half, held by the audio callback thread.
pub type AudioProducer = ringbuf::HeapProd<f32>;

/// Type alias for the consumer half, held by the run-loop thread.
pub type AudioConsumer = ringbuf::HeapCons<f32>;

/// Buffer capacity: 2^20 = 1 048 576 f32 samples ≈ 21.8 s at 48 kHz.
/// The run loop drains one block per iteration, far below this.
pub const RING_CAPACITY: usize = 1 << 20;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_audio_ring() -> (AudioProducer, AudioConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}
