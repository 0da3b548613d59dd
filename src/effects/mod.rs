//! # Time-Based Effects
//!
//! Front-ends over [`DelayLine`](crate::dsp::delay_line::DelayLine). They
//! differ only in how the read delay is chosen and where the delayed signal
//! goes:
//!
//! | Effect                | Read delay                  | Delayed signal goes to       |
//! |-----------------------|-----------------------------|------------------------------|
//! | `delay::SimpleDelay`  | fixed (ms or tempo)         | output, and back via damping |
//! | `echo::FeedbackEcho`  | two fixed taps              | `y = b0 x + bM x[n-dM] - aW y[n-dW]` |
//! | `echo::StereoEcho`    | fixed per side              | own side, or the other side  |
//! | `modulated::*`        | swept by an LFO             | output, optionally back      |
//! | `pitch::PitchShifter` | slides at a constant rate   | output                       |

pub mod delay;
pub mod echo;
pub mod modulated;
pub mod pitch;
