//! PCM sample-rate conversion.

pub mod sinc;

pub use sinc::SincResampler;
