//! Data types used for signal processing

use num_complex;

pub type RealSample = f32;
pub use std::f32::consts as sample_consts;

pub type ComplexSample = num_complex::Complex<RealSample>;

/// One interleaved signed 16-bit I/Q pair as delivered by the RX stream (CS16).
pub type RawIq = num_complex::Complex<i16>;
