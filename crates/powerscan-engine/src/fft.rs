//! Windowed streaming FFT over the incoming sample stream.
//!
//! Raw CS16 pairs are scaled to [-1, 1), windowed, and collected until a
//! full frame is available; each completed frame is transformed and handed
//! on as a magnitude vector. Bin 0 is the receiver's own LO leakage and is
//! always reported as zero.

use std::sync::Arc;

use rustfft::{Fft, FftPlanner};

use crate::dsp_types::*;

pub struct FftPipeline {
    fft_size: usize,
    fft_plan: Arc<dyn Fft<RealSample>>,
    /// Symmetric Hann window, computed once at plan time.
    window: Vec<RealSample>,
    /// Windowed samples collected for the frame in progress.
    fft_in: Vec<ComplexSample>,
    /// Transform workspace; holds the spectrum after a frame completes.
    fft_out: Vec<ComplexSample>,
    magnitudes: Vec<RealSample>,
    fill_index: usize,
}

impl FftPipeline {
    pub fn new(fft_planner: &mut FftPlanner<RealSample>, fft_size: usize) -> Self {
        Self {
            fft_size,
            fft_plan: fft_planner.plan_fft_forward(fft_size),
            window: hann_window(fft_size),
            fft_in: vec![ComplexSample::ZERO; fft_size],
            fft_out: vec![ComplexSample::ZERO; fft_size],
            magnitudes: vec![0.0; fft_size],
            fill_index: 0,
        }
    }

    /// Drop a partially filled frame. Called on retune so one frame never
    /// mixes samples from two tunings.
    pub fn reset(&mut self) {
        self.fill_index = 0;
    }

    /// Feed one block of raw I/Q pairs. `on_frame` is called with the
    /// magnitude vector (DC-centered natural order, DC zeroed) each time a
    /// full frame completes.
    pub fn feed<F: FnMut(&[RealSample])>(&mut self, samples: &[RawIq], mut on_frame: F) {
        for pair in samples {
            let sample = ComplexSample::new(
                pair.re as RealSample / 32768.0,
                pair.im as RealSample / 32768.0,
            );
            self.fft_in[self.fill_index] = sample * self.window[self.fill_index];
            self.fill_index += 1;

            if self.fill_index == self.fft_size {
                self.fill_index = 0;
                self.fft_out.copy_from_slice(&self.fft_in);
                self.fft_plan.process(&mut self.fft_out);

                self.magnitudes[0] = 0.0;
                for (magnitude, bin) in
                    self.magnitudes.iter_mut().zip(self.fft_out.iter()).skip(1)
                {
                    *magnitude = bin.norm();
                }
                on_frame(&self.magnitudes);
            }
        }
    }
}

/// Symmetric Hann window of period `fft_size - 1`:
/// `w[s] = 0.5 * (1 - cos(2π s / (N - 1)))`
fn hann_window(fft_size: usize) -> Vec<RealSample> {
    let period = fft_size.saturating_sub(1).max(1) as RealSample;
    (0..fft_size)
        .map(|s| 0.5 * (1.0 - (2.0 * sample_consts::PI * s as RealSample / period).cos()))
        .collect()
}
