//! Harmonic/percussive separation by median filtering (Fitzgerald 2010).
//!
//! Sustained tones form horizontal ridges in the spectrogram and drum hits
//! form vertical ones. A median across time keeps the former, a median
//! across frequency keeps the latter. The harmonic part is resynthesised
//! from a soft (Wiener) mask with windowed overlap-add, so the output is a
//! waveform of the same length and rate as the input.

use crate::chroma::hann_window;
use crate::waveform::Waveform;
use chfft::RFft1D;
use log::debug;

/// Harmonic/percussive separator settings.
#[derive(Debug, Clone)]
pub struct HarmonicSeparator {
    n_fft: usize,
    hop_length: usize,
    /// Median length across time, in frames (odd).
    harmonic_kernel: usize,
    /// Median length across frequency, in bins (odd).
    percussive_kernel: usize,
}

impl Default for HarmonicSeparator {
    fn default() -> Self {
        Self::new(2048, 512, 17, 17)
    }
}

impl HarmonicSeparator {
    pub fn new(n_fft: usize, hop_length: usize, harmonic_kernel: usize, percussive_kernel: usize) -> Self {
        Self {
            n_fft: (n_fft.max(4) + 1) & !1,
            hop_length: hop_length.max(1),
            harmonic_kernel: harmonic_kernel.max(1) | 1,
            percussive_kernel: percussive_kernel.max(1) | 1,
        }
    }

    /// Harmonic-only version of `waveform`.
    pub fn harmonic(&self, waveform: &Waveform) -> Waveform {
        let samples = waveform.samples();
        if samples.is_empty() {
            return waveform.clone();
        }

        let window = hann_window(self.n_fft);
        let mut fft = RFft1D::<f32>::new(self.n_fft);

        // Pad so every sample is covered by full windows on both sides.
        let pad = self.n_fft / 2;
        let mut padded = vec![0.0_f32; pad];
        padded.extend_from_slice(samples);
        padded.resize(padded.len() + self.n_fft, 0.0);
        let num_frames = 1 + (padded.len() - self.n_fft) / self.hop_length;

        let mut buffer = vec![0.0_f32; self.n_fft];
        let mut spectra = Vec::with_capacity(num_frames);
        let mut magnitudes: Vec<Vec<f32>> = Vec::with_capacity(num_frames);
        for i in 0..num_frames {
            let offset = i * self.hop_length;
            for (k, slot) in buffer.iter_mut().enumerate() {
                *slot = padded[offset + k] * window[k];
            }
            let spectrum = fft.forward(&buffer);
            magnitudes.push(spectrum.iter().map(|c| c.norm()).collect());
            spectra.push(spectrum);
        }

        let harmonic = median_across_time(&magnitudes, self.harmonic_kernel);
        let percussive = median_across_frequency(&magnitudes, self.percussive_kernel);

        let mut output = vec![0.0_f32; padded.len()];
        let mut norm = vec![0.0_f32; padded.len()];
        for (i, mut spectrum) in spectra.into_iter().enumerate() {
            for (bin, value) in spectrum.iter_mut().enumerate() {
                let h = harmonic[i][bin] * harmonic[i][bin];
                let p = percussive[i][bin] * percussive[i][bin];
                let mask = if h + p > 0.0 { h / (h + p) } else { 0.0 };
                *value = *value * mask;
            }
            let frame = fft.backward(&spectrum);
            let offset = i * self.hop_length;
            for (k, &s) in frame.iter().enumerate().take(self.n_fft) {
                output[offset + k] += s * window[k];
                norm[offset + k] += window[k] * window[k];
            }
        }

        let harmonic_samples: Vec<f32> = (pad..pad + samples.len())
            .map(|i| if norm[i] > 1e-8 { output[i] / norm[i] } else { 0.0 })
            .collect();

        debug!(
            "Harmonic separation: {} frames, kernels {}x{}",
            num_frames, self.harmonic_kernel, self.percussive_kernel
        );
        Waveform::new(harmonic_samples, waveform.sample_rate())
    }
}

fn median(values: &mut [f32]) -> f32 {
    let mid = values.len() / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

fn median_across_time(magnitudes: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let frames = magnitudes.len();
    let bins = magnitudes.first().map_or(0, |m| m.len());
    let half = kernel / 2;
    let mut out = vec![vec![0.0_f32; bins]; frames];
    let mut window = Vec::with_capacity(kernel);
    for t in 0..frames {
        let lo = t.saturating_sub(half);
        let hi = (t + half + 1).min(frames);
        for bin in 0..bins {
            window.clear();
            window.extend((lo..hi).map(|f| magnitudes[f][bin]));
            out[t][bin] = median(&mut window);
        }
    }
    out
}

fn median_across_frequency(magnitudes: &[Vec<f32>], kernel: usize) -> Vec<Vec<f32>> {
    let half = kernel / 2;
    let mut window = Vec::with_capacity(kernel);
    magnitudes
        .iter()
        .map(|frame| {
            let bins = frame.len();
            (0..bins)
                .map(|bin| {
                    let lo = bin.saturating_sub(half);
                    let hi = (bin + half + 1).min(bins);
                    window.clear();
                    window.extend_from_slice(&frame[lo..hi]);
                    median(&mut window)
                })
                .collect()
        })
        .collect()
}
