//! Linear-interpolation sample rate conversion
//!
//! Good enough for speech fed to a transcription provider; the output
//! length contract is `round(input_len / (src_rate / dst_rate))`.

/// Resample a mono i16 buffer from `src_rate` to `dst_rate` by linear
/// interpolation between neighboring input samples.
pub fn resample_linear(samples: &[i16], src_rate: u32, dst_rate: u32) -> Vec<i16> {
    if src_rate == dst_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = src_rate as f64 / dst_rate as f64;
    let out_len = (samples.len() as f64 / ratio).round() as usize;
    let last = samples.len() - 1;

    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = (pos.floor() as usize).min(last);
        let next = (idx + 1).min(last);
        let frac = pos - pos.floor();

        let a = samples[idx] as f64;
        let b = samples[next] as f64;
        out.push((a + (b - a) * frac).round() as i16);
    }

    out
}
