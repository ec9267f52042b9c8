use base64::Engine;
use rubato::{FastFixedIn, PolynomialDegree, Resampler};

// Define standard sample rates for clarity and consistency
pub const GEMINI_LIVE_INPUT_SAMPLE_RATE: f64 = gemini_realtime::client::INPUT_SAMPLE_RATE as f64;
pub const FRONTEND_AUDIO_SAMPLE_RATE: f64 = 24000.0; // Browser captures and plays back 24kHz PCM16

/// Number of input frames the resampler consumes per call.
const RESAMPLER_CHUNK_SIZE: usize = 512;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> anyhow::Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,                     // No cutoff frequency, pass all frequencies
        PolynomialDegree::Cubic, // Cubic interpolation for quality
        chunk_size,
        1, // 1 channel (mono)
    )?;
    Ok(resampler)
}

/// Sample rate of a raw PCM blob from its MIME type, e.g. `audio/pcm;rate=24000`.
///
/// Returns `None` for anything that is not PCM audio. Gemini omits the rate
/// on some models, in which case its documented output rate is assumed.
pub fn pcm_sample_rate(mime_type: Option<&str>) -> Option<f64> {
    let mut params = mime_type?.split(';').map(str::trim);
    if !params.next()?.eq_ignore_ascii_case("audio/pcm") {
        return None;
    }
    let rate = params
        .filter_map(|p| p.strip_prefix("rate="))
        .find_map(|r| r.parse::<u32>().ok())
        .unwrap_or(gemini_realtime::client::OUTPUT_SAMPLE_RATE);
    Some(rate as f64)
}

/// Interprets little-endian PCM16 bytes as normalized f32 samples.
/// A trailing odd byte is ignored.
pub fn pcm16_le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|c| i16::from_le_bytes([c[0], c[1]]) as f32 / 32768.0)
        .collect()
}

/// Encodes a slice of f32 samples into a base64 string (converting to i16 PCM first).
pub fn encode_f32_to_base64_i16(pcm32: &[f32]) -> String {
    let pcm16: Vec<u8> = pcm32
        .iter()
        .flat_map(|&sample| {
            let v = (sample * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
            v.to_le_bytes()
        })
        .collect();
    base64::engine::general_purpose::STANDARD.encode(&pcm16)
}

/// Streams browser microphone audio into the rate Gemini expects.
///
/// Samples that do not fill a whole resampler chunk are kept until the next
/// call instead of being dropped.
pub struct StreamResampler {
    resampler: FastFixedIn<f32>,
    pending: Vec<f32>,
}

impl StreamResampler {
    pub fn new(in_sampling_rate: f64, out_sampling_rate: f64) -> anyhow::Result<Self> {
        Ok(Self {
            resampler: create_resampler(in_sampling_rate, out_sampling_rate, RESAMPLER_CHUNK_SIZE)?,
            pending: Vec::new(),
        })
    }

    /// Resampler from the browser's capture rate to Gemini's input rate.
    pub fn for_gemini_input() -> anyhow::Result<Self> {
        Self::new(FRONTEND_AUDIO_SAMPLE_RATE, GEMINI_LIVE_INPUT_SAMPLE_RATE)
    }

    /// Feeds PCM16 bytes and returns whatever resampled audio is ready,
    /// as base64 PCM16. Returns `None` when no full chunk is available yet.
    pub fn process(&mut self, pcm16_le: &[u8]) -> anyhow::Result<Option<String>> {
        self.pending.extend(pcm16_le_to_f32(pcm16_le));
        let mut resampled = Vec::new();
        loop {
            let needed = self.resampler.input_frames_next();
            if self.pending.len() < needed {
                break;
            }
            let out = self.resampler.process(&[&self.pending[..needed]], None)?;
            resampled.extend_from_slice(&out[0]);
            self.pending.drain(..needed);
        }
        Ok((!resampled.is_empty()).then(|| encode_f32_to_base64_i16(&resampled)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn decode_f32_from_base64_i16(base64_fragment: &str) -> Vec<f32> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(base64_fragment)
            .unwrap();
        pcm16_le_to_f32(&bytes)
    }

    fn pcm16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn test_create_resampler() {
        // Test creating a resampler with valid parameters
        let result = create_resampler(24000.0, 16000.0, 1024);
        assert!(result.is_ok());

        // Test creating a resampler with same input and output rates
        let result = create_resampler(24000.0, 24000.0, 1024);
        assert!(result.is_ok());
    }

    #[test]
    fn test_pcm16_le_to_f32() {
        // i16 value 16384 = 0x4000 in little endian = [0x00, 0x40]
        // When normalized: 16384 / 32768.0 = 0.5
        let result = pcm16_le_to_f32(&[0x00, 0x40, 0x00, 0x80]);
        assert_eq!(result.len(), 2);
        assert_abs_diff_eq!(result[0], 0.5, epsilon = 0.0001);
        assert_abs_diff_eq!(result[1], -1.0, epsilon = 0.0001);

        // Odd trailing byte is skipped
        assert_eq!(pcm16_le_to_f32(&[0x00, 0x40, 0x01]).len(), 1);
        assert!(pcm16_le_to_f32(&[]).is_empty());
    }

    #[test]
    fn test_encode_f32_to_base64_i16() {
        let input = vec![0.5f32, -1.0f32, 0.0f32];
        let decoded = decode_f32_from_base64_i16(&encode_f32_to_base64_i16(&input));
        assert_eq!(decoded.len(), 3);
        assert_abs_diff_eq!(decoded[0], 0.5, epsilon = 0.001);
        assert_abs_diff_eq!(decoded[1], -1.0, epsilon = 0.001);
        assert_abs_diff_eq!(decoded[2], 0.0, epsilon = 0.001);

        // Values outside the valid range are clamped
        let decoded = decode_f32_from_base64_i16(&encode_f32_to_base64_i16(&[2.0, -2.0, f32::NAN]));
        for value in decoded {
            assert!((-1.0..=1.0).contains(&value));
        }
    }

    #[test]
    fn test_stream_resampler_buffers_partial_chunks() {
        let mut resampler = StreamResampler::for_gemini_input().unwrap();

        // Fewer samples than one chunk: nothing is emitted yet.
        let small = pcm16_bytes(&[1000; 100]);
        assert!(resampler.process(&small).unwrap().is_none());

        // Completing the chunk emits exactly what the resampler announces for
        // its next call, which is short by the startup delay on the first one.
        let expected = resampler.resampler.output_frames_next();
        let rest = pcm16_bytes(&[1000; RESAMPLER_CHUNK_SIZE - 100]);
        let out = resampler.process(&rest).unwrap().expect("one chunk ready");
        let samples = decode_f32_from_base64_i16(&out);
        assert_eq!(samples.len(), expected);
        assert!(expected <= RESAMPLER_CHUNK_SIZE * 2 / 3 + 1);
        assert!(resampler.pending.is_empty());
    }

    #[test]
    fn test_stream_resampler_many_chunks() {
        let mut resampler = StreamResampler::for_gemini_input().unwrap();
        let one_second = pcm16_bytes(&vec![0i16; 24000]);
        let out = resampler.process(&one_second).unwrap().unwrap();
        let samples = decode_f32_from_base64_i16(&out);
        // 46 full chunks of 512 at 24kHz, resampled to 16kHz.
        let expected = (24000 / RESAMPLER_CHUNK_SIZE) * RESAMPLER_CHUNK_SIZE * 2 / 3;
        assert!(samples.len().abs_diff(expected) <= expected / 50, "got {}", samples.len());
        assert!(samples.iter().all(|s| s.abs() < 0.0001));
    }

    #[test]
    fn test_sample_rate_constants() {
        assert_eq!(GEMINI_LIVE_INPUT_SAMPLE_RATE, 16000.0);
        assert_eq!(
            FRONTEND_AUDIO_SAMPLE_RATE,
            gemini_realtime::client::OUTPUT_SAMPLE_RATE as f64
        );
    }

    #[test]
    fn test_pcm_sample_rate() {
        assert_eq!(pcm_sample_rate(Some("audio/pcm;rate=24000")), Some(24000.0));
        assert_eq!(pcm_sample_rate(Some("audio/pcm; rate=16000")), Some(16000.0));
        assert_eq!(pcm_sample_rate(Some("audio/pcm")), Some(24000.0));
        assert_eq!(pcm_sample_rate(Some("image/jpeg")), None);
        assert_eq!(pcm_sample_rate(None), None);
    }
}
