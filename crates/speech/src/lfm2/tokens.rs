/// Tokens generated by the audio LM, separated by modality.
#[derive(Debug, Default, PartialEq)]
pub struct GeneratedTokens {
    /// Single-id steps: text vocabulary ids.
    pub text_ids: Vec<i64>,
    /// Multi-codebook steps: one audio frame each.
    pub audio_frames: Vec<Vec<i64>>,
}

impl GeneratedTokens {
    /// Splits interleaved generation steps by how many ids each carries.
    pub fn split(steps: Vec<Vec<i64>>) -> Self {
        let mut out = Self::default();
        for step in steps {
            match step.len() {
                0 => {}
                1 => out.text_ids.push(step[0]),
                _ => out.audio_frames.push(step),
            }
        }
        out
    }

    /// Audio frames with the trailing end-of-audio sentinel removed.
    ///
    /// Returns None when generation produced no audio frames at all.
    pub fn decodable_audio(mut self) -> Option<Vec<Vec<i64>>> {
        if self.audio_frames.is_empty() {
            return None;
        }
        self.audio_frames.pop();
        Some(self.audio_frames)
    }
}
