//! # Filter Graph Builder
//!
//! Builds the fixed argument list for the multiply composite. The graph:
//!
//! 1. loops the overlay forever (`-stream_loop -1`),
//! 2. scales the overlay to the primary video's size (`scale2ref`),
//! 3. blends primary over overlay in multiply mode at full opacity,
//! 4. converts to 4:2:0 (`yuv420p`),
//! 5. maps the blended video and, if present, the primary's audio (`0:a?`),
//! 6. encodes H.264 (`veryfast`, CRF 18) and AAC at 192k,
//! 7. stops at the shorter stream (`-shortest`).
//!
//! Nothing about it is tunable; the only inputs are the working names.

use crate::composition::input::WorkingNames;

/// Fixed parameters of the composite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterGraphSpec {
    pub overlay_loop: &'static str,
    pub filter_complex: &'static str,
    pub video_map: &'static str,
    pub audio_map: &'static str,
    pub video_codec: &'static str,
    pub preset: &'static str,
    pub crf: u8,
    pub audio_codec: &'static str,
    pub audio_bitrate: &'static str,
}

impl FilterGraphSpec {
    pub const MULTIPLY: Self = Self {
        overlay_loop: "-1",
        filter_complex: "[1:v][0:v]scale2ref=iw:ih[gifS][vid];\
                         [vid][gifS]blend=all_mode=multiply:all_opacity=1,format=yuv420p[outv]",
        video_map: "[outv]",
        // Trailing `?` makes the audio stream optional
        audio_map: "0:a?",
        video_codec: "libx264",
        preset: "veryfast",
        crf: 18,
        audio_codec: "aac",
        audio_bitrate: "192k",
    };

    /// Render the ordered argument list for the given working names
    pub fn build(&self, names: &WorkingNames) -> Vec<String> {
        [
            "-i",
            names.input.as_str(),
            "-stream_loop",
            self.overlay_loop,
            "-i",
            names.overlay.as_str(),
            "-filter_complex",
            self.filter_complex,
            "-map",
            self.video_map,
            "-map",
            self.audio_map,
            "-c:v",
            self.video_codec,
            "-preset",
            self.preset,
            "-crf",
            &self.crf.to_string(),
            "-c:a",
            self.audio_codec,
            "-b:a",
            self.audio_bitrate,
            "-shortest",
            names.output.as_str(),
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }
}

impl Default for FilterGraphSpec {
    fn default() -> Self {
        Self::MULTIPLY
    }
}

/// Argument list for the multiply composite over `names`
pub fn build(names: &WorkingNames) -> Vec<String> {
    FilterGraphSpec::MULTIPLY.build(names)
}
