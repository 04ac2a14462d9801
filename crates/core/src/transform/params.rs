//! Nonce-derived transform parameters.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::media::{MediaFormat, MediaKind};
use crate::nonce::ProcessingNonce;

/// Image adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageParams {
    /// Pixels cropped from each side (1 or 2).
    pub crop_px: u32,
    pub gamma: f64,
    /// Direction of the one-step nudge for each color channel of the three
    /// center pixels (up when set). Applied to JPEG and PNG only.
    pub pixel_nudges: [bool; 9],
    /// Written to the `comment` metadata field.
    pub tag: String,
}

/// Video adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Pixels cropped from each side (1 or 2).
    pub crop_px: u32,
    pub gamma: f64,
    /// Offset of the near-transparent 1x1 box.
    pub box_x: u32,
    pub box_y: u32,
    pub audio_bitrate_kbps: u32,
    /// Written to the `title` metadata field.
    pub tag: String,
}

/// Audio adjustments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    /// Leading silence in milliseconds (1..=50).
    pub delay_ms: u32,
    pub volume: f64,
    /// Used by bitrate-driven codecs (AAC).
    pub bitrate_kbps: u32,
    /// Written to the `title` metadata field.
    pub tag: String,
}

/// Parameters for one transform run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TransformParams {
    Image(ImageParams),
    Video(VideoParams),
    Audio(AudioParams),
}

impl TransformParams {
    /// Derives every randomised value from `nonce` alone: its local generator
    /// plus its timestamp.
    pub fn derive(format: MediaFormat, nonce: &ProcessingNonce) -> Self {
        let mut rng = nonce.rng();
        let ts = nonce.timestamp.unsigned_abs();
        let tag = format!("uid:{}", nonce.nonce);

        match format.kind() {
            MediaKind::Image => {
                let crop_px = crop_pixels(&mut rng, ts);
                let gamma = (0.995 + rng.gen::<f64>() * 0.010 + (ts % 1000) as f64 / 1e6).min(1.005);
                let pixel_nudges = std::array::from_fn(|_| rng.gen::<bool>());
                Self::Image(ImageParams {
                    crop_px,
                    gamma,
                    pixel_nudges,
                    tag,
                })
            }
            MediaKind::Video => {
                let crop_px = crop_pixels(&mut rng, ts);
                let gamma = (0.998 + rng.gen::<f64>() * 0.004 + (ts % 1000) as f64 / 1e6).min(1.002);
                Self::Video(VideoParams {
                    crop_px,
                    gamma,
                    box_x: (ts % 2) as u32,
                    box_y: ((ts / 10) % 2) as u32,
                    audio_bitrate_kbps: 128 + rng.gen_range(0..16),
                    tag,
                })
            }
            MediaKind::Audio => {
                let delay_ms = (1 + rng.gen_range(0..50) + (ts % 10) as u32).min(50);
                let volume = 0.99 + rng.gen::<f64>() * 0.02 + (ts % 100) as f64 / 1e5;
                Self::Audio(AudioParams {
                    delay_ms,
                    volume,
                    bitrate_kbps: 128 + rng.gen_range(0..16),
                    tag,
                })
            }
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
            Self::Audio(_) => MediaKind::Audio,
        }
    }
}

fn crop_pixels(rng: &mut impl Rng, ts: u64) -> u32 {
    let px = (1 + rng.gen_range(0..2) + (ts % 3) as u32) % 3;
    px.max(1)
}

/// Centered crop that leaves dimensions of 32px or less untouched.
pub(crate) fn crop_filter(crop_px: u32) -> String {
    let cut = crop_px * 2;
    format!(
        "crop=w=if(gt(iw\\,32)\\,iw-{cut}\\,iw):h=if(gt(ih\\,32)\\,ih-{cut}\\,ih):x=(iw-ow)/2:y=(ih-oh)/2"
    )
}
