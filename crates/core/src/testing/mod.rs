//! Testing utilities and mock implementations.
//!
//! Lets the pipeline, pool and store be exercised end to end without an
//! external transform engine installed or a real remote origin.
//!
//! # Example
//!
//! ```rust,ignore
//! use recast_core::testing::{fixtures, MockTransformer};
//!
//! let transformer = Arc::new(MockTransformer::new());
//! let body = fixtures::media_bytes(MediaFormat::Png, 512);
//! ```

mod media_server;
mod mock_transformer;

pub use media_server::{MediaServer, Reply};
pub use mock_transformer::{MockTransformer, RecordedTransform};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::media::MediaFormat;

    /// Bytes padded to `len` that pass the signature check for `format`.
    pub fn media_bytes(format: MediaFormat, len: usize) -> Vec<u8> {
        let mut data: Vec<u8> = match format {
            MediaFormat::Mp4 | MediaFormat::Mov | MediaFormat::M4a => {
                let mut d = vec![0x00, 0x00, 0x00, 0x20];
                d.extend_from_slice(b"ftypisom");
                d
            }
            MediaFormat::Png => vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A],
            MediaFormat::Jpeg => vec![0xFF, 0xD8, 0xFF, 0xE0],
            MediaFormat::Webp => b"RIFF\0\0\0\0WEBPVP8 ".to_vec(),
            MediaFormat::Wav => b"RIFF\0\0\0\0WAVEfmt ".to_vec(),
            MediaFormat::Avi => b"RIFF\0\0\0\0AVI LIST".to_vec(),
            MediaFormat::Ogg | MediaFormat::Opus => b"OggS".to_vec(),
            MediaFormat::Mkv | MediaFormat::Webm => vec![0x1A, 0x45, 0xDF, 0xA3],
            MediaFormat::Mp3 => b"ID3\x04\0".to_vec(),
            MediaFormat::Aac => vec![0xFF, 0xF1],
        };
        let mut i = 0u8;
        while data.len() < len {
            data.push(i);
            i = i.wrapping_add(1);
        }
        data
    }
}
