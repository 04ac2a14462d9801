//! Media kinds, formats and shallow structural signatures.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad category of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Image,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Concrete container/codec format, detected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    // Audio
    Mp3,
    Opus,
    Ogg,
    M4a,
    Wav,
    Aac,
    // Image
    Jpeg,
    Png,
    Webp,
    // Video
    Mp4,
    Avi,
    Mov,
    Mkv,
    Webm,
}

impl MediaFormat {
    /// Parses a file extension (case-insensitive, leading dot optional).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        let format = match ext.as_str() {
            "mp3" => Self::Mp3,
            "opus" => Self::Opus,
            "ogg" => Self::Ogg,
            "m4a" => Self::M4a,
            "wav" => Self::Wav,
            "aac" => Self::Aac,
            "jpg" | "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::Webp,
            "mp4" => Self::Mp4,
            "avi" => Self::Avi,
            "mov" => Self::Mov,
            "mkv" => Self::Mkv,
            "webm" => Self::Webm,
            _ => return None,
        };
        Some(format)
    }

    /// Detects the format from the last path segment of a URL.
    ///
    /// Query string and fragment are ignored.
    pub fn from_url(url: &Url) -> Option<Self> {
        let segment = url.path_segments()?.next_back()?;
        let (_, ext) = segment.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Mp3 | Self::Opus | Self::Ogg | Self::M4a | Self::Wav | Self::Aac => {
                MediaKind::Audio
            }
            Self::Jpeg | Self::Png | Self::Webp => MediaKind::Image,
            Self::Mp4 | Self::Avi | Self::Mov | Self::Mkv | Self::Webm => MediaKind::Video,
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Opus => "opus",
            Self::Ogg => "ogg",
            Self::M4a => "m4a",
            Self::Wav => "wav",
            Self::Aac => "aac",
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Mp4 => "mp4",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Mp3 => "audio/mpeg",
            Self::Opus => "audio/opus",
            Self::Ogg => "audio/ogg",
            Self::M4a => "audio/mp4",
            Self::Wav => "audio/wav",
            Self::Aac => "audio/aac",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Mp4 => "video/mp4",
            Self::Avi => "video/x-msvideo",
            Self::Mov => "video/quicktime",
            Self::Mkv => "video/x-matroska",
            Self::Webm => "video/webm",
        }
    }

    /// Format the transformed artifact is written in.
    pub fn output_format(&self) -> Self {
        match self {
            Self::Aac => Self::M4a,
            f if f.kind() == MediaKind::Video => Self::Mp4,
            f => *f,
        }
    }

    /// Checks the leading signature bytes for formats with a known container.
    ///
    /// Returns a short reason on mismatch.
    pub fn validate_signature(&self, data: &[u8]) -> Result<(), String> {
        let ok = match self {
            Self::Mp4 | Self::M4a => has_ftyp(data),
            Self::Mov => has_ftyp(data) || is_quicktime_atom(data),
            Self::Png => data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]),
            Self::Jpeg => data.starts_with(&[0xFF, 0xD8]),
            Self::Webp => is_riff(data, b"WEBP"),
            Self::Wav => is_riff(data, b"WAVE"),
            Self::Avi => is_riff(data, b"AVI "),
            Self::Ogg | Self::Opus => data.starts_with(b"OggS"),
            Self::Mkv | Self::Webm => data.starts_with(&[0x1A, 0x45, 0xDF, 0xA3]),
            Self::Mp3 => {
                data.starts_with(b"ID3")
                    || (data.len() >= 2 && data[0] == 0xFF && data[1] & 0xE0 == 0xE0)
            }
            Self::Aac => true,
        };

        if ok {
            Ok(())
        } else {
            Err(format!("missing {} signature", self.extension()))
        }
    }
}

fn has_ftyp(data: &[u8]) -> bool {
    let head = &data[..data.len().min(32)];
    head.windows(4).any(|w| w == b"ftyp")
}

/// Pre-`ftyp` QuickTime files open directly with one of these atoms.
fn is_quicktime_atom(data: &[u8]) -> bool {
    const ATOMS: [&[u8; 4]; 6] = [b"moov", b"mdat", b"wide", b"free", b"skip", b"pnot"];
    data.len() >= 8 && ATOMS.iter().any(|atom| &data[4..8] == *atom)
}

fn is_riff(data: &[u8], form: &[u8; 4]) -> bool {
    data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == form
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_from_url_ignores_query_and_case() {
        assert_eq!(
            MediaFormat::from_url(&url("https://cdn.example.com/a/b/Clip.MP4?sig=abc#t=3")),
            Some(MediaFormat::Mp4)
        );
        assert_eq!(
            MediaFormat::from_url(&url("http://x.test/photo.jpeg")),
            Some(MediaFormat::Jpeg)
        );
        assert_eq!(MediaFormat::from_url(&url("http://x.test/file.txt")), None);
        assert_eq!(MediaFormat::from_url(&url("http://x.test/noext")), None);
        assert_eq!(MediaFormat::from_url(&url("http://x.test/")), None);
    }

    #[test]
    fn test_output_format_mapping() {
        assert_eq!(MediaFormat::Aac.output_format(), MediaFormat::M4a);
        assert_eq!(MediaFormat::Webm.output_format(), MediaFormat::Mp4);
        assert_eq!(MediaFormat::Mov.output_format(), MediaFormat::Mp4);
        assert_eq!(MediaFormat::Png.output_format(), MediaFormat::Png);
        assert_eq!(MediaFormat::Opus.output_format(), MediaFormat::Opus);
    }

    #[test]
    fn test_kinds() {
        assert_eq!(MediaFormat::Wav.kind(), MediaKind::Audio);
        assert_eq!(MediaFormat::Webp.kind(), MediaKind::Image);
        assert_eq!(MediaFormat::Mkv.kind(), MediaKind::Video);
    }

    #[test]
    fn test_signatures() {
        let mut mp4 = vec![0, 0, 0, 0x20];
        mp4.extend_from_slice(b"ftypisom");
        assert!(MediaFormat::Mp4.validate_signature(&mp4).is_ok());
        assert!(MediaFormat::Mp4.validate_signature(b"not a video").is_err());

        assert!(MediaFormat::Webp.validate_signature(b"RIFF\0\0\0\0WEBPVP8 ").is_ok());
        assert!(MediaFormat::Webp.validate_signature(b"RIFF\0\0\0\0WAVEfmt ").is_err());
        assert!(MediaFormat::Jpeg.validate_signature(&[0xFF, 0xD8, 0xFF]).is_ok());
        assert!(MediaFormat::Mp3.validate_signature(b"ID3\x04").is_ok());
        assert!(MediaFormat::Mp3.validate_signature(&[0xFF, 0xFB, 0x90]).is_ok());
        assert!(MediaFormat::Mp3.validate_signature(b"<html>").is_err());
        assert!(MediaFormat::Aac.validate_signature(b"anything").is_ok());
    }

    #[test]
    fn test_legacy_quicktime_atoms() {
        let moov = b"\0\0\0\x6cmoov\0\0\0\x6cmvhd";
        let wide = b"\0\0\0\x08wide\0\0\x10\0mdat";
        assert!(MediaFormat::Mov.validate_signature(moov).is_ok());
        assert!(MediaFormat::Mov.validate_signature(wide).is_ok());
        assert!(MediaFormat::Mov.validate_signature(b"\0\0\0\x08mdat").is_ok());
        assert!(MediaFormat::Mov.validate_signature(b"\0\0\0\x08junk").is_err());

        // Only QuickTime predates ftyp.
        assert!(MediaFormat::Mp4.validate_signature(moov).is_err());
    }

    #[test]
    fn test_signature_error_names_format() {
        let err = MediaFormat::Png.validate_signature(b"GIF89a").unwrap_err();
        assert!(err.contains("png"));
    }
}
