//! Transform collaborator for re-encoding media.
//!
//! The heavy lifting is delegated to an external engine behind the
//! [`Transformer`] trait. Every run is parameterised by
//! [`TransformParams::derive`], which draws all randomised values from the
//! job's own nonce so concurrent runs never share generator state.
//!
//! # Example
//!
//! ```ignore
//! use recast_core::transform::{FfmpegTransformer, TransformJob, TransformParams, Transformer};
//!
//! let transformer = FfmpegTransformer::with_defaults();
//! transformer.validate().await?;
//!
//! let nonce = NonceEngine::new().generate();
//! let job = TransformJob {
//!     job_id: "job-1".to_string(),
//!     input_path: PathBuf::from("/tmp/in.original.mp3"),
//!     output_path: PathBuf::from("/tmp/out.mp3"),
//!     output_format: MediaFormat::Mp3,
//!     params: TransformParams::derive(MediaFormat::Mp3, &nonce),
//! };
//! let output = transformer.transform(job).await?;
//! ```

mod config;
mod error;
mod ffmpeg;
mod params;
mod pixels;
mod traits;
mod types;

pub use config::TransformerConfig;
pub use error::TransformError;
pub use ffmpeg::FfmpegTransformer;
pub(crate) use ffmpeg::output_size;
pub use params::{AudioParams, ImageParams, TransformParams, VideoParams};
pub use pixels::nudge_pixels;
pub use traits::Transformer;
pub use types::{TransformJob, TransformOutput};
