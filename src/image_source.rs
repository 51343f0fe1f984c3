use crate::camera::{Camera, CameraError};
use crate::codec::{CodecError, Frame, ImageCodec, BASE64_MARKER};
use async_trait::async_trait;
use chrono::Local;
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Produces exactly one frame per call.
#[async_trait]
pub trait ImageSource: Send + Sync {
    async fn acquire(&self) -> Result<Frame, SourceError>;
}

/// A frame supplied by a client as a data URI or a bare base64 payload.
pub struct UploadSource<'a> {
    data: &'a str,
    codec: ImageCodec,
}

impl<'a> UploadSource<'a> {
    pub fn new(data: &'a str, codec: ImageCodec) -> Self {
        Self { data, codec }
    }

    fn payload(&self) -> &'a str {
        match self.data.split_once(BASE64_MARKER) {
            Some((_, payload)) => payload,
            None => self.data,
        }
    }
}

#[async_trait]
impl ImageSource for UploadSource<'_> {
    async fn acquire(&self) -> Result<Frame, SourceError> {
        let bytes = self.codec.decode_base64(self.payload())?;
        Ok(Frame::from_jpeg_bytes(&bytes)?)
    }
}

/// Interactive capture from a shared camera: counts down, captures, and
/// optionally keeps a timestamped copy of the frame.
pub struct CameraSource {
    camera: Arc<Camera>,
    countdown: Duration,
    capture_dir: Option<PathBuf>,
    codec: ImageCodec,
}

impl CameraSource {
    pub fn new(camera: Arc<Camera>, countdown: Duration, codec: ImageCodec) -> Self {
        Self {
            camera,
            countdown,
            capture_dir: None,
            codec,
        }
    }

    pub fn with_capture_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.capture_dir = Some(dir.into());
        self
    }

    async fn countdown(&self) {
        let mut remaining = self.countdown.as_secs();
        while remaining > 0 {
            println!("{}...", remaining);
            sleep(Duration::from_secs(1)).await;
            remaining -= 1;
        }
    }
}

#[async_trait]
impl ImageSource for CameraSource {
    async fn acquire(&self) -> Result<Frame, SourceError> {
        self.countdown().await;
        let frame = self.camera.capture_frame().await?;

        if let Some(dir) = &self.capture_dir {
            match persist_frame(&frame, dir, "capture", self.codec) {
                Ok(path) => tracing::info!("Saved capture to {}", path.display()),
                Err(e) => tracing::warn!("Could not save capture: {}", e),
            }
        }

        Ok(frame)
    }
}

pub fn timestamped_path(dir: &Path, prefix: &str) -> PathBuf {
    let stamp = Local::now().format("%Y%m%d_%H%M%S_%3f");
    dir.join(format!("{}_{}.jpg", prefix, stamp))
}

pub fn persist_frame(
    frame: &Frame,
    dir: &Path,
    prefix: &str,
    codec: ImageCodec,
) -> Result<PathBuf, CodecError> {
    let path = timestamped_path(dir, prefix);
    frame.save_jpeg(&path, codec.quality())?;
    Ok(path)
}
