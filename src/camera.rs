use crate::codec::Frame;
use crate::config::CameraConfig;
use opencv::{core::Mat, prelude::*, videoio};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("Camera {index} is unavailable: {reason}")]
    DeviceUnavailable { index: i32, reason: String },
    #[error("Failed to read frame: {0}")]
    ReadFrameFailed(String),
}

/// Exclusively owned capture device. The handle is released when the camera
/// is dropped, whichever way the owning flow exits.
#[derive(Debug)]
pub struct Camera {
    capture: Mutex<videoio::VideoCapture>,
    index: i32,
    warmup_frames: u32,
}

impl Camera {
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let index = config.device_index;
        let capture = videoio::VideoCapture::new(index, videoio::CAP_ANY).map_err(|e| {
            CameraError::DeviceUnavailable {
                index,
                reason: e.to_string(),
            }
        })?;

        let opened = capture
            .is_opened()
            .map_err(|e| CameraError::DeviceUnavailable {
                index,
                reason: e.to_string(),
            })?;
        if !opened {
            return Err(CameraError::DeviceUnavailable {
                index,
                reason: "device could not be opened".into(),
            });
        }

        tracing::info!("Opened camera {}", index);

        Ok(Self {
            capture: Mutex::new(capture),
            index,
            warmup_frames: config.warmup_frames,
        })
    }

    /// Discards the warm-up reads so auto exposure can settle, then returns
    /// the next frame.
    pub async fn capture_frame(&self) -> Result<Frame, CameraError> {
        let mut cam = self.capture.lock().await;
        let mut frame = Mat::default();

        for _ in 0..self.warmup_frames {
            cam.read(&mut frame)
                .map_err(|e| CameraError::ReadFrameFailed(e.to_string()))?;
        }

        let grabbed = cam
            .read(&mut frame)
            .map_err(|e| CameraError::ReadFrameFailed(e.to_string()))?;
        if !grabbed || frame.empty() {
            return Err(CameraError::ReadFrameFailed(format!(
                "camera {} returned no frame",
                self.index
            )));
        }

        Ok(Frame::new(frame))
    }
}

impl Drop for Camera {
    fn drop(&mut self) {
        if let Err(e) = self.capture.get_mut().release() {
            tracing::warn!("Failed to release camera {}: {:?}", self.index, e);
        } else {
            tracing::info!("Released camera {}", self.index);
        }
    }
}
