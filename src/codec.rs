use base64::{engine::general_purpose::STANDARD, Engine as _};
use opencv::{
    core::{Mat, Vector},
    imgcodecs, imgproc,
    prelude::*,
};
use std::path::Path;
use thiserror::Error;

pub const BASE64_MARKER: &str = "base64,";
pub const DEFAULT_JPEG_QUALITY: i32 = 95;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),
    #[error("Failed to encode frame: {0}")]
    Encode(String),
    #[error("Failed to write frame to {path}: {reason}")]
    Persist { path: String, reason: String },
}

impl From<base64::DecodeError> for CodecError {
    fn from(err: base64::DecodeError) -> Self {
        CodecError::Decode(format!("invalid base64 payload: {}", err))
    }
}

/// A single decoded raster image. Channel order follows OpenCV (BGR).
#[derive(Debug)]
pub struct Frame {
    mat: Mat,
}

impl Frame {
    pub fn new(mat: Mat) -> Self {
        Self { mat }
    }

    pub fn from_jpeg_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        let mat = imgcodecs::imdecode(&Vector::from_slice(bytes), imgcodecs::IMREAD_COLOR)
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        if mat.empty() {
            return Err(CodecError::Decode("payload is not a supported image".into()));
        }
        Ok(Self { mat })
    }

    pub fn width(&self) -> i32 {
        self.mat.cols()
    }

    pub fn height(&self) -> i32 {
        self.mat.rows()
    }

    pub fn channels(&self) -> i32 {
        self.mat.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.mat.empty()
    }

    /// Returns a three channel view of the frame, converting grayscale and
    /// BGRA input. Other layouts cannot be encoded.
    fn normalized(&self) -> Result<Mat, CodecError> {
        let code = match self.channels() {
            3 => return Ok(self.mat.clone()),
            1 => imgproc::COLOR_GRAY2BGR,
            4 => imgproc::COLOR_BGRA2BGR,
            other => {
                return Err(CodecError::Encode(format!(
                    "unsupported channel layout: {} channels",
                    other
                )))
            }
        };
        let mut converted = Mat::default();
        imgproc::cvt_color_def(&self.mat, &mut converted, code)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(converted)
    }

    pub fn to_jpeg(&self, quality: i32) -> Result<Vec<u8>, CodecError> {
        if self.is_empty() {
            return Err(CodecError::Encode("frame is empty".into()));
        }
        let mat = self.normalized()?;
        let params = Vector::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, quality]);
        let mut buf = Vector::<u8>::new();
        imgcodecs::imencode(".jpg", &mat, &mut buf, &params)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buf.into())
    }

    pub fn save_jpeg(&self, path: &Path, quality: i32) -> Result<(), CodecError> {
        let bytes = self.to_jpeg(quality)?;
        std::fs::write(path, bytes).map_err(|e| CodecError::Persist {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ImageCodec {
    quality: i32,
}

impl Default for ImageCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl ImageCodec {
    pub fn new(quality: i32) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> i32 {
        self.quality
    }

    pub fn encode_to_base64(&self, frame: &Frame) -> Result<String, CodecError> {
        let jpeg = frame.to_jpeg(self.quality)?;
        Ok(STANDARD.encode(jpeg))
    }

    pub fn decode_base64(&self, payload: &str) -> Result<Vec<u8>, CodecError> {
        Ok(STANDARD.decode(payload.trim())?)
    }
}

/// Removes a data-URI style prefix. The `base64,` marker wins over a plain
/// comma split so payload commas are never mistaken for the header.
pub fn strip_header(data: &str) -> &str {
    if let Some((_, payload)) = data.split_once(BASE64_MARKER) {
        return payload;
    }
    match data.split_once(',') {
        Some((_, payload)) => payload,
        None => data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opencv::core::{Scalar, CV_8UC1, CV_8UC3, CV_8UC4};

    fn solid_frame(typ: i32) -> Frame {
        let mat = Mat::new_rows_cols_with_default(48, 64, typ, Scalar::new(40.0, 90.0, 200.0, 255.0))
            .unwrap();
        Frame::new(mat)
    }

    #[test]
    fn test_strip_header() {
        assert_eq!(strip_header("data:image/jpeg;base64,XYZ"), "XYZ");
        assert_eq!(strip_header("XYZ"), "XYZ");
        assert_eq!(strip_header("a,b,base64,c"), "c");
        assert_eq!(strip_header("data:image/jpeg,XYZ"), "XYZ");
        assert_eq!(strip_header("head,a,b"), "a,b");
    }

    #[test]
    fn test_base64_carries_the_exact_jpeg_bytes() {
        let codec = ImageCodec::default();
        let frame = solid_frame(CV_8UC3);

        let jpeg = frame.to_jpeg(codec.quality()).unwrap();
        let encoded = codec.encode_to_base64(&frame).unwrap();
        let decoded = codec.decode_base64(&encoded).unwrap();

        assert_eq!(decoded, jpeg);
        assert_eq!(&decoded[..3], &[0xff, 0xd8, 0xff]);

        let reloaded = Frame::from_jpeg_bytes(&decoded).unwrap();
        assert_eq!(reloaded.width(), 64);
        assert_eq!(reloaded.height(), 48);
        assert_eq!(reloaded.channels(), 3);
    }

    #[test]
    fn test_grayscale_and_bgra_are_normalized() {
        let codec = ImageCodec::default();
        for typ in [CV_8UC1, CV_8UC4] {
            let encoded = codec.encode_to_base64(&solid_frame(typ)).unwrap();
            let bytes = codec.decode_base64(&encoded).unwrap();
            assert_eq!(Frame::from_jpeg_bytes(&bytes).unwrap().channels(), 3);
        }
    }

    #[test]
    fn test_empty_frame_fails_to_encode() {
        let codec = ImageCodec::default();
        let result = codec.encode_to_base64(&Frame::new(Mat::default()));

        assert!(matches!(result, Err(CodecError::Encode(_))));
    }

    #[test]
    fn test_invalid_payloads_fail_to_decode() {
        let codec = ImageCodec::default();

        assert!(matches!(
            codec.decode_base64("not base64!"),
            Err(CodecError::Decode(_))
        ));
        assert!(matches!(
            Frame::from_jpeg_bytes(b"plain text, not an image"),
            Err(CodecError::Decode(_))
        ));
    }
}
