use crate::client::TranslationClient;
use crate::codec::{CodecError, ImageCodec};
use crate::config::Config;
use crate::image_source::{persist_frame, ImageSource, SourceError};
use crate::request::{GenerationConfig, RequestError, TranslationRequestBuilder, SIGN_PROMPT};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationResult {
    pub text: String,
    pub confidence: f32,
}

impl TranslationResult {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

#[derive(Error, Debug)]
pub enum TranslationError {
    #[error("Image source error: {0}")]
    Source(#[from] SourceError),
    #[error("Image codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("Request error: {0}")]
    Request(#[from] RequestError),
}

/// Runs one image through acquisition, encoding, request building, the
/// network call and response interpretation.
pub struct Translator {
    client: TranslationClient,
    codec: ImageCodec,
    generation: GenerationConfig,
    upload_dir: Option<PathBuf>,
}

impl Translator {
    pub fn new(client: TranslationClient, codec: ImageCodec, generation: GenerationConfig) -> Self {
        Self {
            client,
            codec,
            generation,
            upload_dir: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = TranslationClient::from_config(&config.translator)?;
        let translator = Self::new(
            client,
            ImageCodec::new(config.image.jpeg_quality),
            config.translator.generation.clone().into(),
        );
        Ok(if config.debug.save_uploads {
            translator.with_upload_dir(config.debug.image_dir.clone())
        } else {
            translator
        })
    }

    /// Keep a copy of every decoded upload in `dir`.
    pub fn with_upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = Some(dir.into());
        self
    }

    pub fn codec(&self) -> ImageCodec {
        self.codec
    }

    pub fn has_credential(&self) -> bool {
        self.client.has_credential()
    }

    #[instrument(skip_all)]
    pub async fn translate(
        &self,
        source: &dyn ImageSource,
    ) -> Result<TranslationResult, TranslationError> {
        let frame = source.acquire().await?;
        tracing::debug!(
            width = frame.width(),
            height = frame.height(),
            channels = frame.channels(),
            "Acquired frame"
        );

        if let Some(dir) = &self.upload_dir {
            match persist_frame(&frame, dir, "upload", self.codec) {
                Ok(path) => tracing::debug!("Saved upload to {}", path.display()),
                Err(e) => tracing::warn!("Could not save upload: {}", e),
            }
        }

        let encoded = self.codec.encode_to_base64(&frame)?;
        drop(frame);

        let request =
            TranslationRequestBuilder::build(&encoded, SIGN_PROMPT, self.generation.clone())?;

        Ok(self.client.send(&request).await)
    }
}
