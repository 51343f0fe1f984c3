use crate::config::GenerationSettings;
use serde::Serialize;
use thiserror::Error;

/// Instruction sent with every image. Rewording it changes what the model
/// answers, so treat edits as breaking.
pub const SIGN_PROMPT: &str = "Declare the sign language sign presented in the image. \
Just respond with the sign. If no sign detected, state 'No sign detected'";

pub const JPEG_MIME_TYPE: &str = "image/jpeg";

#[derive(Error, Debug, PartialEq)]
pub enum RequestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationSettings::default().into()
    }
}

impl From<GenerationSettings> for GenerationConfig {
    fn from(settings: GenerationSettings) -> Self {
        Self {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

/// `generateContent` payload. Fields are private so a built request cannot
/// be altered afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

pub struct TranslationRequestBuilder;

impl TranslationRequestBuilder {
    pub fn build(
        encoded_image: &str,
        instruction: &str,
        generation_config: GenerationConfig,
    ) -> Result<TranslationRequest, RequestError> {
        if encoded_image.trim().is_empty() {
            return Err(RequestError::InvalidInput(
                "encoded image must not be empty".into(),
            ));
        }

        Ok(TranslationRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: instruction.to_string(),
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: JPEG_MIME_TYPE.to_string(),
                            data: encoded_image.to_string(),
                        },
                    },
                ],
            }],
            generation_config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_serializes_generate_content_payload() {
        let request =
            TranslationRequestBuilder::build("QUJD", SIGN_PROMPT, GenerationConfig::default())
                .unwrap();

        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(
            body,
            json!({
                "contents": [{
                    "parts": [
                        { "text": SIGN_PROMPT },
                        { "inline_data": { "mime_type": "image/jpeg", "data": "QUJD" } }
                    ]
                }],
                "generationConfig": {
                    "temperature": 0.4f32,
                    "topP": 1.0,
                    "topK": 32,
                    "maxOutputTokens": 100
                }
            })
        );
    }

    #[test]
    fn test_generation_settings_flow_into_the_payload() {
        let config = GenerationConfig {
            temperature: 0.0,
            top_p: 0.5,
            top_k: 1,
            max_output_tokens: 8,
        };
        let request = TranslationRequestBuilder::build("QUJD", "name it", config).unwrap();

        let body = serde_json::to_value(&request).unwrap();

        assert_eq!(body["contents"][0]["parts"][0]["text"], "name it");
        assert_eq!(body["generationConfig"]["topK"], 1);
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8);
    }

    #[test]
    fn test_empty_image_is_invalid_input() {
        let result = TranslationRequestBuilder::build("  ", SIGN_PROMPT, GenerationConfig::default());

        assert!(matches!(result, Err(RequestError::InvalidInput(_))));
    }

    #[test]
    fn test_prompt_names_the_no_sign_sentinel() {
        assert!(SIGN_PROMPT.contains("'No sign detected'"));
    }
}
