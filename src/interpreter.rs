use crate::translator::TranslationResult;
use serde::Deserialize;

pub const UNKNOWN_TEXT: &str = "Unknown";
pub const UNCERTAIN_TEXT: &str = "Uncertain";
pub const NEUTRAL_CONFIDENCE: f32 = 0.5;

// Every field is optional: the upstream omits whole branches when it blocks
// or truncates a candidate.

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Option<Vec<Candidate>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<CandidateContent>,
    #[serde(default)]
    pub safety_ratings: Option<Vec<SafetyRating>>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Option<Vec<ContentPart>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SafetyRating {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub probability: Option<String>,
    #[serde(default)]
    pub probability_score: Option<f32>,
}

/// Turns a `generateContent` response into a [`TranslationResult`].
///
/// The confidence is a proxy, not a calibrated probability: when enabled it
/// is the highest safety-rating score of the first candidate, a value that
/// measures content risk rather than recognition certainty. Responses
/// without usable ratings get [`NEUTRAL_CONFIDENCE`].
#[derive(Debug, Clone, Default)]
pub struct ResponseInterpreter {
    use_safety_confidence: bool,
    min_confidence: Option<f32>,
}

impl ResponseInterpreter {
    pub fn new(use_safety_confidence: bool, min_confidence: Option<f32>) -> Self {
        Self {
            use_safety_confidence,
            min_confidence,
        }
    }

    pub fn interpret(&self, response: &GenerateContentResponse) -> TranslationResult {
        let Some(candidate) = response
            .candidates
            .as_deref()
            .and_then(|candidates| candidates.first())
        else {
            return TranslationResult::new(UNKNOWN_TEXT, NEUTRAL_CONFIDENCE);
        };

        let text = candidate
            .content
            .as_ref()
            .and_then(|content| content.parts.as_deref())
            .unwrap_or_default()
            .iter()
            .filter_map(|part| part.text.as_deref())
            .map(str::trim)
            .find(|text| !text.is_empty());

        let confidence = if self.use_safety_confidence {
            max_safety_score(candidate).unwrap_or(NEUTRAL_CONFIDENCE)
        } else {
            NEUTRAL_CONFIDENCE
        };

        match text {
            Some(_) if self.min_confidence.is_some_and(|min| confidence < min) => {
                TranslationResult::new(UNCERTAIN_TEXT, confidence)
            }
            Some(text) => TranslationResult::new(text, confidence),
            None => {
                tracing::debug!(
                    finish_reason = ?candidate.finish_reason,
                    "Candidate carried no text"
                );
                TranslationResult::new(UNKNOWN_TEXT, confidence)
            }
        }
    }

    /// Parses a raw body; `None` means the body is not a response document.
    pub fn interpret_body(&self, body: &str) -> Option<TranslationResult> {
        match serde_json::from_str::<GenerateContentResponse>(body) {
            Ok(response) => Some(self.interpret(&response)),
            Err(e) => {
                tracing::error!("Malformed response from inference API: {}", e);
                None
            }
        }
    }
}

/// Maps the categorical `probability` bucket onto the numeric scale used by
/// `probabilityScore`: NEGLIGIBLE 0.0, LOW 0.33, MEDIUM 0.67, HIGH 1.0.
fn categorical_score(probability: &str) -> Option<f32> {
    match probability {
        "NEGLIGIBLE" => Some(0.0),
        "LOW" => Some(0.33),
        "MEDIUM" => Some(0.67),
        "HIGH" => Some(1.0),
        _ => None,
    }
}

/// Highest score across the ratings. A numeric score wins over the
/// categorical bucket of the same rating.
fn max_safety_score(candidate: &Candidate) -> Option<f32> {
    candidate
        .safety_ratings
        .as_deref()?
        .iter()
        .filter_map(|rating| {
            rating
                .probability_score
                .or_else(|| rating.probability.as_deref().and_then(categorical_score))
        })
        .filter(|score| score.is_finite())
        .map(|score| score.clamp(0.0, 1.0))
        .reduce(f32::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interpret(body: &str) -> TranslationResult {
        ResponseInterpreter::new(true, None)
            .interpret_body(body)
            .unwrap()
    }

    #[test]
    fn test_text_without_ratings_gets_neutral_confidence() {
        let result =
            interpret(r#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]}}]}"#);

        assert_eq!(result, TranslationResult::new("Hello", 0.5));
    }

    #[test]
    fn test_missing_or_empty_candidates_are_unknown() {
        assert_eq!(
            interpret(r#"{"candidates":[]}"#),
            TranslationResult::new("Unknown", 0.5)
        );
        assert_eq!(interpret("{}"), TranslationResult::new("Unknown", 0.5));
    }

    #[test]
    fn test_first_part_with_text_is_trimmed() {
        let body = r#"{"candidates":[
            {"content":{"parts":[{"inlineData":{}},{"text":"  Thank you \n"},{"text":"ignored"}]}},
            {"content":{"parts":[{"text":"second candidate"}]}}
        ]}"#;

        assert_eq!(interpret(body).text, "Thank you");
    }

    #[test]
    fn test_candidate_without_text_is_unknown() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY","content":{"parts":[{}]}}]}"#;

        assert_eq!(interpret(body), TranslationResult::new("Unknown", 0.5));
    }

    #[test]
    fn test_max_safety_score_is_the_confidence_proxy() {
        let body = r#"{"candidates":[{
            "content":{"parts":[{"text":"A"}]},
            "safetyRatings":[
                {"category":"HARM_CATEGORY_HARASSMENT","probability":"NEGLIGIBLE","probabilityScore":0.25},
                {"category":"HARM_CATEGORY_HATE_SPEECH","probability":"LOW"},
                {"category":"HARM_CATEGORY_DANGEROUS_CONTENT","probabilityScore":0.75}
            ]
        }]}"#;

        assert_eq!(interpret(body), TranslationResult::new("A", 0.75));

        let disabled = ResponseInterpreter::new(false, None)
            .interpret_body(body)
            .unwrap();
        assert_eq!(disabled, TranslationResult::new("A", 0.5));
    }

    #[test]
    fn test_categorical_only_ratings_feed_the_proxy() {
        let body = r#"{"candidates":[{
            "content":{"parts":[{"text":"C"}]},
            "safetyRatings":[
                {"category":"HARM_CATEGORY_HARASSMENT","probability":"NEGLIGIBLE"},
                {"category":"HARM_CATEGORY_HATE_SPEECH","probability":"HIGH"},
                {"category":"HARM_CATEGORY_SEXUALLY_EXPLICIT","probability":"HARM_PROBABILITY_UNSPECIFIED"}
            ]
        }]}"#;

        assert_eq!(interpret(body), TranslationResult::new("C", 1.0));

        let negligible = r#"{"candidates":[{
            "content":{"parts":[{"text":"C"}]},
            "safetyRatings":[{"probability":"NEGLIGIBLE"}]
        }]}"#;
        let result = ResponseInterpreter::new(true, Some(0.5))
            .interpret_body(negligible)
            .unwrap();
        assert_eq!(result, TranslationResult::new("Uncertain", 0.0));

        let unrecognized = r#"{"candidates":[{
            "content":{"parts":[{"text":"C"}]},
            "safetyRatings":[{"probability":"SOMETIMES"}]
        }]}"#;
        assert_eq!(interpret(unrecognized), TranslationResult::new("C", 0.5));
    }

    #[test]
    fn test_numeric_score_wins_over_bucket() {
        let body = r#"{"candidates":[{
            "content":{"parts":[{"text":"D"}]},
            "safetyRatings":[{"probability":"HIGH","probabilityScore":0.4}]
        }]}"#;

        assert_eq!(interpret(body), TranslationResult::new("D", 0.4));
    }

    #[test]
    fn test_low_confidence_becomes_uncertain() {
        let body = r#"{"candidates":[{
            "content":{"parts":[{"text":"B"}]},
            "safetyRatings":[{"probabilityScore":0.25}]
        }]}"#;

        let result = ResponseInterpreter::new(true, Some(0.5))
            .interpret_body(body)
            .unwrap();

        assert_eq!(result, TranslationResult::new("Uncertain", 0.25));
    }

    #[test]
    fn test_malformed_body_is_rejected() {
        let interpreter = ResponseInterpreter::default();

        assert!(interpreter.interpret_body("<html>bad gateway</html>").is_none());
        assert!(interpreter
            .interpret_body(r#"{"candidates":"nope"}"#)
            .is_none());
    }
}
