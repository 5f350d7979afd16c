//! Client for the remote text-generation API (Gemini `generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GenerationError;
use crate::models::GenerationConfig;
use crate::utils::RetryPolicy;
use crate::utils::text::truncate_with_ellipsis;

const TRANSCRIBE_INSTRUCTION: &str = "Transcribe this audio recording verbatim. \
Respond with the spoken words only, without commentary or formatting.";

/// Produces text for a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError>;
}

/// Turns recorded speech into text.
#[async_trait]
pub trait SpeechToText: Send + Sync {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, GenerationError>;
}

/// Reads text aloud.
#[async_trait]
pub trait TextToSpeech: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, GenerationError>;
}

/// Encoded audio ready to hand to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedSpeech {
    pub audio: Vec<u8>,
    pub mime_type: String,
}

/// Sample rate assumed when a PCM response does not state one.
const DEFAULT_PCM_RATE: u32 = 24_000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationParams,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationParams {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechRequest {
    contents: Vec<Content>,
    generation_config: SpeechParams,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechParams {
    response_modalities: Vec<&'static str>,
    speech_config: SpeechConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoice,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoice {
    voice_name: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<ResponseInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseInlineData {
    mime_type: String,
    data: String,
}

pub struct GeminiClient {
    http: reqwest::Client,
    config: GenerationConfig,
    retry: RetryPolicy,
}

impl GeminiClient {
    pub fn new(config: &GenerationConfig) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            config: config.clone(),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key().is_ok()
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.config
            .api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(GenerationError::MissingApiKey)
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_url.trim_end_matches('/'),
            model
        )
    }

    fn build_speech_request(&self, text: &str) -> SpeechRequest {
        SpeechRequest {
            contents: vec![Content {
                parts: vec![Part::Text {
                    text: text.to_string(),
                }],
            }],
            generation_config: SpeechParams {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoice {
                            voice_name: self.config.voice.clone(),
                        },
                    },
                },
            },
        }
    }

    fn build_request(&self, parts: Vec<Part>, max_output_tokens: u32) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationParams {
                temperature: self.config.temperature,
                top_k: self.config.top_k,
                top_p: self.config.top_p,
                max_output_tokens,
            },
        }
    }

    async fn send(&self, request: &GenerateContentRequest) -> Result<String, GenerationError> {
        let response = self
            .post(&self.config.model, "generate_content", request)
            .await?;
        extract_text(response)
    }

    async fn post<R>(
        &self,
        model: &str,
        label: &str,
        request: &R,
    ) -> Result<GenerateContentResponse, GenerationError>
    where
        R: Serialize + Sync,
    {
        let api_key = self.api_key()?;
        let endpoint = self.endpoint(model);
        let url = endpoint.as_str();
        let http = &self.http;

        self.retry
            .run(label, || async move {
                let response = http
                    .post(url)
                    .header("x-goog-api-key", api_key)
                    .json(request)
                    .send()
                    .await
                    .map_err(classify_request_error)?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(GenerationError::ServerError {
                        status: status.as_u16(),
                        message: truncate_with_ellipsis(&body, 300),
                    });
                }

                response
                    .json::<GenerateContentResponse>()
                    .await
                    .map_err(|e| GenerationError::InvalidResponse(e.to_string()))
            })
            .await
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        max_output_tokens: u32,
    ) -> Result<String, GenerationError> {
        let request = self.build_request(
            vec![Part::Text {
                text: prompt.to_string(),
            }],
            max_output_tokens,
        );
        let text = self.send(&request).await?;
        debug!(
            prompt_chars = prompt.len(),
            response_chars = text.len(),
            "generation complete"
        );
        Ok(text)
    }
}

#[async_trait]
impl SpeechToText for GeminiClient {
    async fn transcribe(&self, audio: &[u8], mime_type: &str) -> Result<String, GenerationError> {
        let request = self.build_request(
            vec![
                Part::Text {
                    text: TRANSCRIBE_INSTRUCTION.to_string(),
                },
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type: mime_type.to_string(),
                        data: BASE64.encode(audio),
                    },
                },
            ],
            self.config.max_output_tokens,
        );
        let text = self.send(&request).await?;
        Ok(text.trim().to_string())
    }
}

#[async_trait]
impl TextToSpeech for GeminiClient {
    async fn synthesize(&self, text: &str) -> Result<SynthesizedSpeech, GenerationError> {
        let request = self.build_speech_request(text);
        let response = self
            .post(&self.config.speech_model, "synthesize_speech", &request)
            .await?;
        let speech = extract_audio(response)?;
        debug!(
            text_chars = text.len(),
            audio_bytes = speech.audio.len(),
            mime_type = %speech.mime_type,
            "speech synthesized"
        );
        Ok(speech)
    }
}

fn classify_request_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else if err.is_connect() {
        GenerationError::ConnectionError(err.to_string())
    } else {
        GenerationError::RequestError(err)
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String, GenerationError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::InvalidResponse("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(GenerationError::InvalidResponse(
            "candidate contained no text".to_string(),
        ));
    }
    Ok(text)
}

/// Decode the first inline audio part. Raw PCM is wrapped in a WAV container.
fn extract_audio(response: GenerateContentResponse) -> Result<SynthesizedSpeech, GenerationError> {
    let inline = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .into_iter()
        .flat_map(|content| content.parts)
        .find_map(|part| part.inline_data)
        .ok_or_else(|| {
            GenerationError::InvalidResponse("candidate contained no audio".to_string())
        })?;

    let audio = BASE64
        .decode(inline.data.as_bytes())
        .map_err(|e| GenerationError::InvalidResponse(format!("invalid audio payload: {}", e)))?;

    let mime = inline.mime_type.to_ascii_lowercase();
    if mime.starts_with("audio/l16") || mime.starts_with("audio/pcm") {
        let rate = pcm_sample_rate(&mime).unwrap_or(DEFAULT_PCM_RATE);
        return Ok(SynthesizedSpeech {
            audio: pcm_to_wav(&audio, rate),
            mime_type: "audio/wav".to_string(),
        });
    }

    Ok(SynthesizedSpeech {
        audio,
        mime_type: inline.mime_type,
    })
}

fn pcm_sample_rate(mime: &str) -> Option<u32> {
    mime.split(';')
        .find_map(|param| param.trim().strip_prefix("rate="))
        .and_then(|rate| rate.parse().ok())
}

/// 16-bit little-endian mono PCM to a WAV file.
fn pcm_to_wav(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    const CHANNELS: u16 = 1;
    const BITS_PER_SAMPLE: u16 = 16;
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let byte_rate = sample_rate * u32::from(block_align);
    let data_len = pcm.len() as u32;

    let mut wav = Vec::with_capacity(44 + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&CHANNELS.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
