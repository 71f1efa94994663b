//! Text-to-speech vendor endpoint.
//!
//! `POST {host}/v1/text-to-speech/{voice_id}` with an `xi-api-key` header.
//! The response is a binary audio payload; it is written under the data
//! dir and surfaced to callers as a local file path, which is what the
//! audio player consumes.

use std::path::PathBuf;

use async_trait::async_trait;
use parley_schema::ClientError;
use serde_json::json;

use super::EndpointAdapter;

const DEFAULT_MODEL_ID: &str = "eleven_turbo_v2";
const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";

#[derive(Debug, Clone, Default)]
pub struct SpeechConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub voice_id: String,
}

impl SpeechConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("PARLEY_TTS_API_URL").ok().filter(|v| !v.is_empty()),
            api_key: std::env::var("PARLEY_TTS_API_KEY").ok().filter(|v| !v.is_empty()),
            voice_id: std::env::var("PARLEY_TTS_VOICE_ID")
                .unwrap_or_else(|_| "21m00Tcm4TlvDq8ikWAM".to_string()),
        }
    }

    pub fn new(host: impl Into<String>, api_key: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
            api_key: Some(api_key.into()),
            voice_id: voice_id.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpeechAdapter {
    host: String,
    api_key: String,
    voice_id: String,
    audio_dir: PathBuf,
    configured: bool,
}

impl SpeechAdapter {
    pub fn new(config: SpeechConfig, data_dir: &std::path::Path) -> Self {
        let configured = config.host.is_some() && config.api_key.is_some();
        Self {
            host: config
                .host
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.unwrap_or_default(),
            voice_id: config.voice_id,
            audio_dir: data_dir.join("audio"),
            configured,
        }
    }

    /// Synthesis payload for one utterance.
    pub fn payload(text: &str) -> serde_json::Value {
        json!({
            "text": text,
            "model_id": DEFAULT_MODEL_ID,
            "voice_settings": {
                "stability": 0.5,
                "similarity_boost": 0.75
            },
            "output_format": DEFAULT_OUTPUT_FORMAT,
            "optimize_streaming_latency": 2
        })
    }
}

#[async_trait]
impl EndpointAdapter for SpeechAdapter {
    fn name(&self) -> &'static str {
        "speech"
    }

    fn is_configured(&self) -> bool {
        self.configured
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/text-to-speech/{}", self.host, self.voice_id)
    }

    fn cache_ttl(&self) -> chrono::Duration {
        parley_store::synth_audio_ttl()
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("xi-api-key", &self.api_key)
            .header("content-type", "application/json")
    }

    /// Write the binary audio body to the data dir and return its path.
    async fn parse_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<serde_json::Value, ClientError> {
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read audio body: {e}")))?;

        let file_name = format!("{}.mp3", uuid::Uuid::new_v4());
        let path = self.audio_dir.join(file_name);
        let write = async {
            tokio::fs::create_dir_all(&self.audio_dir).await?;
            tokio::fs::write(&path, &bytes).await?;
            Ok::<(), std::io::Error>(())
        }
        .await;
        write.map_err(|e| ClientError::Transport(format!("failed to store audio: {e}")))?;

        Ok(json!({
            "audio_path": path.to_string_lossy(),
            "bytes": bytes.len(),
        }))
    }
}
