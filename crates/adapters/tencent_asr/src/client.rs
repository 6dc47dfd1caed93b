use std::future::Future;

use base64::Engine as _;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use hassbridge_app::ports::{Transcriber, Transcript, TranscriptionRequest};
use hassbridge_domain::error::BridgeError;

use crate::config::TencentAsrConfig;
use crate::error::AsrError;
use crate::sign::{self, Signer};

const ACTION: &str = "SentenceRecognition";
const VERSION: &str = "2019-06-14";

/// Tencent Cloud "one sentence recognition" client.
#[derive(Clone)]
pub struct TencentAsr {
    client: reqwest::Client,
    endpoint: reqwest::Url,
    host: String,
    secret_id: String,
    secret_key: String,
}

impl std::fmt::Debug for TencentAsr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TencentAsr")
            .field("endpoint", &self.endpoint.as_str())
            .field("secret_id", &self.secret_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionRequest<'a> {
    sub_service_type: u8,
    #[serde(rename = "EngSerViceType")]
    engine: &'a str,
    source_type: u8,
    voice_format: &'a str,
    data: String,
    data_len: usize,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: RecognitionResponse,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognitionResponse {
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<VendorError>,
    #[serde(default)]
    request_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VendorError {
    code: String,
    #[serde(default)]
    message: String,
}

impl TencentAsr {
    /// # Errors
    ///
    /// Returns [`AsrError::InvalidEndpoint`] when the endpoint is not an
    /// absolute URL with a host.
    pub fn new(config: &TencentAsrConfig) -> Result<Self, AsrError> {
        let endpoint = reqwest::Url::parse(&config.endpoint)
            .map_err(|_| AsrError::InvalidEndpoint(config.endpoint.clone()))?;
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => return Err(AsrError::InvalidEndpoint(config.endpoint.clone())),
        };
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            host,
            secret_id: config.secret_id.clone(),
            secret_key: config.secret_key.clone(),
        })
    }

    async fn recognize(&self, request: &TranscriptionRequest) -> Result<Transcript, AsrError> {
        let audio = &request.clip.audio;
        let body = serde_json::to_vec(&RecognitionRequest {
            sub_service_type: 2,
            engine: &request.engine,
            source_type: 1,
            voice_format: &request.clip.format,
            data: base64::engine::general_purpose::STANDARD.encode(audio),
            data_len: audio.len(),
        })
        .map_err(AsrError::Decode)?;

        let timestamp = chrono::Utc::now().timestamp();
        let signer = Signer {
            secret_id: &self.secret_id,
            secret_key: &self.secret_key,
        };
        let authorization = signer.authorization(&self.host, &body, timestamp)?;
        let headers = self.headers(&authorization, timestamp, &request.region)?;

        tracing::debug!(engine = %request.engine, bytes = audio.len(), "calling sentence recognition");
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(headers)
            .body(body)
            .send()
            .await
            .map_err(AsrError::Request)?;
        let status = response.status();
        let text = response.text().await.map_err(AsrError::Request)?;
        if !status.is_success() {
            return Err(AsrError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let Envelope { response } = serde_json::from_str(&text).map_err(AsrError::Decode)?;
        if let Some(error) = response.error {
            return Err(AsrError::Vendor {
                code: error.code,
                message: error.message,
            });
        }
        match response.result.filter(|text| !text.trim().is_empty()) {
            Some(text) => Ok(Transcript::Text(text)),
            None => {
                tracing::debug!(request_id = ?response.request_id, "recognition returned no text");
                Ok(Transcript::NoResult)
            }
        }
    }

    fn headers(&self, authorization: &str, timestamp: i64, region: &str) -> Result<HeaderMap, AsrError> {
        let value = |v: &str| {
            HeaderValue::from_str(v).map_err(|_| AsrError::InvalidEndpoint(self.endpoint.to_string()))
        };
        let mut headers = HeaderMap::new();
        let mut auth = value(authorization)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(sign::CONTENT_TYPE));
        headers.insert("x-tc-action", HeaderValue::from_static(ACTION));
        headers.insert("x-tc-version", HeaderValue::from_static(VERSION));
        headers.insert("x-tc-timestamp", HeaderValue::from(timestamp));
        if !region.is_empty() {
            headers.insert("x-tc-region", value(region)?);
        }
        Ok(headers)
    }
}

impl Transcriber for TencentAsr {
    fn transcribe(
        &self,
        request: TranscriptionRequest,
    ) -> impl Future<Output = Result<Transcript, BridgeError>> + Send {
        async move {
            if request.clip.audio.is_empty() {
                return Ok(Transcript::NoResult);
            }
            self.recognize(&request).await.map_err(|err| {
                tracing::warn!(error = %err, "sentence recognition failed");
                BridgeError::from(err)
            })
        }
    }
}
