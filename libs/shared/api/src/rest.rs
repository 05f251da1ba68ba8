use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    multipart::{Form, Part},
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;
use shared_models::{AppError, AppResult};

/// One file in a multipart upload.
#[derive(Debug, Clone)]
pub struct MultipartPart {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Thin JSON client for the listing backend. Every remote call made by the
/// cells goes through here, so the timeout and error mapping live in one place.
#[derive(Debug, Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

impl RestClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            auth_token: config.api_token.clone(),
        })
    }

    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_headers(&self, json_body: bool) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if json_body {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }

        if let Some(token) = &self.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| AppError::Internal("Auth token is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Sends the request and returns the raw body of a successful response.
    async fn execute(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&Value>,
    ) -> AppResult<String> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.get_headers(body.is_some())?);

        if !query.is_empty() {
            req = req.query(query);
        }
        if let Some(body_data) = body {
            req = req.json(body_data);
        }

        let response = req.send().await.map_err(transport_error)?;
        read_body(response).await
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
    {
        let text = self.execute(method, path, query, body.as_ref()).await?;
        if text.trim().is_empty() {
            return Err(AppError::Internal(format!("Empty response body from {}", path)));
        }
        Ok(serde_json::from_str(&text)?)
    }

    /// Like [`request`](Self::request) for endpoints that may answer with an
    /// empty success instead of the updated resource.
    pub async fn request_optional<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let text = self.execute(method, path, &[], body.as_ref()).await?;
        Ok(decode_optional(path, &text))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.request(Method::GET, path, &[], None).await
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> AppResult<T> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<T: DeserializeOwned>(&self, path: &str, body: Value) -> AppResult<T> {
        self.request(Method::POST, path, &[], Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> AppResult<()> {
        self.execute(Method::DELETE, path, &[], None).await.map(|_| ())
    }

    /// Multipart POST. Like [`request_optional`](Self::request_optional), an
    /// empty or non-resource reply yields `None`.
    pub async fn post_multipart<T>(
        &self,
        path: &str,
        fields: Vec<(String, String)>,
        files: Vec<MultipartPart>,
    ) -> AppResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making multipart POST request to {} with {} file(s)", url, files.len());

        let mut form = Form::new();
        for (name, value) in fields {
            form = form.text(name, value);
        }
        for file in files {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|e| AppError::ValidationError(format!("Invalid content type: {}", e)))?;
            form = form.part(file.field, part);
        }

        let response = self
            .client
            .post(&url)
            .headers(self.get_headers(false)?)
            .multipart(form)
            .send()
            .await
            .map_err(transport_error)?;

        let text = read_body(response).await?;
        Ok(decode_optional(path, &text))
    }
}

fn decode_optional<T: DeserializeOwned>(path: &str, text: &str) -> Option<T> {
    if text.trim().is_empty() {
        return None;
    }

    match serde_json::from_str::<T>(text) {
        Ok(data) => Some(data),
        Err(e) => {
            debug!("Response from {} is not a resource ({}), treating as empty success", path, e);
            None
        }
    }
}

async fn read_body(response: reqwest::Response) -> AppResult<String> {
    let status = response.status();
    let text = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        error!("API error ({}): {}", status, text);
        return Err(status_error(status, &text));
    }

    Ok(text)
}

fn transport_error(err: reqwest::Error) -> AppError {
    if err.is_timeout() {
        AppError::Network(format!("Request timed out: {}", err))
    } else if err.is_connect() {
        AppError::Network(format!("Connection failed: {}", err))
    } else if err.is_decode() {
        AppError::Internal(format!("Invalid response: {}", err))
    } else {
        AppError::Network(err.to_string())
    }
}

/// Maps a non-2xx reply onto the error taxonomy, preferring the server's own
/// `message` (or `error`) field when the body is JSON.
pub fn status_error(status: StatusCode, body: &str) -> AppError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            json.get("message")
                .or_else(|| json.get("error"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status.as_u16() {
        401 => AppError::Auth(message),
        403 => AppError::Forbidden(message),
        404 => AppError::NotFound(message),
        code => AppError::ServerRejected {
            status: code,
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_error_uses_json_message() {
        let err = status_error(StatusCode::BAD_REQUEST, r#"{"message":"Date invalide"}"#);
        assert_eq!(
            err,
            AppError::ServerRejected {
                status: 400,
                message: "Date invalide".to_string()
            }
        );
    }

    #[test]
    fn test_status_error_falls_back_to_text() {
        let err = status_error(StatusCode::NOT_FOUND, "no such visit\n");
        assert_eq!(err, AppError::NotFound("no such visit".to_string()));
    }

    #[test]
    fn test_permission_and_credential_failures_stay_distinct() {
        let err = status_error(StatusCode::FORBIDDEN, r#"{"error":"forbidden"}"#);
        assert_eq!(err, AppError::Forbidden("forbidden".to_string()));

        let err = status_error(StatusCode::UNAUTHORIZED, r#"{"message":"jwt expired"}"#);
        assert_eq!(err, AppError::Auth("jwt expired".to_string()));
    }
}
