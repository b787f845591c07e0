use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};

use super::HttpError;
use super::types::{ResourceBody, ResourceList, error_message};

#[derive(Clone)]
pub struct StateApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl StateApiClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self, HttpError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token {
            let header_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| HttpError::InvalidToken)?;
            headers.insert(AUTHORIZATION, header_value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(HttpError::Network)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn api_base(&self) -> &str {
        &self.base_url
    }

    /// Lists every resource id, following `next` cursors until exhausted.
    pub async fn list_resources(&self) -> Result<Vec<String>, HttpError> {
        let mut all_ids = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let url = match &cursor {
                Some(c) => format!("{}/resources?cursor={}", self.base_url, urlencoding::encode(c)),
                None => format!("{}/resources", self.base_url),
            };

            let response = self.client.get(&url).send().await?;
            let body = Self::read_body(response).await?;
            let page: ResourceList = serde_json::from_value(body).map_err(|e| HttpError::Api {
                status: 200,
                message: format!("Failed to parse resource list: {}", e),
            })?;

            all_ids.extend(page.resources);

            match page.next.filter(|c| !c.is_empty()) {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        Ok(all_ids)
    }

    /// Fetches one resource's attributes; `None` when the API answers 404.
    pub async fn fetch_resource(
        &self,
        resource_id: &str,
    ) -> Result<Option<serde_json::Value>, HttpError> {
        let url = format!(
            "{}/resources/{}",
            self.base_url,
            urlencoding::encode(resource_id)
        );

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body = Self::read_body(response).await?;
        let body: ResourceBody = serde_json::from_value(body).map_err(|e| HttpError::Api {
            status: 200,
            message: format!("Failed to parse resource: {}", e),
        })?;

        Ok(Some(body.resource))
    }

    async fn read_body(response: reqwest::Response) -> Result<serde_json::Value, HttpError> {
        let status = response.status();
        let body: serde_json::Value = response.json().await.map_err(|e| HttpError::Api {
            status: status.as_u16(),
            message: format!("Failed to parse response: {}", e),
        })?;

        if status.is_success() {
            return Ok(body);
        }

        let message = error_message(&body).unwrap_or_else(|| "Unknown error".to_string());
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(HttpError::Auth { message });
        }
        Err(HttpError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

impl std::fmt::Debug for StateApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateApiClient")
            .field("base_url", &self.base_url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = StateApiClient::new("https://state.example.com/", Some("test_token"));
        assert!(client.is_ok());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = StateApiClient::new("https://state.example.com/v1/", None).unwrap();
        assert_eq!(client.api_base(), "https://state.example.com/v1");
    }

    #[test]
    fn test_debug_does_not_expose_token() {
        let client =
            StateApiClient::new("https://state.example.com", Some("super_secret_token_12345"))
                .unwrap();
        let debug_output = format!("{:?}", client);

        assert!(debug_output.contains("[REDACTED]"));
        assert!(
            !debug_output.contains("super_secret_token_12345"),
            "Debug output must NOT contain the actual token"
        );
    }

    #[test]
    fn test_invalid_token_rejected() {
        let result = StateApiClient::new("https://state.example.com", Some("bad\ntoken"));
        assert!(matches!(result, Err(HttpError::InvalidToken)));
    }
}
