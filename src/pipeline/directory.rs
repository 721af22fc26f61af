use crate::error::{MirrorError, Result};
use crate::traits::DirectorySource;
use crate::types::DirectoryStatus;
use async_trait::async_trait;
use reqwest::Client;

/// Directory client backed by the mirror status JSON endpoint
pub struct HttpDirectory {
    client: Client,
    endpoint: String,
}

impl HttpDirectory {
    pub fn new(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

#[async_trait]
impl DirectorySource for HttpDirectory {
    async fn fetch_directory(&self) -> Result<DirectoryStatus> {
        let url = self.endpoint.as_str();
        tracing::debug!("fetching mirror directory from {}", url);

        let transport = |source| MirrorError::Transport {
            url: url.to_string(),
            source,
        };

        let resp = self.client.get(url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(MirrorError::Status {
                url: url.to_string(),
                status,
            });
        }

        // Read fully first so a broken connection is reported as transport,
        // and only a bad payload as decode.
        let body = resp.bytes().await.map_err(transport)?;
        let directory: DirectoryStatus =
            serde_json::from_slice(&body).map_err(|source| MirrorError::Decode {
                url: url.to_string(),
                source,
            })?;

        tracing::debug!(
            "directory v{} checked at {} ({} checks every {}s, cutoff {}s) lists {} mirrors",
            directory.version,
            directory.last_check,
            directory.num_checks,
            directory.check_frequency,
            directory.cutoff,
            directory.candidates.len()
        );
        Ok(directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{
        "cutoff": 3600, "check_frequency": 300, "num_checks": 12,
        "last_check": "2024-05-01T10:00:00Z", "version": 3,
        "urls": [
            {"protocol": "http", "url": "http://a.example/", "country": "Sweden",
             "country_code": "SE", "last_sync": "2024-05-01T09:00:00Z", "delay": 60,
             "score": 0.8, "completion_pct": 1.0, "duration_stddev": 0.1, "duration_avg": 0.3}
        ]
    }"#;

    async fn server_with(template: ResponseTemplate) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mirrors/status/json/"))
            .respond_with(template)
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn directory_for(server: &MockServer) -> HttpDirectory {
        HttpDirectory::new(
            Client::new(),
            &format!("{}/mirrors/status/json/", server.uri()),
        )
    }

    #[tokio::test]
    async fn decodes_directory() -> Result<()> {
        let server = server_with(ResponseTemplate::new(200).set_body_string(BODY)).await;
        let status = directory_for(&server).fetch_directory().await?;
        assert_eq!(status.num_checks, 12);
        assert_eq!(status.candidates.len(), 1);
        assert_eq!(status.candidates[0].address, "http://a.example/");
        Ok(())
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let server = server_with(ResponseTemplate::new(200).set_body_string("{\"urls\": ")).await;
        let err = directory_for(&server).fetch_directory().await.unwrap_err();
        assert!(matches!(err, MirrorError::Decode { .. }));
        assert!(!err.is_transport());
    }

    #[tokio::test]
    async fn server_error_is_reported() {
        let server = server_with(ResponseTemplate::new(503)).await;
        let err = directory_for(&server).fetch_directory().await.unwrap_err();
        assert!(matches!(err, MirrorError::Status { .. }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_transport_error() {
        let directory = HttpDirectory::new(Client::new(), &crate::utils::closed_port_url());
        let err = directory.fetch_directory().await.unwrap_err();
        assert!(matches!(err, MirrorError::Transport { .. }));
        assert!(err.is_transport());
    }
}
