//! HTTP implementation of [`MaasApi`]

use async_trait::async_trait;
use log::debug;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::api::MaasApi;
use crate::auth::ApiKey;
use crate::config::ClientConfig;
use crate::entity::{
    BootSource, BootSourceParams, BootSourceSelection, BootSourceSelectionParams, Form,
};
use crate::error::{ClientError, ClientResult};

/// MAAS API client speaking OAuth1-signed HTTP
pub struct MaasClient {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
}

impl MaasClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let api_key: ApiKey = config.api_key.parse()?;
        let http = reqwest::Client::builder()
            .user_agent(concat!("maasform/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            api_key,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, self.api_key.authorization_header())
            .header(ACCEPT, "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> ClientResult<Vec<u8>> {
        let request = builder.build()?;
        debug!("{} {}", request.method(), request.url());

        let response = self.http.execute(request).await?;
        let status = response.status();
        let body = response.bytes().await?;
        check_status(status, &body)?;
        Ok(body.to_vec())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ClientResult<T> {
        let body = self.send(self.request(Method::GET, path)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn submit<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        form: &Form,
    ) -> ClientResult<T> {
        let body = self.send(self.request(method, path).form(form)).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.send(self.request(Method::DELETE, path)).await?;
        Ok(())
    }
}

fn boot_source_path(id: i64) -> String {
    format!("boot-sources/{}/", id)
}

fn selections_path(boot_source: i64) -> String {
    format!("boot-sources/{}/selections/", boot_source)
}

fn selection_path(boot_source: i64, id: i64) -> String {
    format!("boot-sources/{}/selections/{}/", boot_source, id)
}

/// Map a response status onto the client error taxonomy
fn check_status(status: StatusCode, body: &[u8]) -> ClientResult<()> {
    if status.is_success() {
        return Ok(());
    }

    let message = String::from_utf8_lossy(body).trim().to_string();
    let message = if message.is_empty() {
        status.to_string()
    } else {
        message
    };

    if status == StatusCode::NOT_FOUND {
        Err(ClientError::NotFound(message))
    } else {
        Err(ClientError::rejected(status.as_u16(), message))
    }
}

#[async_trait]
impl MaasApi for MaasClient {
    async fn boot_sources(&self) -> ClientResult<Vec<BootSource>> {
        self.get("boot-sources/").await
    }

    async fn boot_source(&self, id: i64) -> ClientResult<BootSource> {
        self.get(&boot_source_path(id)).await
    }

    async fn create_boot_source(&self, params: &BootSourceParams) -> ClientResult<BootSource> {
        self.submit(Method::POST, "boot-sources/", &params.to_form())
            .await
    }

    async fn update_boot_source(
        &self,
        id: i64,
        params: &BootSourceParams,
    ) -> ClientResult<BootSource> {
        self.submit(Method::PUT, &boot_source_path(id), &params.to_form())
            .await
    }

    async fn delete_boot_source(&self, id: i64) -> ClientResult<()> {
        self.delete(&boot_source_path(id)).await
    }

    async fn boot_source_selections(
        &self,
        boot_source: i64,
    ) -> ClientResult<Vec<BootSourceSelection>> {
        self.get(&selections_path(boot_source)).await
    }

    async fn boot_source_selection(
        &self,
        boot_source: i64,
        id: i64,
    ) -> ClientResult<BootSourceSelection> {
        self.get(&selection_path(boot_source, id)).await
    }

    async fn create_boot_source_selection(
        &self,
        boot_source: i64,
        params: &BootSourceSelectionParams,
    ) -> ClientResult<BootSourceSelection> {
        self.submit(Method::POST, &selections_path(boot_source), &params.to_form())
            .await
    }

    async fn update_boot_source_selection(
        &self,
        boot_source: i64,
        id: i64,
        params: &BootSourceSelectionParams,
    ) -> ClientResult<BootSourceSelection> {
        self.submit(
            Method::PUT,
            &selection_path(boot_source, id),
            &params.to_form(),
        )
        .await
    }

    async fn delete_boot_source_selection(&self, boot_source: i64, id: i64) -> ClientResult<()> {
        self.delete(&selection_path(boot_source, id)).await
    }

    async fn get_config(&self, name: &str) -> ClientResult<Vec<u8>> {
        let builder = self
            .request(Method::GET, "maas/")
            .query(&[("op", "get_config"), ("name", name)]);
        self.send(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_404_is_not_found() {
        let err = check_status(StatusCode::NOT_FOUND, b"No BootSourceSelection matches")
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "not found: No BootSourceSelection matches");
    }

    #[test]
    fn other_failures_are_rejected() {
        let err = check_status(StatusCode::BAD_REQUEST, b"{\"os\": [\"required\"]}").unwrap_err();
        assert!(matches!(err, ClientError::Rejected { status: 400, .. }));

        let err = check_status(StatusCode::FORBIDDEN, b"").unwrap_err();
        match err {
            ClientError::Rejected { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "403 Forbidden");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn success_passes() {
        assert!(check_status(StatusCode::OK, b"{}").is_ok());
        assert!(check_status(StatusCode::NO_CONTENT, b"").is_ok());
    }

    #[test]
    fn paths_end_with_slash() {
        assert_eq!(boot_source_path(1), "boot-sources/1/");
        assert_eq!(selections_path(1), "boot-sources/1/selections/");
        assert_eq!(selection_path(1, 7), "boot-sources/1/selections/7/");
    }

    #[test]
    fn new_rejects_bad_api_key() {
        let config = ClientConfig::new("http://maas:5240/MAAS", "not-a-key");
        assert!(matches!(
            MaasClient::new(&config),
            Err(ClientError::Config(_))
        ));
    }

    #[test]
    fn requests_are_signed() {
        let config = ClientConfig::new("http://maas:5240/MAAS", "ck:tk:ts");
        let client = MaasClient::new(&config).unwrap();
        let request = client
            .request(Method::GET, &selection_path(1, 2))
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "http://maas:5240/MAAS/api/2.0/boot-sources/1/selections/2/"
        );
        let auth = request.headers()[AUTHORIZATION].to_str().unwrap();
        assert!(auth.starts_with("OAuth "));
        assert!(auth.contains("oauth_signature=\"&ts\""));
    }
}
