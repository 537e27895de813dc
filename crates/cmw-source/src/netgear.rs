use crate::parse::{extract_web_token, StatusPageParser};
use crate::{DeviceStatus, SnapshotSource, SourceError};
use cmw_config::{DeviceConfig, DevicePassword};
use std::fmt;
use std::time::Duration;
use tracing::debug;

const LOGIN_PAGE: &str = "/GenieLogin.asp";
const LOGIN_FORM: &str = "/goform/GenieLogin";
const STATUS_PAGE: &str = "/DocsisStatus.asp";

/// Netgear CM-series status page source.
///
/// Each fetch runs the full handshake: GET the login page for its `webToken`,
/// POST the credentials, then GET the DOCSIS status page with the session
/// cookie. The password is never logged.
pub struct NetgearSource {
    base_url: String,
    username: String,
    password: DevicePassword,
    http: reqwest::Client,
    parser: StatusPageParser,
}

impl fmt::Debug for NetgearSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetgearSource")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password)
            .finish()
    }
}

fn transport(e: reqwest::Error) -> SourceError {
    SourceError::Transport(e.to_string())
}

impl NetgearSource {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: DevicePassword,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(timeout)
            .build()
            .map_err(transport)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password,
            http,
            parser: StatusPageParser::new()?,
        })
    }

    pub fn from_config(device: &DeviceConfig, password: DevicePassword) -> Result<Self, SourceError> {
        Self::new(
            device.base_url.clone(),
            device.username.clone(),
            password,
            Duration::from_secs(device.request_timeout_secs),
        )
    }

    /// Replace the page parser (e.g. to pin the device clock's offset).
    pub fn with_parser(mut self, parser: StatusPageParser) -> Self {
        self.parser = parser;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_text(&self, path: &str) -> Result<String, SourceError> {
        let url = self.url(path);
        let resp = self.http.get(&url).send().await.map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url,
            });
        }
        resp.text().await.map_err(transport)
    }

    async fn login(&self) -> Result<(), SourceError> {
        let page = self.get_text(LOGIN_PAGE).await?;
        let token = extract_web_token(&page)
            .ok_or_else(|| SourceError::Login("webToken not found on login page".to_string()))?;

        let url = self.url(LOGIN_FORM);
        let form = [
            ("loginUsername", self.username.as_str()),
            ("loginPassword", self.password.expose()),
            ("login", "1"),
            ("webToken", token.as_str()),
        ];
        let resp = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        // The form answers with a redirect or a small page; only hard failures matter.
        if status.is_client_error() || status.is_server_error() {
            return Err(SourceError::Http {
                status: status.as_u16(),
                url,
            });
        }
        debug!(base_url = %self.base_url, "login form accepted");
        Ok(())
    }
}

#[async_trait::async_trait]
impl SnapshotSource for NetgearSource {
    fn name(&self) -> &str {
        "netgear"
    }

    async fn fetch_status(&self) -> Result<DeviceStatus, SourceError> {
        self.login().await?;
        let page = self.get_text(STATUS_PAGE).await?;
        match self.parser.parse(&page) {
            Ok(status) => Ok(status),
            // Rejected credentials bounce back to the login form.
            Err(_) if extract_web_token(&page).is_some() => Err(SourceError::Login(
                "status page returned the login form; credentials rejected".to_string(),
            )),
            Err(e) => Err(e),
        }
    }
}
