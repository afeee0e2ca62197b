use anyhow::{anyhow, Context, Result};
use galeria::routes::{join, status_path, CSRF_HEADER, SUBMIT_PATH};
use galeria::{ClientConfig, StatusSnapshot, SubmitResponse};
use reqwest::header::{HeaderMap, HeaderValue, COOKIE};
use serde::de::DeserializeOwned;
use tracing::debug;

/// HTTP access to the optimization server. Cookies set by the server are kept
/// for the lifetime of the client, like a browser session.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, session_cookie: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        if let Some(cookie) = session_cookie {
            headers.insert(
                COOKIE,
                HeaderValue::from_str(cookie).context("invalid session cookie")?,
            );
        }
        let mut builder = reqwest::Client::builder()
            .cookie_store(true)
            .default_headers(headers);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn url(&self, path: &str) -> String {
        join(&self.base_url, path)
    }

    /// Post the form to the processing endpoint. The body is parsed even on
    /// error statuses since rejections carry a JSON message.
    pub async fn submit(
        &self,
        form: &[(String, String)],
        csrf_token: Option<&str>,
    ) -> Result<SubmitResponse> {
        let url = self.url(SUBMIT_PATH);
        let mut request = self.http.post(&url).form(form);
        if let Some(token) = csrf_token {
            request = request.header(CSRF_HEADER, token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;
        read_json(response).await
    }

    pub async fn status(&self, thread_id: &str) -> Result<StatusSnapshot> {
        let url = self.url(&status_path(thread_id));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .with_context(|| format!("GET {url} failed"))?;
        read_json(response).await
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await.context("failed to read response body")?;
    debug!(%status, bytes = body.len(), "response received");
    serde_json::from_str(&body).map_err(|err| {
        anyhow!("server replied {status} with a non-JSON body ({err})")
    })
}
