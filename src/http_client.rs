use reqwest::{Client, Response};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 15;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/138.0.0.0 Safari/537.36 (MixTV)";

#[derive(Debug, Error)]
pub enum HttpClientError {
    #[error("请求超时")]
    Timeout,
    #[error("请求失败: {0}")]
    RequestFailed(String),
    #[error("响应异常状态码: {0}")]
    BadStatus(u16),
    #[error("创建 HTTP 客户端失败: {0}")]
    Build(String),
}

impl From<reqwest::Error> for HttpClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpClientError::Timeout
        } else {
            HttpClientError::RequestFailed(e.to_string())
        }
    }
}

/// 共享 HTTP 客户端
///
/// 每个请求都有固定的超时上限; 配置了代理前缀时,
/// 目标地址会被编码后拼接到前缀之后再发出。
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    proxy: Option<String>,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, proxy: Option<String>) -> Result<Self, HttpClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| HttpClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            proxy: proxy.filter(|p| !p.is_empty()),
            timeout,
        })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// 套用代理前缀后的最终请求地址
    pub fn proxied_url(&self, url: &str) -> String {
        proxied_url(self.proxy.as_deref(), url)
    }

    async fn send(&self, url: &str, referer: Option<&str>) -> Result<Response, HttpClientError> {
        let mut request = self
            .client
            .get(url)
            .header("Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8")
            .header("Connection", "keep-alive");

        if let Some(r) = referer {
            request = request.header("Referer", r);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(HttpClientError::BadStatus(response.status().as_u16()));
        }

        Ok(response)
    }

    /// GET 请求 (经由采集站代理)
    pub async fn get(&self, url: &str) -> Result<Response, HttpClientError> {
        self.send(&self.proxied_url(url), None).await
    }

    /// GET 请求并返回文本
    pub async fn get_text(&self, url: &str) -> Result<String, HttpClientError> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    /// 直接请求, 不套用采集站代理
    pub async fn get_direct_text(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<String, HttpClientError> {
        let response = self.send(url, referer).await?;
        Ok(response.text().await?)
    }
}

/// `{proxy}{encodeURIComponent(url)}`, 无代理时原样返回
pub fn proxied_url(proxy: Option<&str>, url: &str) -> String {
    match proxy {
        Some(prefix) if !prefix.is_empty() => format!("{}{}", prefix, urlencoding::encode(url)),
        _ => url.to_string(),
    }
}
