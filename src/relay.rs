//! 通用跨域代理
//! `/proxy?url=目标地址`, 服务端转发请求并在响应中加入宽松的 CORS 头

use crate::douban::{DOUBAN_REFERER, DOUBAN_USER_AGENT};
use crate::http_client::HttpClientError;
use crate::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const FALLBACK_USER_AGENT: &str = "Mozilla/5.0 MixTV/1.0";
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// 建立连接的等待上限
const RELAY_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// 两次读取之间的最长间隔; 不限制总时长, 大文件可以持续传输
const RELAY_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

const USAGE: &str = "MixTV 通用跨域代理\n使用说明: /proxy?url=https://api.example.com/data";

#[derive(Debug, Deserialize)]
pub struct ProxyQuery {
    pub url: Option<String>,
}

/// 代理专用客户端: 不解压, 不设总超时
pub fn relay_client() -> Result<Client, HttpClientError> {
    Client::builder()
        .connect_timeout(RELAY_CONNECT_TIMEOUT)
        .read_timeout(RELAY_IDLE_TIMEOUT)
        .no_gzip()
        .no_brotli()
        .build()
        .map_err(|e| HttpClientError::Build(e.to_string()))
}

/// ANY /proxy
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<ProxyQuery>,
    body: Bytes,
) -> Response {
    if method == Method::OPTIONS {
        return preflight();
    }

    let target = match query.url.filter(|u| !u.is_empty()) {
        Some(url) => url,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                USAGE,
            )
                .into_response();
        }
    };
    if let Err(e) = Url::parse(&target) {
        return (
            StatusCode::BAD_REQUEST,
            [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
            format!("无效的目标地址: {}", e),
        )
            .into_response();
    }

    debug!("代理请求: {} {}", method, target);

    let mut request = state
        .relay
        .request(method.clone(), &target)
        .headers(forward_headers(&headers, &target));

    if method != Method::GET && method != Method::HEAD {
        request = request.body(body);
    }

    let upstream = match request.send().await {
        Ok(response) => response,
        Err(e) => return failure(&target, e),
    };

    let status = upstream.status();
    let mut response_headers = upstream.headers().clone();

    for name in [
        header::CONTENT_SECURITY_POLICY,
        header::X_FRAME_OPTIONS,
        header::TRANSFER_ENCODING,
        header::CONNECTION,
        header::CONTENT_LENGTH,
    ] {
        response_headers.remove(name);
    }
    apply_cors(&mut response_headers);
    response_headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("*"),
    );

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = response_headers;
    response
}

fn preflight() -> Response {
    let mut headers = HeaderMap::new();
    apply_cors(&mut headers);
    headers.insert(
        header::ACCESS_CONTROL_MAX_AGE,
        HeaderValue::from_static("86400"),
    );
    (StatusCode::OK, headers).into_response()
}

fn failure(target: &str, e: reqwest::Error) -> Response {
    warn!("代理请求失败 {}: {}", target, e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        [(header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")],
        format!("代理请求失败: {}", e),
    )
        .into_response()
}

fn apply_cors(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOW_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("*"),
    );
}

pub fn is_douban(target: &str) -> bool {
    match Url::parse(target).ok().as_ref().and_then(Url::host_str) {
        Some(host) => ["douban.com", "doubanio.com"]
            .iter()
            .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain))),
        None => false,
    }
}

/// 构造转发请求头: 去掉 host / origin / referer,
/// 豆瓣请求使用固定的 Referer 与 User-Agent
pub fn forward_headers(incoming: &HeaderMap, target: &str) -> HeaderMap {
    let mut headers = incoming.clone();

    let stripped: [HeaderName; 5] = [
        header::HOST,
        header::ORIGIN,
        header::REFERER,
        header::CONTENT_LENGTH,
        header::ACCEPT_ENCODING,
    ];
    for name in stripped {
        headers.remove(name);
    }

    if is_douban(target) {
        headers.insert(header::REFERER, HeaderValue::from_static(DOUBAN_REFERER));
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(DOUBAN_USER_AGENT),
        );
    } else if !headers.contains_key(header::USER_AGENT) {
        headers.insert(
            header::USER_AGENT,
            HeaderValue::from_static(FALLBACK_USER_AGENT),
        );
    }

    headers
}
