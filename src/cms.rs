//! 采集站 (CMS) 客户端
//! 兼容通用 `ac=videolist` 接口, 将各站点返回的数据转换为统一的 `CanonicalRecord`

use crate::http_client::{HttpClient, HttpClientError};
use crate::types::{CanonicalRecord, PlaySource, SiteDescriptor};
use async_trait::async_trait;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// 多条线路之间的分隔符
const SOURCE_SEPARATOR: &str = "$$$";
/// 同一线路内剧集之间的分隔符
const EPISODE_SEPARATOR: char = '#';
/// 剧集标题与地址之间的分隔符
const TITLE_SEPARATOR: char = '$';

#[derive(Debug, Error)]
pub enum CmsError {
    #[error("站点不可用: {0}")]
    SiteUnavailable(String),
    #[error("响应格式异常: {0}")]
    MalformedResponse(String),
}

impl From<HttpClientError> for CmsError {
    fn from(e: HttpClientError) -> Self {
        CmsError::SiteUnavailable(e.to_string())
    }
}

/// 影片数据来源
///
/// `try_*` 方法返回明确的错误; 对应的无前缀方法记录日志后
/// 退化为空结果, 单个站点的异常不会传递给调用方。
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn try_list(
        &self,
        site: &SiteDescriptor,
        page: u32,
        type_id: Option<&str>,
    ) -> Result<Vec<CanonicalRecord>, CmsError>;

    async fn try_search(
        &self,
        site: &SiteDescriptor,
        keyword: &str,
    ) -> Result<Vec<CanonicalRecord>, CmsError>;

    async fn try_detail(
        &self,
        site: &SiteDescriptor,
        id: &str,
    ) -> Result<Option<CanonicalRecord>, CmsError>;

    /// 单个站点请求的等待上限
    fn timeout(&self) -> Duration {
        Duration::from_secs(crate::http_client::DEFAULT_TIMEOUT_SECONDS)
    }

    /// 获取分页列表
    async fn fetch_list(
        &self,
        site: &SiteDescriptor,
        page: u32,
        type_id: Option<&str>,
    ) -> Vec<CanonicalRecord> {
        match self.try_list(site, page, type_id).await {
            Ok(items) => items,
            Err(e) => {
                warn!("站点 {} 获取列表失败: {}", site.name, e);
                vec![]
            }
        }
    }

    /// 关键词搜索
    async fn search(&self, site: &SiteDescriptor, keyword: &str) -> Vec<CanonicalRecord> {
        match self.try_search(site, keyword).await {
            Ok(items) => items,
            Err(e) => {
                warn!("站点 {} 搜索失败: {}", site.name, e);
                vec![]
            }
        }
    }

    /// 获取详情
    async fn get_detail(&self, site: &SiteDescriptor, id: &str) -> Option<CanonicalRecord> {
        match self.try_detail(site, id).await {
            Ok(item) => item,
            Err(e) => {
                warn!("站点 {} 获取详情 {} 失败: {}", site.name, id, e);
                None
            }
        }
    }
}

/// 基于 HTTP 的采集站客户端
#[derive(Debug, Clone)]
pub struct CmsClient {
    http: HttpClient,
}

impl CmsClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    async fn fetch(
        &self,
        site: &SiteDescriptor,
        url: &str,
    ) -> Result<Vec<CanonicalRecord>, CmsError> {
        debug!("请求 URL: {}", url);
        let body = self.http.get_text(url).await?;
        let items = parse_cms_payload(&body, site)?;
        debug!("站点 {} 返回 {} 条记录", site.name, items.len());
        Ok(items)
    }
}

#[async_trait]
impl CatalogSource for CmsClient {
    async fn try_list(
        &self,
        site: &SiteDescriptor,
        page: u32,
        type_id: Option<&str>,
    ) -> Result<Vec<CanonicalRecord>, CmsError> {
        self.fetch(site, &list_url(site, page, type_id)).await
    }

    async fn try_search(
        &self,
        site: &SiteDescriptor,
        keyword: &str,
    ) -> Result<Vec<CanonicalRecord>, CmsError> {
        self.fetch(site, &search_url(site, keyword)).await
    }

    async fn try_detail(
        &self,
        site: &SiteDescriptor,
        id: &str,
    ) -> Result<Option<CanonicalRecord>, CmsError> {
        let items = self.fetch(site, &detail_url(site, id)).await?;
        Ok(items.into_iter().next())
    }

    fn timeout(&self) -> Duration {
        self.http.timeout()
    }
}

pub fn list_url(site: &SiteDescriptor, page: u32, type_id: Option<&str>) -> String {
    match type_id.filter(|t| !t.is_empty()) {
        Some(t) => format!("{}?ac=videolist&pg={}&t={}", site.api, page, urlencoding::encode(t)),
        None => format!("{}?ac=videolist&pg={}", site.api, page),
    }
}

pub fn search_url(site: &SiteDescriptor, keyword: &str) -> String {
    format!("{}?ac=videolist&wd={}", site.api, urlencoding::encode(keyword))
}

pub fn detail_url(site: &SiteDescriptor, id: &str) -> String {
    format!("{}?ac=videolist&ids={}", site.api, urlencoding::encode(id))
}

#[derive(Debug, Deserialize)]
struct CmsResponse {
    list: Vec<CmsItem>,
}

#[derive(Debug, Deserialize)]
struct CmsItem {
    #[serde(default, deserialize_with = "lenient_string")]
    vod_id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_pic: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_year: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_class: String,
    #[serde(default, deserialize_with = "lenient_string")]
    type_name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_content: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_play_from: String,
    #[serde(default, deserialize_with = "lenient_string")]
    vod_play_url: String,
}

/// 字符串 / 数字 / null 均可, 其它类型视为格式错误
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(String::new()),
        Some(Value::String(s)) => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, found {}",
            other
        ))),
    }
}

/// 解析采集站响应
pub fn parse_cms_payload(
    body: &str,
    site: &SiteDescriptor,
) -> Result<Vec<CanonicalRecord>, CmsError> {
    let response: CmsResponse =
        serde_json::from_str(body).map_err(|e| CmsError::MalformedResponse(e.to_string()))?;

    Ok(response
        .list
        .into_iter()
        .map(|item| normalize_item(item, site))
        .collect())
}

fn normalize_item(item: CmsItem, site: &SiteDescriptor) -> CanonicalRecord {
    let play_sources = parse_play_sources(&item.vod_play_from, &item.vod_play_url);

    let (episodes, episode_titles) = play_sources
        .first()
        .map(|s| (s.episodes.clone(), s.episode_titles.clone()))
        .unwrap_or_default();

    CanonicalRecord {
        id: item.vod_id,
        title: item.vod_name,
        poster: item.vod_pic,
        source: site.key.clone(),
        source_name: site.name.clone(),
        year: item.vod_year,
        class: item.vod_class,
        type_name: item.type_name,
        desc: item.vod_content,
        play_sources,
        episodes,
        episode_titles,
    }
}

/// 解析 `vod_play_from` / `vod_play_url` 两个并列字段
///
/// 线路之间以 `$$$` 分隔, 剧集之间以 `#` 分隔,
/// 单集可写成 `标题$地址` 或直接写地址。地址为空的剧集保留在线路中,
/// 一个有效地址都没有的线路会被丢弃。
pub fn parse_play_sources(play_from: &str, play_url: &str) -> Vec<PlaySource> {
    if play_from.is_empty() {
        return vec![];
    }

    let payloads: Vec<&str> = play_url.split(SOURCE_SEPARATOR).collect();

    play_from
        .split(SOURCE_SEPARATOR)
        .enumerate()
        .filter_map(|(index, name)| {
            let payload = payloads.get(index).copied().unwrap_or("");
            let (episode_titles, episodes): (Vec<String>, Vec<String>) = payload
                .split(EPISODE_SEPARATOR)
                .map(parse_episode)
                .unzip();

            if !episodes.iter().any(|url| !url.trim().is_empty()) {
                return None;
            }

            Some(PlaySource {
                name: name.to_string(),
                episodes,
                episode_titles,
            })
        })
        .collect()
}

/// 返回 (标题, 地址)
fn parse_episode(entry: &str) -> (String, String) {
    let (title, url) = match entry.split_once(TITLE_SEPARATOR) {
        Some((title, rest)) => (title, rest.split(TITLE_SEPARATOR).next().unwrap_or(rest)),
        None => ("", entry),
    };
    (title.to_string(), url.to_string())
}
