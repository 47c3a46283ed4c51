//! 豆瓣影视推荐
//! 支持直连豆瓣或经由 cmliussss 镜像访问, 所有请求失败时返回空列表

use crate::cms::lenient_string;
use crate::http_client::{proxied_url, HttpClient, HttpClientError};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use url::form_urlencoded;

pub const DOUBAN_REFERER: &str = "https://movie.douban.com/";
pub const DOUBAN_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const PAGE_SIZE: u32 = 24;

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").expect("valid regex"));

#[derive(Debug, Error)]
pub enum DoubanError {
    #[error(transparent)]
    Unavailable(#[from] HttpClientError),
    #[error("响应格式异常: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// 豆瓣访问方式
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DoubanMirror {
    /// 腾讯云镜像 (douban.cmliussss.net)
    #[default]
    Tencent,
    /// 阿里云镜像 (douban.cmliussss.com)
    Aliyun,
    /// 直连 douban.com
    Direct,
    /// 直连 douban.com, 请求经由自定义代理前缀
    Custom(String),
}

impl DoubanMirror {
    /// `tencent-cmlius` / `aliyun-cmlius` / `none` / `custom`; 未识别时使用腾讯云镜像
    pub fn from_setting(kind: Option<&str>, proxy: Option<String>) -> Self {
        match kind {
            Some("aliyun-cmlius") => DoubanMirror::Aliyun,
            Some("none") | Some("direct") => DoubanMirror::Direct,
            Some("custom") => match proxy.filter(|p| !p.is_empty()) {
                Some(prefix) => DoubanMirror::Custom(prefix),
                None => DoubanMirror::Direct,
            },
            _ => DoubanMirror::Tencent,
        }
    }

    fn base(&self, subdomain: &str) -> String {
        match self {
            DoubanMirror::Tencent => format!("https://{}.douban.cmliussss.net", subdomain),
            DoubanMirror::Aliyun => format!("https://{}.douban.cmliussss.com", subdomain),
            DoubanMirror::Direct | DoubanMirror::Custom(_) => {
                format!("https://{}.douban.com", subdomain)
            }
        }
    }

    fn proxy(&self) -> Option<&str> {
        match self {
            DoubanMirror::Custom(prefix) => Some(prefix.as_str()),
            _ => None,
        }
    }

    /// 海报地址; 腾讯云镜像下改写 doubanio 图片域名
    pub fn image_url(&self, url: &str) -> String {
        match self {
            DoubanMirror::Tencent => url
                .replace("img1.doubanio.com", "img1.douban.cmliussss.net")
                .replace("img3.doubanio.com", "img3.douban.cmliussss.net"),
            _ => url.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoubanKind {
    Movie,
    Tv,
    Show,
}

impl DoubanKind {
    /// 接口路径中的类型, 综艺归入剧集
    fn path(self) -> &'static str {
        match self {
            DoubanKind::Movie => "movie",
            DoubanKind::Tv | DoubanKind::Show => "tv",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoubanSubject {
    pub id: String,
    pub title: String,
    pub rate: String,
    pub cover: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

/// 推荐筛选条件, "all" 或空表示不限
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendFilters {
    #[serde(default, rename = "type")]
    pub genre: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub year: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
}

fn selected(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty() && *v != "all")
}

#[derive(Debug, Deserialize)]
struct SubjectsResponse {
    #[serde(default)]
    subjects: Vec<RawSubject>,
}

#[derive(Debug, Deserialize)]
struct RawSubject {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    rate: String,
    #[serde(default, deserialize_with = "lenient_string")]
    cover: String,
    #[serde(default, deserialize_with = "lenient_string")]
    url: String,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<RexxarItem>,
}

#[derive(Debug, Deserialize)]
struct RexxarItem {
    #[serde(default, deserialize_with = "lenient_string")]
    id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    title: String,
    #[serde(default)]
    rating: Option<Rating>,
    #[serde(default)]
    pic: Option<Pic>,
    #[serde(default, deserialize_with = "lenient_string")]
    card_subtitle: String,
    #[serde(default, deserialize_with = "lenient_string")]
    year: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Rating {
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Pic {
    #[serde(default, deserialize_with = "lenient_string")]
    normal: String,
    #[serde(default, deserialize_with = "lenient_string")]
    large: String,
}

impl RexxarItem {
    fn into_subject(self, year: Option<String>) -> DoubanSubject {
        let rate = self
            .rating
            .and_then(|r| r.value)
            .map(|v| format!("{:.1}", v))
            .unwrap_or_else(|| "0.0".to_string());
        let cover = self
            .pic
            .map(|p| if p.normal.is_empty() { p.large } else { p.normal })
            .unwrap_or_default();

        DoubanSubject {
            id: self.id,
            title: self.title,
            rate,
            cover,
            url: String::new(),
            year,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    Some(value).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone)]
pub struct DoubanClient {
    http: HttpClient,
    mirror: DoubanMirror,
    /// movie 子域, 用于 `/j/search_subjects`
    movie_base: String,
    /// m 子域, 用于 rexxar 接口
    m_base: String,
}

impl DoubanClient {
    pub fn new(http: HttpClient, mirror: DoubanMirror) -> Self {
        let movie_base = mirror.base("movie");
        let m_base = mirror.base("m");
        Self {
            http,
            mirror,
            movie_base,
            m_base,
        }
    }

    pub fn mirror(&self) -> &DoubanMirror {
        &self.mirror
    }

    pub fn list_url(&self, kind: DoubanKind, tag: &str, page_start: u32) -> String {
        format!(
            "{}/j/search_subjects?type={}&tag={}&page_limit={}&page_start={}",
            self.movie_base,
            kind.path(),
            urlencoding::encode(tag),
            PAGE_SIZE,
            page_start
        )
    }

    pub fn rexxar_url(
        &self,
        kind: DoubanKind,
        category: &str,
        sub_type: &str,
        page_start: u32,
    ) -> String {
        let query = form_urlencoded::Serializer::new(String::new())
            .append_pair("start", &page_start.to_string())
            .append_pair("count", &PAGE_SIZE.to_string())
            .append_pair("category", category)
            .append_pair("type", sub_type)
            .finish();
        format!(
            "{}/rexxar/api/v2/subject/recent_hot/{}?{}",
            self.m_base,
            kind.path(),
            query
        )
    }

    pub fn recommend_url(
        &self,
        kind: DoubanKind,
        filters: &RecommendFilters,
        page_start: u32,
    ) -> String {
        let mut tags = Vec::new();
        let mut categories: IndexMap<&str, &str> = IndexMap::new();

        if let Some(genre) = selected(&filters.genre) {
            tags.push(genre);
            categories.insert("类型", genre);
        }
        if let Some(region) = selected(&filters.region) {
            tags.push(region);
            categories.insert("地区", region);
        }
        tags.extend(selected(&filters.year));
        tags.extend(selected(&filters.platform));

        let categories = serde_json::to_string(&categories).unwrap_or_else(|_| "{}".to_string());

        let mut query = form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("refresh", "0")
            .append_pair("start", &page_start.to_string())
            .append_pair("count", &PAGE_SIZE.to_string())
            .append_pair("uncollect", "false")
            .append_pair("score_range", "0,10")
            .append_pair("tags", &tags.join(","))
            .append_pair("selected_categories", &categories);
        if let Some(sort) = filters.sort.as_deref().filter(|s| !s.is_empty() && *s != "T") {
            query.append_pair("sort", sort);
        }

        format!(
            "{}/rexxar/api/v2/{}/recommend?{}",
            self.m_base,
            kind.path(),
            query.finish()
        )
    }

    async fn fetch<T: DeserializeOwned>(&self, target: &str) -> Result<T, DoubanError> {
        let url = proxied_url(self.mirror.proxy(), target);
        debug!("豆瓣请求: {}", url);
        let text = self.http.get_direct_text(&url, Some(DOUBAN_REFERER)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn try_get_list(
        &self,
        kind: DoubanKind,
        tag: &str,
        page_start: u32,
    ) -> Result<Vec<DoubanSubject>, DoubanError> {
        let response: SubjectsResponse = self.fetch(&self.list_url(kind, tag, page_start)).await?;
        Ok(response
            .subjects
            .into_iter()
            .map(|s| DoubanSubject {
                id: s.id,
                title: s.title,
                rate: s.rate,
                cover: s.cover,
                url: s.url,
                year: None,
            })
            .collect())
    }

    pub async fn try_get_rexxar_list(
        &self,
        kind: DoubanKind,
        category: &str,
        sub_type: &str,
        page_start: u32,
    ) -> Result<Vec<DoubanSubject>, DoubanError> {
        let response: ItemsResponse = self
            .fetch(&self.rexxar_url(kind, category, sub_type, page_start))
            .await?;
        Ok(response
            .items
            .into_iter()
            .map(|item| {
                let year = YEAR
                    .captures(&item.card_subtitle)
                    .map(|c| c[1].to_string())
                    .or_else(|| non_empty(item.year.clone()));
                item.into_subject(year)
            })
            .collect())
    }

    pub async fn try_get_recommend_list(
        &self,
        kind: DoubanKind,
        filters: &RecommendFilters,
        page_start: u32,
    ) -> Result<Vec<DoubanSubject>, DoubanError> {
        let response: ItemsResponse = self
            .fetch(&self.recommend_url(kind, filters, page_start))
            .await?;
        Ok(response
            .items
            .into_iter()
            .filter(|item| item.kind == "movie" || item.kind == "tv")
            .map(|item| {
                let year = non_empty(item.year.clone());
                item.into_subject(year)
            })
            .collect())
    }

    /// 标签列表 (`/j/search_subjects`)
    pub async fn get_list(&self, kind: DoubanKind, tag: &str, page_start: u32) -> Vec<DoubanSubject> {
        or_empty(self.try_get_list(kind, tag, page_start).await, "标签列表")
    }

    /// 近期热门 (rexxar `recent_hot`)
    pub async fn get_rexxar_list(
        &self,
        kind: DoubanKind,
        category: &str,
        sub_type: &str,
        page_start: u32,
    ) -> Vec<DoubanSubject> {
        or_empty(
            self.try_get_rexxar_list(kind, category, sub_type, page_start).await,
            "近期热门",
        )
    }

    /// 按条件筛选推荐, 只保留电影和剧集
    pub async fn get_recommend_list(
        &self,
        kind: DoubanKind,
        filters: &RecommendFilters,
        page_start: u32,
    ) -> Vec<DoubanSubject> {
        or_empty(
            self.try_get_recommend_list(kind, filters, page_start).await,
            "筛选推荐",
        )
    }

    /// 首页推荐: 电影取 热门/全部, 剧集与综艺取同名分类
    pub async fn get_recommends(&self, kind: DoubanKind) -> Vec<DoubanSubject> {
        let (category, sub_type) = match kind {
            DoubanKind::Movie => ("热门", "全部"),
            DoubanKind::Tv => ("tv", "tv"),
            DoubanKind::Show => ("show", "show"),
        };
        self.get_rexxar_list(kind, category, sub_type, 0).await
    }
}

fn or_empty(result: Result<Vec<DoubanSubject>, DoubanError>, what: &str) -> Vec<DoubanSubject> {
    match result {
        Ok(items) => {
            debug!("豆瓣{}: {} 条", what, items.len());
            items
        }
        Err(e) => {
            warn!("获取豆瓣{}失败: {}", what, e);
            vec![]
        }
    }
}
