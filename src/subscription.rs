//! 订阅配置
//! 解析 / 导出 `api_site` 格式的站点配置, 支持从远程地址拉取

use crate::http_client::HttpClient;
use crate::types::SiteDescriptor;
use indexmap::IndexMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

const DEFAULT_CACHE_TIME: u64 = 7200;
const DEFAULT_SITE_NAME: &str = "MixTV";

/// 配置文件中的单个站点
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEntry {
    #[serde(default)]
    pub name: String,
    pub api: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
}

/// 订阅配置文档
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscription {
    pub cache_time: u64,
    /// 站点 key -> 站点配置 (保持文档中的顺序)
    pub api_site: IndexMap<String, SiteEntry>,
    #[serde(skip_serializing)]
    pub site_name: String,
    #[serde(skip_serializing)]
    pub announcement: String,
}

fn default_site_name() -> String {
    DEFAULT_SITE_NAME.to_string()
}

/// 宽松的原始文档: 字段类型不对时按缺省处理
#[derive(Debug, Deserialize)]
struct RawSubscription {
    #[serde(default)]
    cache_time: Value,
    #[serde(default)]
    api_site: RawSites,
    #[serde(default)]
    site_name: Value,
    #[serde(default)]
    announcement: Value,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSites {
    Entries(IndexMap<String, Value>),
    Invalid(IgnoredAny),
}

impl Default for RawSites {
    fn default() -> Self {
        RawSites::Entries(IndexMap::new())
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            cache_time: DEFAULT_CACHE_TIME,
            api_site: IndexMap::new(),
            site_name: default_site_name(),
            announcement: String::new(),
        }
    }
}

impl Subscription {
    /// 展开为站点列表
    pub fn sites(&self) -> Vec<SiteDescriptor> {
        self.api_site
            .iter()
            .map(|(key, entry)| SiteDescriptor {
                key: key.clone(),
                name: entry.name.clone(),
                api: entry.api.clone(),
                detail: entry.detail.clone(),
                disabled: entry.disabled,
            })
            .collect()
    }

    /// 由站点列表构建; 空 key 的站点被忽略
    pub fn from_sites(sites: &[SiteDescriptor]) -> Self {
        let api_site = sites
            .iter()
            .filter(|s| !s.key.is_empty())
            .map(|s| {
                (
                    s.key.clone(),
                    SiteEntry {
                        name: s.name.clone(),
                        api: s.api.clone(),
                        detail: s.detail.clone(),
                        disabled: s.disabled,
                    },
                )
            })
            .collect();

        Self {
            api_site,
            ..Self::default()
        }
    }
}

/// 解析配置, 从不失败
///
/// 整个文档无法解析时返回空配置; 单个站点格式错误时跳过该站点。
pub fn parse_config(json: &str) -> Subscription {
    let raw: RawSubscription = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("解析订阅配置失败: {}", e);
            return Subscription::default();
        }
    };

    let mut api_site = IndexMap::new();
    match raw.api_site {
        RawSites::Entries(entries) => {
            for (key, value) in entries {
                match serde_json::from_value::<SiteEntry>(value) {
                    Ok(entry) => {
                        api_site.insert(key, entry);
                    }
                    Err(e) => warn!("跳过无效站点配置 {}: {}", key, e),
                }
            }
        }
        RawSites::Invalid(_) => warn!("api_site 不是对象, 已忽略"),
    }

    Subscription {
        cache_time: raw
            .cache_time
            .as_u64()
            .filter(|t| *t > 0)
            .unwrap_or(DEFAULT_CACHE_TIME),
        api_site,
        site_name: non_empty(&raw.site_name).unwrap_or_else(default_site_name),
        announcement: non_empty(&raw.announcement).unwrap_or_default(),
    }
}

fn non_empty(value: &Value) -> Option<String> {
    value
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// 导出为标准配置格式
pub fn export_config(subscription: &Subscription) -> String {
    serde_json::to_string_pretty(subscription).unwrap_or_default()
}

/// 从远程地址拉取订阅
pub async fn fetch_subscription(http: &HttpClient, url: &str) -> anyhow::Result<Subscription> {
    let response = http.client().get(url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("获取订阅失败: HTTP {}", response.status());
    }

    let text = response.text().await?;
    let subscription = parse_config(&text);
    info!("📡 订阅包含 {} 个站点", subscription.api_site.len());
    Ok(subscription)
}
