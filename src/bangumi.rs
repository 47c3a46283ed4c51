//! Bangumi 每日放送

use crate::cms::lenient_string;
use crate::http_client::{HttpClient, HttpClientError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

pub const BANGUMI_API: &str = "https://api.bgm.tv";

#[derive(Debug, Error)]
pub enum BangumiError {
    #[error(transparent)]
    Unavailable(#[from] HttpClientError),
    #[error("响应格式异常: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weekday {
    #[serde(default, deserialize_with = "lenient_string")]
    pub en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ja: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarImages {
    #[serde(default, deserialize_with = "lenient_string")]
    pub large: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub common: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub medium: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub small: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub grid: String,
}

/// 放送条目; 评分、放送日期等其余字段原样透传
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name_cn: String,
    #[serde(default)]
    pub images: Option<CalendarImages>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarDay {
    pub weekday: Weekday,
    #[serde(default)]
    pub items: Vec<CalendarItem>,
}

#[derive(Debug, Clone)]
pub struct BangumiClient {
    http: HttpClient,
    base: String,
}

impl BangumiClient {
    pub fn new(http: HttpClient) -> Self {
        Self::with_base(http, BANGUMI_API)
    }

    pub fn with_base(http: HttpClient, base: impl Into<String>) -> Self {
        Self {
            http,
            base: base.into(),
        }
    }

    pub async fn try_get_calendar(&self) -> Result<Vec<CalendarDay>, BangumiError> {
        let url = format!("{}/calendar", self.base.trim_end_matches('/'));
        let text = self.http.get_direct_text(&url, None).await?;
        let days: Vec<CalendarDay> = serde_json::from_str(&text)?;

        // 没有封面的条目不展示
        Ok(days
            .into_iter()
            .map(|mut day| {
                day.items.retain(|item| item.images.is_some());
                day
            })
            .collect())
    }

    /// 一周放送表, 失败时为空
    pub async fn get_calendar(&self) -> Vec<CalendarDay> {
        match self.try_get_calendar().await {
            Ok(days) => {
                debug!("Bangumi 放送表: {} 天", days.len());
                days
            }
            Err(e) => {
                warn!("获取 Bangumi 放送表失败: {}", e);
                vec![]
            }
        }
    }
}
