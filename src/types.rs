//! 公共数据类型
//! 字段命名与前端约定保持一致 (snake_case)

use serde::{Deserialize, Serialize};

/// 采集站点描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    pub key: String,
    pub name: String,
    pub api: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub disabled: bool,
}

impl SiteDescriptor {
    pub fn new(key: impl Into<String>, name: impl Into<String>, api: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            api: api.into(),
            detail: None,
            disabled: false,
        }
    }
}

/// 播放线路: 同一影片在同一站点下的一组剧集地址
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaySource {
    pub name: String,
    pub episodes: Vec<String>,
    #[serde(rename = "episodes_titles")]
    pub episode_titles: Vec<String>,
}

/// 标准化后的影片记录
///
/// `episodes` / `episode_titles` 与 `play_sources[0]` 保持一致,
/// 没有任何线路时二者为空。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub title: String,
    pub poster: String,
    /// 所属站点 key
    pub source: String,
    pub source_name: String,
    pub year: String,
    pub class: String,
    pub type_name: String,
    pub desc: String,
    pub play_sources: Vec<PlaySource>,
    pub episodes: Vec<String>,
    #[serde(rename = "episodes_titles")]
    pub episode_titles: Vec<String>,
}

impl CanonicalRecord {
    /// 至少有一条可播放线路
    pub fn is_playable(&self) -> bool {
        !self.play_sources.is_empty()
    }

    /// 跨站点唯一标识 `source-id`
    pub fn unique_key(&self) -> String {
        format!("{}-{}", self.source, self.id)
    }
}

/// 匹配条件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub title: String,
    #[serde(default)]
    pub year: Option<String>,
}

impl MatchQuery {
    /// 空年份视为未提供
    pub fn new(title: impl Into<String>, year: Option<String>) -> Self {
        Self {
            title: title.into(),
            year: year.filter(|y| !y.is_empty()),
        }
    }
}

/// 聚合分组, `items[0]` 为展示用的代表记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultGroup {
    pub key: String,
    pub items: Vec<CanonicalRecord>,
    /// 去重后的来源站点名称
    pub sources: Vec<String>,
}

impl ResultGroup {
    pub fn is_aggregated(&self) -> bool {
        self.items.len() > 1
    }
}

/// 流式搜索进度
#[derive(Debug, Clone, Serialize)]
pub struct StreamProgress {
    pub completed: usize,
    pub total: usize,
}

/// 单个站点的搜索结果
#[derive(Debug, Clone, Serialize)]
pub struct StreamResult {
    pub key: String,
    pub name: String,
    pub items: Vec<CanonicalRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 流式搜索事件 (每行一个 JSON)
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StreamEvent {
    Init { total: usize },
    Progress { progress: StreamProgress },
    Result { progress: StreamProgress, result: StreamResult },
    Done { done: bool },
}
