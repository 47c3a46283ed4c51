//! 聚合分组
//! 同名 (忽略空白)、同年份、同类型 (剧集/电影) 的结果归为一组

use crate::types::{CanonicalRecord, ResultGroup};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// 来源站点 / 分类筛选
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchFilter {
    /// 站点 key, 为空或 "all" 表示全部
    #[serde(default)]
    pub site: Option<String>,
    /// 分类名称, 为空或 "all" 表示全部
    #[serde(default)]
    pub type_name: Option<String>,
}

impl SearchFilter {
    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        let site_match = active(&self.site).map_or(true, |site| record.source == site);
        let class_match = active(&self.type_name).map_or(true, |class| record.type_name == class);
        site_match && class_match
    }

    pub fn apply(&self, records: Vec<CanonicalRecord>) -> Vec<CanonicalRecord> {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

fn active(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .filter(|v| !v.is_empty() && *v != "all")
}

/// 结果中出现过的分类 (去重, 保持出现顺序)
pub fn type_names(records: &[CanonicalRecord]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        if !record.type_name.is_empty() && !names.contains(&record.type_name) {
            names.push(record.type_name.clone());
        }
    }
    names
}

/// 只去除空白, 不做大小写或标点归一
pub fn normalize_title(title: &str) -> String {
    WHITESPACE.replace_all(title, "").into_owned()
}

pub fn group_key(record: &CanonicalRecord) -> String {
    let year = if record.year.is_empty() {
        "unknown"
    } else {
        record.year.as_str()
    };
    let kind = if record.episodes.len() > 1 { "tv" } else { "movie" };
    format!("{}-{}-{}", normalize_title(&record.title), year, kind)
}

/// 分组; `aggregate` 为 false 时每条记录单独成组
pub fn group(records: Vec<CanonicalRecord>, aggregate: bool) -> Vec<ResultGroup> {
    if !aggregate {
        return records
            .into_iter()
            .map(|record| ResultGroup {
                key: record.unique_key(),
                sources: vec![record.source_name.clone()],
                items: vec![record],
            })
            .collect();
    }

    let mut groups: Vec<ResultGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        let key = group_key(&record);
        let position = *index.entry(key.clone()).or_insert_with(|| {
            groups.push(ResultGroup {
                key,
                items: Vec::new(),
                sources: Vec::new(),
            });
            groups.len() - 1
        });

        let group = &mut groups[position];
        if !group.sources.contains(&record.source_name) {
            group.sources.push(record.source_name.clone());
        }
        group.items.push(record);
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str, year: &str, episodes: &[&str], source: &str, id: &str) -> CanonicalRecord {
        let episodes: Vec<String> = episodes.iter().map(|e| e.to_string()).collect();
        CanonicalRecord {
            id: id.to_string(),
            title: title.to_string(),
            poster: String::new(),
            source: source.to_string(),
            source_name: format!("{}站", source),
            year: year.to_string(),
            class: String::new(),
            type_name: String::new(),
            desc: String::new(),
            play_sources: vec![],
            episode_titles: vec![String::new(); episodes.len()],
            episodes,
        }
    }

    #[test]
    fn test_kind_is_part_of_key() {
        let records = vec![
            record("X", "2020", &["a", "b"], "s1", "1"),
            record("X", "2020", &["c", "d"], "s2", "7"),
            record("X", "2020", &["a"], "s3", "2"),
        ];
        let groups = group(records, true);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].key, "X-2020-tv");
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].sources, vec!["s1站", "s2站"]);
        assert!(groups[0].is_aggregated());

        assert_eq!(groups[1].key, "X-2020-movie");
        assert_eq!(groups[1].items[0].source, "s3");
    }

    #[test]
    fn test_key_strips_whitespace_only() {
        assert_eq!(normalize_title(" 三 体\t第一季 "), "三体第一季");
        assert_eq!(normalize_title("Foo: Bar"), "Foo:Bar");

        let records = vec![
            record("Foo Bar", "", &[], "s1", "1"),
            record("FooBar", "", &[], "s2", "1"),
            record("foobar", "", &[], "s3", "1"),
            record("Foo-Bar", "", &[], "s4", "1"),
        ];
        let groups = group(records, true);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key, "FooBar-unknown-movie");
        assert_eq!(groups[0].items.len(), 2);
    }

    #[test]
    fn test_group_order_and_dedup_sources() {
        let records = vec![
            record("B", "2021", &[], "s1", "1"),
            record("A", "2021", &[], "s1", "2"),
            record("B", "2021", &[], "s1", "3"),
            record("A", "2021", &[], "s2", "4"),
        ];
        let groups = group(records, true);
        assert_eq!(groups[0].key, "B-2021-movie");
        let ids: Vec<&str> = groups[0].items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(groups[0].sources, vec!["s1站"]);
        assert_eq!(groups[0].items[0].id, "1");
        assert_eq!(groups[1].sources, vec!["s1站", "s2站"]);
    }

    #[test]
    fn test_passthrough_when_not_aggregating() {
        let records = vec![
            record("X", "2020", &["a", "b"], "s1", "1"),
            record("X", "2020", &["c", "d"], "s2", "1"),
        ];
        let groups = group(records, false);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].key, "s1-1");
        assert_eq!(groups[1].key, "s2-1");
        assert!(groups.iter().all(|g| g.items.len() == 1));
    }

    #[test]
    fn test_filter() {
        let mut movie = record("A", "2020", &[], "s1", "1");
        movie.type_name = "电影".to_string();
        let mut series = record("B", "2020", &[], "s2", "2");
        series.type_name = "国产剧".to_string();
        let records = vec![movie, series];

        assert_eq!(type_names(&records), vec!["电影", "国产剧"]);
        assert_eq!(SearchFilter::default().apply(records.clone()).len(), 2);

        let by_site = SearchFilter {
            site: Some("s2".to_string()),
            type_name: Some("all".to_string()),
        };
        assert_eq!(by_site.apply(records.clone())[0].id, "2");

        let by_class = SearchFilter {
            site: None,
            type_name: Some("电影".to_string()),
        };
        assert_eq!(by_class.apply(records.clone())[0].id, "1");

        let none = SearchFilter {
            site: Some("s1".to_string()),
            type_name: Some("国产剧".to_string()),
        };
        assert!(none.apply(records).is_empty());
    }
}
