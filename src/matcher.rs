//! 结果排序: 标题完全一致优先, 其次年份一致

use crate::types::{CanonicalRecord, MatchQuery};
use std::cmp::Reverse;

/// 按与查询的匹配程度排序 (稳定排序, 同分保持原顺序)
pub fn rank(mut records: Vec<CanonicalRecord>, query: &MatchQuery) -> Vec<CanonicalRecord> {
    records.sort_by_key(|record| Reverse(score(record, query)));
    records
}

/// 排序后的第一条
pub fn best<'a>(records: &'a [CanonicalRecord], query: &MatchQuery) -> Option<&'a CanonicalRecord> {
    records
        .iter()
        .enumerate()
        .max_by_key(|(index, record)| (score(record, query), Reverse(*index)))
        .map(|(_, record)| record)
}

/// (标题一致, 年份一致); 未提供年份时第二项恒为 false
fn score(record: &CanonicalRecord, query: &MatchQuery) -> (bool, bool) {
    let title_match = record.title == query.title;
    let year_match = query
        .year
        .as_deref()
        .map(|year| record.year == year)
        .unwrap_or(false);
    (title_match, year_match)
}
