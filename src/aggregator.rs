//! 多站点并发聚合
//! 单个站点失败只影响它自己的那一份结果

use crate::cms::{CatalogSource, CmsError};
use crate::matcher;
use crate::types::{
    CanonicalRecord, MatchQuery, SiteDescriptor, StreamEvent, StreamProgress, StreamResult,
};
use futures::future::join_all;
use futures::stream::Stream;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

/// 搜索单个站点, 等待时间不超过数据源的超时上限
async fn search_site(
    source: &dyn CatalogSource,
    site: &SiteDescriptor,
    keyword: &str,
) -> Result<Vec<CanonicalRecord>, CmsError> {
    match tokio::time::timeout(source.timeout(), source.try_search(site, keyword)).await {
        Ok(result) => result,
        Err(_) => Err(CmsError::SiteUnavailable("请求超时".to_string())),
    }
}

/// 并发搜索所有站点, 结果按站点顺序拼接
pub async fn aggregate_search(
    source: &dyn CatalogSource,
    sites: &[SiteDescriptor],
    keyword: &str,
) -> Vec<CanonicalRecord> {
    info!("开始聚合搜索: {}, 共 {} 个站点", keyword, sites.len());

    let searches = sites.iter().map(|site| async move {
        match search_site(source, site, keyword).await {
            Ok(items) => {
                debug!("站点 {} 搜索完成: {} 个结果", site.name, items.len());
                items
            }
            Err(e) => {
                warn!("站点 {} 搜索失败: {}", site.name, e);
                vec![]
            }
        }
    });

    let results: Vec<CanonicalRecord> = join_all(searches).await.into_iter().flatten().collect();

    info!("聚合搜索完成: {}, 共 {} 条结果", keyword, results.len());
    results
}

/// 跨站点搜索并按匹配程度排序
pub async fn find_across_sites(
    source: &dyn CatalogSource,
    sites: &[SiteDescriptor],
    query: &MatchQuery,
) -> Vec<CanonicalRecord> {
    let results = aggregate_search(source, sites, &query.title).await;
    matcher::rank(results, query)
}

/// 只有标题 (和年份) 时, 找出最合适的可播放资源并获取其详情
///
/// 详情获取失败时退回到搜索结果本身。
pub async fn resolve_best(
    source: &dyn CatalogSource,
    sites: &[SiteDescriptor],
    query: &MatchQuery,
) -> Option<CanonicalRecord> {
    let ranked = find_across_sites(source, sites, query).await;
    let best = ranked.into_iter().find(CanonicalRecord::is_playable)?;
    let site = sites.iter().find(|s| s.key == best.source)?;

    debug!("最佳匹配: {} ({})", best.title, site.name);

    match source.get_detail(site, &best.id).await {
        Some(detail) if detail.is_playable() => Some(detail),
        _ => Some(best),
    }
}

/// 流式搜索: 每个站点完成后立即推送一行 JSON 事件
pub fn search_stream(
    keyword: String,
    sites: Vec<SiteDescriptor>,
    source: Arc<dyn CatalogSource>,
) -> impl Stream<Item = String> {
    let (tx, rx) = mpsc::channel::<String>(100);

    tokio::spawn(async move {
        execute_parallel_search(keyword, sites, source, tx).await;
    });

    ReceiverStream::new(rx)
}

async fn execute_parallel_search(
    keyword: String,
    sites: Vec<SiteDescriptor>,
    source: Arc<dyn CatalogSource>,
    tx: mpsc::Sender<String>,
) {
    let total = sites.len();
    let completed = Arc::new(AtomicUsize::new(0));

    info!("开始流式搜索: {}, 共 {} 个站点", keyword, total);

    let init_event = StreamEvent::Init { total };
    if tx.send(format_event(&init_event)).await.is_err() {
        return;
    }

    let mut handles = Vec::new();

    for site in sites {
        let keyword = keyword.clone();
        let source = source.clone();
        let tx = tx.clone();
        let completed = completed.clone();

        let handle = tokio::spawn(async move {
            let result = search_site(source.as_ref(), &site, &keyword).await;
            let current = completed.fetch_add(1, Ordering::SeqCst) + 1;

            let progress = StreamProgress {
                completed: current,
                total,
            };

            let (items, error) = match result {
                Ok(items) => (items, None),
                Err(e) => {
                    warn!("站点 {} 搜索失败: {}", site.name, e);
                    (vec![], Some(e.to_string()))
                }
            };

            debug!("站点 {} 搜索完成: {} 个结果", site.name, items.len());

            // 只有有结果或有错误时才发送结果
            let event = if !items.is_empty() || error.is_some() {
                StreamEvent::Result {
                    progress,
                    result: StreamResult {
                        key: site.key.clone(),
                        name: site.name.clone(),
                        items,
                        error,
                    },
                }
            } else {
                StreamEvent::Progress { progress }
            };

            let _ = tx.send(format_event(&event)).await;
        });

        handles.push(handle);
    }

    for handle in handles {
        let _ = handle.await;
    }

    let done_event = StreamEvent::Done { done: true };
    let _ = tx.send(format_event(&done_event)).await;

    info!("流式搜索完成: {}", keyword);
}

fn format_event(event: &StreamEvent) -> String {
    format!("{}\n", serde_json::to_string(event).unwrap_or_default())
}
