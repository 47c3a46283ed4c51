mod aggregator;
mod bangumi;
mod cms;
mod config;
mod douban;
mod grouper;
mod guard;
mod http_client;
mod matcher;
mod registry;
mod relay;
mod subscription;
mod types;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{any, get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::aggregator::{aggregate_search, find_across_sites, resolve_best, search_stream};
use crate::bangumi::BangumiClient;
use crate::cms::{CatalogSource, CmsClient};
use crate::config::Config;
use crate::douban::{DoubanClient, DoubanKind, RecommendFilters};
use crate::grouper::{group, type_names, SearchFilter};
use crate::guard::SessionGuards;
use crate::http_client::HttpClient;
use crate::registry::{load_registry, SiteRegistry};
use crate::subscription::{export_config, Subscription};
use crate::types::{CanonicalRecord, MatchQuery, ResultGroup};

/// 同时跟踪的搜索会话上限
const SESSION_CAPACITY: usize = 1024;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SiteRegistry>,
    pub catalog: Arc<dyn CatalogSource>,
    pub http: HttpClient,
    pub relay: reqwest::Client,
    pub douban: Arc<DoubanClient>,
    pub bangumi: Arc<BangumiClient>,
    pub sessions: Arc<SessionGuards<SearchResponse>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();

    let config = Config::from_env();
    let http = HttpClient::new(config.timeout, config.api_proxy.clone())?;
    let registry = load_registry(&config, &http).await;

    info!("📚 已加载 {} 个站点", registry.len());
    if let Some(proxy) = &config.api_proxy {
        info!("🔀 采集站请求经由代理: {}", proxy);
    }

    let state = AppState {
        registry: Arc::new(registry),
        catalog: Arc::new(CmsClient::new(http.clone())),
        douban: Arc::new(DoubanClient::new(http.clone(), config.douban_mirror.clone())),
        bangumi: Arc::new(BangumiClient::new(http.clone())),
        http,
        relay: relay::relay_client()?,
        sessions: Arc::new(SessionGuards::new(SESSION_CAPACITY)),
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("🚀 MixTV 聚合 API 启动在 http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

pub fn app(state: AppState) -> Router {
    // CORS 配置
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(api_info_handler))
        .route("/health", get(health_handler))
        .route("/sites", get(sites_handler))
        .route("/config/export", get(export_handler))
        .route("/search", get(search_handler))
        .route("/search/latest", get(latest_handler))
        .route("/search/stream", post(search_stream_handler))
        .route("/match", get(match_handler))
        .route("/play", get(play_handler))
        .route("/list/{site}", get(list_handler))
        .route("/detail/{site}/{id}", get(detail_handler))
        // 影视推荐
        .route("/douban/list", get(douban_list_handler))
        .route("/douban/hot/{kind}", get(douban_hot_handler))
        .route("/douban/recommend/{kind}", get(douban_recommend_handler))
        .route("/douban/recommends/{kind}", get(douban_recommends_handler))
        .route("/douban/image", get(douban_image_handler))
        .route("/bangumi/calendar", get(bangumi_calendar_handler))
        .layer(cors)
        // 代理自行处理预检请求, 不经过 CORS 层
        .route("/proxy", any(relay::proxy_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

/// GET / - API 信息
async fn api_info_handler() -> impl IntoResponse {
    Json(json!({
        "name": "MixTV API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "影视采集站聚合搜索后端",
        "endpoints": {
            "GET /sites": "已启用的站点列表",
            "GET /config/export": "导出当前站点配置 (订阅格式)",
            "GET /search": "聚合搜索 (?wd=关键词&aggregate=true&site=站点&type_name=分类&session=会话)",
            "GET /search/latest": "会话最近一次被接受的搜索结果 (?session=)",
            "POST /search/stream": "流式搜索 (JSON: {wd, sites?}), 每行一个事件",
            "GET /match": "跨站点匹配排序 (?title=&year=)",
            "GET /play": "最佳可播放资源详情 (?title=&year=)",
            "GET /list/{site}": "站点分页列表 (?pg=&t=)",
            "GET /detail/{site}/{id}": "站点资源详情",
            "GET /douban/list": "豆瓣标签列表 (?type=movie|tv&tag=热门&start=0)",
            "GET /douban/hot/{kind}": "豆瓣近期热门 (?category=&type=&start=)",
            "GET /douban/recommend/{kind}": "豆瓣筛选推荐 (?type=&region=&year=&platform=&sort=&start=)",
            "GET /douban/recommends/{kind}": "首页推荐 (movie|tv|show)",
            "GET /douban/image": "海报地址重定向到镜像 (?url=)",
            "GET /bangumi/calendar": "Bangumi 每日放送",
            "ANY /proxy": "通用跨域代理 (?url=)",
            "GET /health": "健康检查"
        }
    }))
}

/// 健康检查
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// 已启用的站点
async fn sites_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.enabled())
}

/// GET /config/export - 导出站点配置
async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/json; charset=utf-8")],
        export_config(&Subscription::from_sites(state.registry.all())),
    )
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub wd: Option<String>,
    pub aggregate: Option<bool>,
    pub site: Option<String>,
    pub type_name: Option<String>,
    pub session: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub keyword: String,
    pub total: usize,
    pub type_names: Vec<String>,
    pub groups: Vec<ResultGroup>,
}

fn build_search_response(
    keyword: String,
    results: Vec<CanonicalRecord>,
    filter: &SearchFilter,
    aggregate: bool,
) -> SearchResponse {
    let total = results.len();
    let type_names = type_names(&results);
    let groups = group(filter.apply(results), aggregate);
    debug!(
        "{} 条结果分为 {} 组, {} 组包含多个来源",
        total,
        groups.len(),
        groups.iter().filter(|g| g.is_aggregated()).count()
    );
    SearchResponse {
        keyword,
        total,
        type_names,
        groups,
    }
}

/// GET /search - 聚合搜索
async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Response {
    let keyword = match params.wd.as_deref().map(str::trim) {
        Some(k) if !k.is_empty() => k.to_string(),
        _ => return error_response(StatusCode::BAD_REQUEST, "Keyword (wd) is required"),
    };

    let guard = params
        .session
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| state.sessions.get(s));
    let ticket = guard.as_ref().map(|g| g.begin());

    info!("🔍 搜索: {}", keyword);

    let results = aggregate_search(state.catalog.as_ref(), &state.registry.enabled(), &keyword).await;
    let filter = SearchFilter {
        site: params.site,
        type_name: params.type_name,
    };
    let response = build_search_response(keyword, results, &filter, params.aggregate.unwrap_or(true));

    if let (Some(guard), Some(ticket)) = (guard, ticket) {
        if !guard.commit(ticket, response.clone()).await {
            return error_response(StatusCode::CONFLICT, "Superseded by a newer search");
        }
    }

    Json(response).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SessionParams {
    pub session: String,
}

/// GET /search/latest - 会话最近一次被接受的结果
async fn latest_handler(
    State(state): State<AppState>,
    Query(params): Query<SessionParams>,
) -> Response {
    let latest = match state.sessions.find(&params.session) {
        Some(guard) => guard.current().await,
        None => None,
    };

    match latest {
        Some(response) => Json(response).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No search for this session"),
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamRequest {
    pub wd: String,
    #[serde(default)]
    pub sites: Option<Vec<String>>,
}

/// POST /search/stream - 流式搜索
async fn search_stream_handler(
    State(state): State<AppState>,
    Json(req): Json<StreamRequest>,
) -> Response {
    let keyword = req.wd.trim().to_string();
    if keyword.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Keyword (wd) is required");
    }

    let sites = match req.sites {
        Some(keys) if !keys.is_empty() => state.registry.select(&keys),
        _ => state.registry.enabled(),
    };
    if sites.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "No matching sites found");
    }

    info!(
        "🔍 流式搜索: {} (站点: {})",
        keyword,
        sites
            .iter()
            .map(|s| s.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let stream = search_stream(keyword, sites, state.catalog.clone());
    let body = Body::from_stream(stream.map(Ok::<_, std::convert::Infallible>));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/x-ndjson; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct MatchParams {
    pub title: Option<String>,
    pub year: Option<String>,
}

impl MatchParams {
    fn query(self) -> Option<MatchQuery> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        Some(MatchQuery::new(title, self.year))
    }
}

/// GET /match - 跨站点匹配
async fn match_handler(
    State(state): State<AppState>,
    Query(params): Query<MatchParams>,
) -> Response {
    let Some(query) = params.query() else {
        return error_response(StatusCode::BAD_REQUEST, "Title is required");
    };
    let results = find_across_sites(state.catalog.as_ref(), &state.registry.enabled(), &query).await;
    Json(results).into_response()
}

/// GET /play - 只有标题时挑选最佳可播放资源
async fn play_handler(
    State(state): State<AppState>,
    Query(params): Query<MatchParams>,
) -> Response {
    let Some(query) = params.query() else {
        return error_response(StatusCode::BAD_REQUEST, "Title is required");
    };
    match resolve_best(state.catalog.as_ref(), &state.registry.enabled(), &query).await {
        Some(detail) => Json(detail).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "No playable source found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub pg: Option<u32>,
    pub t: Option<String>,
}

/// GET /list/{site} - 站点分页列表
async fn list_handler(
    State(state): State<AppState>,
    Path(site): Path<String>,
    Query(params): Query<ListParams>,
) -> Response {
    let Some(site) = state.registry.get(&site) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown site");
    };
    let items = state
        .catalog
        .fetch_list(site, params.pg.unwrap_or(1).max(1), params.t.as_deref())
        .await;
    Json(items).into_response()
}

/// GET /detail/{site}/{id} - 资源详情
async fn detail_handler(
    State(state): State<AppState>,
    Path((site, id)): Path<(String, String)>,
) -> Response {
    let Some(site) = state.registry.get(&site) else {
        return error_response(StatusCode::NOT_FOUND, "Unknown site");
    };
    match state.catalog.get_detail(site, &id).await {
        Some(detail) => Json(detail).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Not found"),
    }
}

#[derive(Debug, Deserialize)]
pub struct PageParams {
    pub start: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DoubanListParams {
    #[serde(rename = "type")]
    pub kind: Option<DoubanKind>,
    pub tag: Option<String>,
}

/// GET /douban/list - 豆瓣标签列表
async fn douban_list_handler(
    State(state): State<AppState>,
    Query(params): Query<DoubanListParams>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let tag = params.tag.filter(|t| !t.is_empty());
    let items = state
        .douban
        .get_list(
            params.kind.unwrap_or(DoubanKind::Movie),
            tag.as_deref().unwrap_or("热门"),
            page.start.unwrap_or(0),
        )
        .await;
    Json(items)
}

#[derive(Debug, Deserialize)]
pub struct DoubanHotParams {
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub sub_type: Option<String>,
}

/// GET /douban/hot/{kind} - 豆瓣近期热门
async fn douban_hot_handler(
    State(state): State<AppState>,
    Path(kind): Path<DoubanKind>,
    Query(params): Query<DoubanHotParams>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let category = params.category.filter(|c| !c.is_empty());
    let sub_type = params.sub_type.filter(|t| !t.is_empty());
    let items = state
        .douban
        .get_rexxar_list(
            kind,
            category.as_deref().unwrap_or("热门"),
            sub_type.as_deref().unwrap_or("全部"),
            page.start.unwrap_or(0),
        )
        .await;
    Json(items)
}

/// GET /douban/recommend/{kind} - 豆瓣筛选推荐
async fn douban_recommend_handler(
    State(state): State<AppState>,
    Path(kind): Path<DoubanKind>,
    Query(filters): Query<RecommendFilters>,
    Query(page): Query<PageParams>,
) -> impl IntoResponse {
    let items = state
        .douban
        .get_recommend_list(kind, &filters, page.start.unwrap_or(0))
        .await;
    Json(items)
}

/// GET /douban/recommends/{kind} - 首页推荐
async fn douban_recommends_handler(
    State(state): State<AppState>,
    Path(kind): Path<DoubanKind>,
) -> impl IntoResponse {
    Json(state.douban.get_recommends(kind).await)
}

#[derive(Debug, Deserialize)]
pub struct ImageParams {
    pub url: Option<String>,
}

/// GET /douban/image - 海报重定向
async fn douban_image_handler(
    State(state): State<AppState>,
    Query(params): Query<ImageParams>,
) -> Response {
    match params.url.filter(|u| !u.is_empty()) {
        Some(url) => Redirect::temporary(&state.douban.mirror().image_url(&url)).into_response(),
        None => error_response(StatusCode::BAD_REQUEST, "Image url is required"),
    }
}

/// GET /bangumi/calendar - 每日放送
async fn bangumi_calendar_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.bangumi.get_calendar().await)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::aggregator::tests::{record, sites, Behavior, FakeSource};
    use crate::douban::DoubanMirror;
    use crate::types::SiteDescriptor;
    use axum::http::Request;
    use serde_json::Value;
    use std::time::Duration;
    use tower::ServiceExt;

    pub(crate) fn state(source: FakeSource, sites: Vec<SiteDescriptor>) -> AppState {
        let http = HttpClient::new(Duration::from_secs(5), None).unwrap();
        AppState {
            registry: Arc::new(SiteRegistry::new(sites)),
            catalog: Arc::new(source),
            http: http.clone(),
            relay: relay::relay_client().unwrap(),
            douban: Arc::new(DoubanClient::new(http.clone(), DoubanMirror::Tencent)),
            bangumi: Arc::new(BangumiClient::new(http.clone())),
            sessions: Arc::new(SessionGuards::new(16)),
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    fn series(site: &str, id: &str, title: &str) -> CanonicalRecord {
        let mut r = record(site, id, title, "2020");
        r.episodes = vec!["e1".to_string(), "e2".to_string()];
        r.episode_titles = vec!["1".to_string(), "2".to_string()];
        r.play_sources[0].episodes = r.episodes.clone();
        r.play_sources[0].episode_titles = r.episode_titles.clone();
        r.type_name = "国产剧".to_string();
        r
    }

    fn search_app() -> Router {
        let source = FakeSource::new(vec![
            ("a", Behavior::Returns(vec![series("a", "1", "三体"), record("a", "2", "三体", "2020")])),
            ("b", Behavior::Returns(vec![series("b", "9", "三 体")])),
            ("c", Behavior::Fails),
        ]);
        app(state(source, sites(&["a", "b", "c"])))
    }

    #[tokio::test]
    async fn test_health_and_sites() {
        let app = search_app();
        let (status, body) = get_json(app.clone(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");

        let (_, body) = get_json(app.clone(), "/sites").await;
        assert_eq!(body.as_array().unwrap().len(), 3);

        let (status, body) = get_json(app, "/config/export").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["api_site"]["b"]["api"], "https://b/api/");
        assert_eq!(body["cache_time"], 7200);
    }

    #[tokio::test]
    async fn test_search_groups_across_sites() {
        let (status, body) = get_json(search_app(), "/search?wd=%E4%B8%89%E4%BD%93").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);
        assert_eq!(body["type_names"], json!(["国产剧", "电影"]));

        let groups = body["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        let tv = groups.iter().find(|g| g["key"] == "三体-2020-tv").unwrap();
        assert_eq!(tv["items"].as_array().unwrap().len(), 2);
        assert_eq!(tv["sources"], json!(["a站", "b站"]));
        assert!(groups.iter().any(|g| g["key"] == "三体-2020-movie"));
    }

    #[tokio::test]
    async fn test_search_without_aggregation_and_filters() {
        let (_, body) = get_json(search_app(), "/search?wd=x&aggregate=false").await;
        assert_eq!(body["groups"].as_array().unwrap().len(), 3);

        let (_, body) = get_json(search_app(), "/search?wd=x&site=b").await;
        let groups = body["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0]["items"][0]["source"], "b");

        let (_, body) = get_json(search_app(), "/search?wd=x&type_name=%E7%94%B5%E5%BD%B1").await;
        assert_eq!(body["groups"].as_array().unwrap().len(), 1);
        assert_eq!(body["total"], 3);
    }

    #[tokio::test]
    async fn test_search_requires_keyword() {
        let (status, body) = get_json(search_app(), "/search?wd=%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_stale_session_search_is_rejected() {
        let delay = Duration::from_millis(300);
        let source = FakeSource::new(vec![(
            "a",
            Behavior::Delayed(delay, vec![record("a", "1", "Foo", "")]),
        )]);
        let app = app(state(source, sites(&["a"])));

        let first = tokio::spawn(get_json(app.clone(), "/search?wd=first&session=s1"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let second = tokio::spawn(get_json(app.clone(), "/search?wd=second&session=s1"));

        let (first_status, _) = first.await.unwrap();
        let (second_status, body) = second.await.unwrap();
        assert_eq!(first_status, StatusCode::CONFLICT);
        assert_eq!(second_status, StatusCode::OK);
        assert_eq!(body["keyword"], "second");

        let (status, latest) = get_json(app.clone(), "/search/latest?session=s1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(latest["keyword"], "second");

        let (status, _) = get_json(app, "/search/latest?session=unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_match_and_play() {
        let source = FakeSource::new(vec![
            ("a", Behavior::Returns(vec![record("a", "1", "Foo Bar", "2020")])),
            ("b", Behavior::Returns(vec![record("b", "2", "Foo", "1999")])),
        ]);
        let app = app(state(source, sites(&["a", "b"])));

        let (status, body) = get_json(app.clone(), "/match?title=Foo&year=2020").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["source"], "b");
        assert_eq!(body[1]["source"], "a");

        let (status, body) = get_json(app.clone(), "/play?title=Foo").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], "2");

        let (status, _) = get_json(app, "/match?year=2020").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_and_detail() {
        let mut source = FakeSource::new(vec![("a", Behavior::Returns(vec![record("a", "1", "Foo", "")]))]);
        source.details.insert("a-1".to_string(), record("a", "1", "Foo", ""));
        let app = app(state(source, sites(&["a"])));

        let (status, body) = get_json(app.clone(), "/list/a?pg=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, _) = get_json(app.clone(), "/list/zz").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_json(app.clone(), "/detail/a/1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "Foo");

        let (status, _) = get_json(app, "/detail/a/missing").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_disabled_site_is_hidden() {
        let mut source = FakeSource::new(vec![("off", Behavior::Returns(vec![record("off", "1", "Foo", "")]))]);
        source.details.insert("off-1".to_string(), record("off", "1", "Foo", ""));
        let mut all = sites(&["a", "off"]);
        all[1].disabled = true;
        let app = app(state(source, all));

        let (status, _) = get_json(app.clone(), "/list/off").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = get_json(app.clone(), "/detail/off/1").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, body) = get_json(app, "/sites").await;
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bangumi_calendar_route() {
        let mut state = state(FakeSource::new(vec![]), vec![]);
        state.bangumi = Arc::new(crate::bangumi::tests::local_client(crate::bangumi::tests::calendar()).await);

        let (status, body) = get_json(app(state), "/bangumi/calendar").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 2);
        assert_eq!(body[0]["items"].as_array().unwrap().len(), 1);
        assert_eq!(body[0]["items"][0]["air_date"], "2023-09-29");
    }

    #[tokio::test]
    async fn test_douban_image_and_kind_validation() {
        let app = app(state(FakeSource::new(vec![]), vec![]));

        let cover = urlencoding::encode("https://img1.doubanio.com/view/p1.jpg");
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/douban/image?url={}", cover))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response.headers()[header::LOCATION],
            "https://img1.douban.cmliussss.net/view/p1.jpg"
        );

        let (status, _) = get_json(app.clone(), "/douban/image").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get_json(app, "/douban/recommends/anime").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_search_stream_endpoint() {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/search/stream")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"wd":"三体","sites":["b","c"]}"#))
            .unwrap();
        let response = search_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let lines: Vec<Value> = String::from_utf8(body.to_vec())
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.first().unwrap()["total"], 2);
        assert_eq!(lines.last().unwrap()["done"], true);
        assert_eq!(lines.len(), 4);
    }
}
