//! 服务配置 (环境变量)

use crate::douban::DoubanMirror;
use crate::http_client::DEFAULT_TIMEOUT_SECONDS;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_CONFIG_PATH: &str = "config.json";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// 监听端口 (`PORT`)
    pub port: u16,
    /// 本地站点配置文件 (`MIXTV_CONFIG`)
    pub config_path: PathBuf,
    /// 订阅地址, 设置后优先于本地文件 (`MIXTV_SUBSCRIPTION`)
    pub subscription_url: Option<String>,
    /// 采集站请求的代理前缀 (`MIXTV_API_PROXY`)
    pub api_proxy: Option<String>,
    /// 单个站点请求超时 (`MIXTV_TIMEOUT_SECS`)
    pub timeout: Duration,
    /// 豆瓣访问方式 (`MIXTV_DOUBAN_MIRROR`, 自定义代理前缀 `MIXTV_DOUBAN_PROXY`)
    pub douban_mirror: DoubanMirror,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        Self {
            port: non_empty("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            config_path: non_empty("MIXTV_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            subscription_url: non_empty("MIXTV_SUBSCRIPTION"),
            api_proxy: non_empty("MIXTV_API_PROXY"),
            timeout: Duration::from_secs(
                non_empty("MIXTV_TIMEOUT_SECS")
                    .and_then(|s| s.parse().ok())
                    .filter(|s| *s > 0)
                    .unwrap_or(DEFAULT_TIMEOUT_SECONDS),
            ),
            douban_mirror: DoubanMirror::from_setting(
                non_empty("MIXTV_DOUBAN_MIRROR").as_deref(),
                non_empty("MIXTV_DOUBAN_PROXY"),
            ),
        }
    }
}
