//! 站点注册表
//! 启动时从订阅地址或本地配置文件加载, 运行期间只读

use crate::config::Config;
use crate::http_client::HttpClient;
use crate::subscription::{fetch_subscription, parse_config, Subscription};
use crate::types::SiteDescriptor;
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// 内置默认站点
static DEFAULT_SITES: Lazy<Vec<SiteDescriptor>> = Lazy::new(|| {
    vec![SiteDescriptor::new(
        "lizi",
        "栗子资源",
        "https://api.lziapi.com/api.php/provide/vod/",
    )]
});

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteRegistry {
    sites: Vec<SiteDescriptor>,
}

impl SiteRegistry {
    pub fn new(sites: Vec<SiteDescriptor>) -> Self {
        Self { sites }
    }

    pub fn defaults() -> Self {
        Self::new(DEFAULT_SITES.clone())
    }

    pub fn from_subscription(subscription: &Subscription) -> Self {
        Self::new(subscription.sites())
    }

    pub fn all(&self) -> &[SiteDescriptor] {
        &self.sites
    }

    /// 未禁用的站点
    pub fn enabled(&self) -> Vec<SiteDescriptor> {
        self.sites.iter().filter(|s| !s.disabled).cloned().collect()
    }

    /// 按 key 查找启用的站点, 禁用的站点视为不存在
    pub fn get(&self, key: &str) -> Option<&SiteDescriptor> {
        self.sites.iter().find(|s| !s.disabled && s.key == key)
    }

    /// 按 key 挑选启用的站点, 保持注册表顺序
    pub fn select(&self, keys: &[String]) -> Vec<SiteDescriptor> {
        self.sites
            .iter()
            .filter(|s| !s.disabled && keys.contains(&s.key))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

/// 加载注册表: 订阅地址 > 本地配置文件 > 内置默认站点
pub async fn load_registry(config: &Config, http: &HttpClient) -> SiteRegistry {
    if let Some(url) = &config.subscription_url {
        info!("📡 正在拉取订阅: {}", url);
        match fetch_subscription(http, url).await {
            Ok(subscription) if !subscription.api_site.is_empty() => {
                return SiteRegistry::from_subscription(&subscription);
            }
            Ok(_) => warn!("⚠️ 订阅中没有站点"),
            Err(e) => warn!("⚠️ 拉取订阅失败: {}", e),
        }
    }

    match load_from_file(&config.config_path) {
        Ok(registry) if !registry.is_empty() => {
            info!("📦 从 {} 加载站点配置", config.config_path.display());
            return registry;
        }
        Ok(_) => warn!("配置文件 {} 中没有站点", config.config_path.display()),
        Err(e) => warn!("读取配置文件 {} 失败: {}", config.config_path.display(), e),
    }

    info!("使用内置默认站点");
    SiteRegistry::defaults()
}

fn load_from_file(path: &Path) -> anyhow::Result<SiteRegistry> {
    let content = fs::read_to_string(path)?;
    Ok(SiteRegistry::from_subscription(&parse_config(&content)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::douban::DoubanMirror;
    use std::path::PathBuf;
    use std::time::Duration;

    fn registry() -> SiteRegistry {
        let mut disabled = SiteDescriptor::new("b", "B", "https://b.example/");
        disabled.disabled = true;
        SiteRegistry::new(vec![
            SiteDescriptor::new("a", "A", "https://a.example/"),
            disabled,
            SiteDescriptor::new("c", "C", "https://c.example/"),
        ])
    }

    #[test]
    fn test_enabled_and_select() {
        let registry = registry();
        let enabled: Vec<String> = registry.enabled().into_iter().map(|s| s.key).collect();
        assert_eq!(enabled, vec!["a", "c"]);

        let selected: Vec<String> = registry
            .select(&["c".to_string(), "b".to_string(), "a".to_string()])
            .into_iter()
            .map(|s| s.key)
            .collect();
        assert_eq!(selected, vec!["a", "c"]);

        assert_eq!(registry.get("a").map(|s| s.name.as_str()), Some("A"));
        assert!(registry.get("b").is_none());
        assert!(registry.get("zz").is_none());
        assert_eq!(registry.all().len(), 3);
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let config = Config {
            port: 0,
            config_path: PathBuf::from("/nonexistent/mixtv/config.json"),
            subscription_url: None,
            api_proxy: None,
            timeout: Duration::from_secs(1),
            douban_mirror: DoubanMirror::default(),
        };
        let http = HttpClient::new(config.timeout, None).unwrap();
        let registry = load_registry(&config, &http).await;
        assert_eq!(registry, SiteRegistry::defaults());
        assert_eq!(registry.all()[0].key, "lizi");
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"api_site":{"x":{"name":"X","api":"https://x.example/"}}}"#,
        )
        .unwrap();

        let config = Config {
            port: 0,
            config_path: path.clone(),
            subscription_url: None,
            api_proxy: None,
            timeout: Duration::from_secs(1),
            douban_mirror: DoubanMirror::default(),
        };
        let http = HttpClient::new(config.timeout, None).unwrap();
        let registry = load_registry(&config, &http).await;

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("x").unwrap().api, "https://x.example/");
    }
}
