//! 过期查询抑制
//! 同一会话内后发起的查询总是覆盖先发起的查询, 与完成顺序无关

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::debug;

/// 查询凭据, 编号单调递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

struct Accepted<T> {
    ticket: u64,
    value: Option<T>,
}

/// 只接受最新一次查询的结果
pub struct QueryGuard<T> {
    latest: AtomicU64,
    accepted: RwLock<Accepted<T>>,
}

impl<T> Default for QueryGuard<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> QueryGuard<T> {
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
            accepted: RwLock::new(Accepted {
                ticket: 0,
                value: None,
            }),
        }
    }

    /// 开始一次新查询, 之前发出的凭据全部失效
    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// 提交结果; 已被更新的查询取代时丢弃并返回 false
    pub async fn commit(&self, ticket: Ticket, value: T) -> bool {
        let mut accepted = self.accepted.write().await;
        if !self.is_current(ticket) || ticket.0 <= accepted.ticket {
            debug!("丢弃过期查询结果 #{}", ticket.0);
            return false;
        }
        accepted.ticket = ticket.0;
        accepted.value = Some(value);
        true
    }
}

impl<T: Clone> QueryGuard<T> {
    /// 最近一次被接受的结果
    pub async fn current(&self) -> Option<T> {
        self.accepted.read().await.value.clone()
    }
}

/// 按会话 id 划分的查询守卫
pub struct SessionGuards<T> {
    guards: Mutex<HashMap<String, Arc<QueryGuard<T>>>>,
    capacity: usize,
}

impl<T> SessionGuards<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            guards: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    /// 获取 (或创建) 会话的守卫; 超出容量时清空旧会话
    pub fn get(&self, session: &str) -> Arc<QueryGuard<T>> {
        let mut guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        if !guards.contains_key(session) && guards.len() >= self.capacity {
            debug!("会话数量达到上限 {}, 清空", self.capacity);
            guards.clear();
        }
        guards
            .entry(session.to_string())
            .or_insert_with(|| Arc::new(QueryGuard::new()))
            .clone()
    }

    /// 只查询, 不创建
    pub fn find(&self, session: &str) -> Option<Arc<QueryGuard<T>>> {
        let guards = self.guards.lock().unwrap_or_else(|e| e.into_inner());
        guards.get(session).cloned()
    }
}
