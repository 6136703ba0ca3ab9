//! 本地缓存
//!
//! `CacheService` 在任意 `StorageBackend` 上提供带有效期的键值缓存，
//! 条目形如 `{ "<payload>": ..., "timestamp": <ms> }`。
//! 会话缓存（LocalStorage）与 API 响应缓存（内存）都是它的实例。

use std::rc::Rc;
use std::time::Duration;

use agriwaste_shared::{Identity, IdentitySnapshot, Provenance, Timestamp};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::runtime::SharedRuntime;
use crate::web::storage::{MemoryStorage, StorageBackend};

pub const SESSION_KEY: &str = "agriWasteUserSession";

const TIMESTAMP_FIELD: &str = "timestamp";

#[derive(Clone)]
pub struct CacheService {
    storage: Rc<dyn StorageBackend>,
    runtime: SharedRuntime,
    payload_field: &'static str,
}

impl CacheService {
    pub fn new(storage: Rc<dyn StorageBackend>, runtime: SharedRuntime) -> Self {
        Self {
            storage,
            runtime,
            payload_field: "data",
        }
    }

    /// 进程内缓存（页面刷新即失效）
    pub fn in_memory(runtime: SharedRuntime) -> Self {
        Self::new(Rc::new(MemoryStorage::new()), runtime)
    }

    /// 修改条目中负载字段的名称
    pub fn with_payload_field(mut self, field: &'static str) -> Self {
        self.payload_field = field;
        self
    }

    /// 读取未过期的条目
    ///
    /// 条目缺失、格式损坏或 `now - timestamp >= ttl` 时返回 `None`；过期条目同时被删除。
    pub fn get<T: DeserializeOwned>(&self, key: &str, ttl: Duration) -> Option<T> {
        let mut entry = self.storage.get(key)?;
        let captured = Timestamp::new(entry.get(TIMESTAMP_FIELD)?.as_i64()?);
        if self.runtime.now().since(captured) >= ttl {
            log::debug!("[Cache] Entry `{}` expired", key);
            self.storage.remove(key);
            return None;
        }
        let payload = entry.get_mut(self.payload_field)?.take();
        serde_json::from_value(payload).ok()
    }

    /// 以当前时间写入条目
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> bool {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                log::warn!("[Cache] Failed to serialize `{}`: {}", key, e);
                return false;
            }
        };
        let mut entry = Map::new();
        entry.insert(self.payload_field.to_string(), payload);
        entry.insert(
            TIMESTAMP_FIELD.to_string(),
            Value::from(self.runtime.now().as_millis()),
        );
        self.storage.set(key, &Value::Object(entry))
    }

    pub fn remove(&self, key: &str) {
        self.storage.remove(key);
    }

    pub fn clear(&self) {
        self.storage.clear();
    }

    pub fn runtime(&self) -> &SharedRuntime {
        &self.runtime
    }
}

// =========================================================
// 会话缓存
// =========================================================

/// 最近一次身份的本地副本
///
/// 写入和删除推迟到下一个事件循环执行，不阻塞调用方。
#[derive(Clone)]
pub struct SessionCache {
    cache: CacheService,
    ttl: Duration,
}

impl SessionCache {
    pub fn new(storage: Rc<dyn StorageBackend>, runtime: SharedRuntime, ttl: Duration) -> Self {
        Self {
            cache: CacheService::new(storage, runtime).with_payload_field("user"),
            ttl,
        }
    }

    /// 同步读取未过期的缓存身份（来源标记为 `Cache`）
    pub fn fast_session_check(&self) -> Option<Identity> {
        self.cache
            .get::<IdentitySnapshot>(SESSION_KEY, self.ttl)
            .map(|snapshot| Identity::from_snapshot(snapshot, Provenance::Cache))
    }

    pub fn save(&self, identity: &Identity) {
        let cache = self.cache.clone();
        let snapshot = identity.snapshot();
        self.cache.runtime().spawn(Box::pin(async move {
            cache.set(SESSION_KEY, &snapshot);
        }));
    }

    pub fn clear(&self) {
        let cache = self.cache.clone();
        self.cache.runtime().spawn(Box::pin(async move {
            cache.remove(SESSION_KEY);
        }));
    }
}

// =========================================================
// API 响应缓存
// =========================================================

/// 文本分析结果的缓存键
pub fn text_cache_key(waste_type: &str, quantity: f64) -> String {
    format!("text_{}_{}", waste_type, quantity)
}
