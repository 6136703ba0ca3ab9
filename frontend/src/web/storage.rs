//! 键值存储后端
//!
//! 浏览器中使用 `gloo-storage` 封装的 LocalStorage；测试和内存缓存使用 `MemoryStorage`。
//! 值统一以 JSON 形式存取。

use std::cell::RefCell;
use std::collections::HashMap;

use gloo_storage::Storage;
use serde_json::Value;

pub trait StorageBackend {
    /// 读取并解析；键不存在或内容不是合法 JSON 时返回 `None`
    fn get(&self, key: &str) -> Option<Value>;
    /// 写入，失败时返回 `false`（如配额已满或隐私模式）
    fn set(&self, key: &str, value: &Value) -> bool;
    fn remove(&self, key: &str);
    fn clear(&self);
}

/// 浏览器 LocalStorage
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalStorage;

impl StorageBackend for LocalStorage {
    fn get(&self, key: &str) -> Option<Value> {
        gloo_storage::LocalStorage::get::<Value>(key).ok()
    }

    fn set(&self, key: &str, value: &Value) -> bool {
        match gloo_storage::LocalStorage::set(key, value) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[Storage] Failed to write `{}`: {}", key, e);
                false
            }
        }
    }

    fn remove(&self, key: &str) {
        gloo_storage::LocalStorage::delete(key);
    }

    fn clear(&self) {
        gloo_storage::LocalStorage::clear();
    }
}

/// 进程内存储
///
/// 以序列化文本保存，读写行为与 LocalStorage 一致（每次读取得到新副本）。
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入原始文本（测试中用于构造损坏数据）
    pub fn set_raw(&self, key: &str, raw: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), raw.to_string());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.items.borrow().contains_key(key)
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Option<Value> {
        let items = self.items.borrow();
        serde_json::from_str(items.get(key)?).ok()
    }

    fn set(&self, key: &str, value: &Value) -> bool {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        true
    }

    fn remove(&self, key: &str) {
        self.items.borrow_mut().remove(key);
    }

    fn clear(&self) {
        self.items.borrow_mut().clear();
    }
}
