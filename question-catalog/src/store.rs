//! 题库快照存储：单一槽位，整体覆盖写入。

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{CatalogError, Result};

/// 快照持久化接口，读写的是序列化后的整份快照
pub trait SnapshotStore {
    /// 读取快照，槽位为空时返回 `None`
    fn load(&self) -> Result<Option<String>>;
    /// 写入快照，替换之前的内容
    fn save(&mut self, snapshot: &str) -> Result<()>;
}

/// 内存存储 - 克隆出的句柄共享同一个槽位，便于测试中观察写入结果
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    slot: Rc<RefCell<Option<String>>>,
    writes: Rc<RefCell<usize>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以已有快照内容初始化
    pub fn with_snapshot(snapshot: &str) -> Self {
        let store = Self::default();
        *store.slot.borrow_mut() = Some(snapshot.to_string());
        store
    }

    /// 当前槽位内容
    pub fn snapshot(&self) -> Option<String> {
        self.slot.borrow().clone()
    }

    /// 累计写入次数
    pub fn write_count(&self) -> usize {
        *self.writes.borrow()
    }
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Result<Option<String>> {
        Ok(self.slot.borrow().clone())
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        *self.slot.borrow_mut() = Some(snapshot.to_string());
        *self.writes.borrow_mut() += 1;
        Ok(())
    }
}

/// 浏览器 localStorage 存储
pub struct LocalStorageStore {
    storage: web_sys::Storage,
    key: String,
}

impl LocalStorageStore {
    /// 打开当前窗口的 localStorage
    pub fn open(key: &str) -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CatalogError::Browser("window 不可用".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(|e| CatalogError::Storage(format!("无法访问 localStorage: {:?}", e)))?
            .ok_or_else(|| CatalogError::Storage("localStorage 不可用".to_string()))?;

        Ok(Self {
            storage,
            key: key.to_string(),
        })
    }
}

impl SnapshotStore for LocalStorageStore {
    fn load(&self) -> Result<Option<String>> {
        self.storage
            .get_item(&self.key)
            .map_err(|e| CatalogError::Storage(format!("读取快照失败: {:?}", e)))
    }

    fn save(&mut self, snapshot: &str) -> Result<()> {
        self.storage
            .set_item(&self.key, snapshot)
            .map_err(|e| CatalogError::Storage(format!("写入快照失败: {:?}", e)))
    }
}
