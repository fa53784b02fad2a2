//! 地址栏状态的抽象：读取、写入查询参数，订阅外部导航（前进/后退）。

use std::cell::RefCell;
use std::rc::Rc;

use url::form_urlencoded;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::error::{CatalogError, Result};

/// 外部导航发生后的回调
pub type NavigationListener = Rc<dyn Fn()>;

/// 有序的查询参数列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// 解析 `?a=1&b=2` 或 `a=1&b=2`
    pub fn parse(search: &str) -> Self {
        let search = search.strip_prefix('?').unwrap_or(search);
        Self {
            pairs: form_urlencoded::parse(search.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        }
    }

    /// 取第一个同名参数
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// 设置参数：替换第一个同名参数并去掉其余同名项，不存在则追加
    pub fn set(&mut self, key: &str, value: &str) {
        let mut replaced = false;
        self.pairs.retain_mut(|(k, v)| {
            if k != key {
                return true;
            }
            if replaced {
                return false;
            }
            *v = value.to_string();
            replaced = true;
            true
        });
        if !replaced {
            self.pairs.push((key.to_string(), value.to_string()));
        }
    }

    /// 删除所有同名参数
    pub fn remove(&mut self, key: &str) {
        self.pairs.retain(|(k, _)| k != key);
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// 编码为 `?a=1&b=2`，没有参数时为空字符串
    pub fn to_query_string(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs.iter())
            .finish();
        format!("?{}", encoded)
    }
}

/// 地址栏接口
pub trait Navigation {
    /// 当前查询参数
    fn read(&self) -> QueryParams;
    /// 写入查询参数（新增历史记录，不刷新页面，不触发订阅回调）
    fn write(&mut self, params: &QueryParams);
    /// 当前完整地址
    fn href(&self) -> String;
    /// 订阅外部导航（前进、后退等）
    fn subscribe(&mut self, listener: NavigationListener);
}

#[derive(Default)]
struct MemoryHistory {
    entries: Vec<QueryParams>,
    cursor: usize,
    listeners: Vec<NavigationListener>,
}

/// 内存中的地址栏与历史记录，克隆出的句柄共享同一份状态
#[derive(Clone)]
pub struct MemoryNavigation {
    base_url: String,
    history: Rc<RefCell<MemoryHistory>>,
}

impl MemoryNavigation {
    /// `base_url` 为不含查询串的地址，如 `https://example.com/`
    pub fn new(base_url: &str) -> Self {
        Self::with_search(base_url, "")
    }

    /// 以初始查询串创建
    pub fn with_search(base_url: &str, search: &str) -> Self {
        let history = MemoryHistory {
            entries: vec![QueryParams::parse(search)],
            cursor: 0,
            listeners: Vec::new(),
        };
        Self {
            base_url: base_url.to_string(),
            history: Rc::new(RefCell::new(history)),
        }
    }

    /// 模拟外部导航（例如打开一个深链接），会通知订阅者
    pub fn navigate(&self, search: &str) {
        self.push(QueryParams::parse(search));
        self.notify();
    }

    /// 后退一步；已在最早的记录时返回 false
    pub fn back(&self) -> bool {
        let moved = {
            let mut history = self.history.borrow_mut();
            if history.cursor == 0 {
                false
            } else {
                history.cursor -= 1;
                true
            }
        };
        if moved {
            self.notify();
        }
        moved
    }

    /// 前进一步；已在最新的记录时返回 false
    pub fn forward(&self) -> bool {
        let moved = {
            let mut history = self.history.borrow_mut();
            if history.cursor + 1 >= history.entries.len() {
                false
            } else {
                history.cursor += 1;
                true
            }
        };
        if moved {
            self.notify();
        }
        moved
    }

    /// 历史记录条数
    pub fn len(&self) -> usize {
        self.history.borrow().entries.len()
    }

    fn push(&self, params: QueryParams) {
        let mut history = self.history.borrow_mut();
        let cursor = history.cursor;
        history.entries.truncate(cursor + 1);
        history.entries.push(params);
        history.cursor = cursor + 1;
    }

    // 回调可能再次读取地址栏，先释放借用
    fn notify(&self) {
        let listeners = self.history.borrow().listeners.clone();
        for listener in listeners {
            listener();
        }
    }
}

impl Navigation for MemoryNavigation {
    fn read(&self) -> QueryParams {
        let history = self.history.borrow();
        history.entries[history.cursor].clone()
    }

    fn write(&mut self, params: &QueryParams) {
        if self.read() == *params {
            return;
        }
        self.push(params.clone());
    }

    fn href(&self) -> String {
        format!("{}{}", self.base_url, self.read().to_query_string())
    }

    fn subscribe(&mut self, listener: NavigationListener) {
        self.history.borrow_mut().listeners.push(listener);
    }
}

/// 拼出 pushState 用的相对地址，保留原有的 hash
fn relative_url(pathname: &str, params: &QueryParams, hash: &str) -> String {
    format!("{}{}{}", pathname, params.to_query_string(), hash)
}

/// 浏览器地址栏：`location` + `history.pushState` + `popstate`
pub struct BrowserNavigation {
    window: web_sys::Window,
}

impl BrowserNavigation {
    pub fn new() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CatalogError::Browser("window 不可用".to_string()))?;
        Ok(Self { window })
    }

    fn location_part(&self, part: fn(&web_sys::Location) -> std::result::Result<String, JsValue>) -> String {
        part(&self.window.location()).unwrap_or_default()
    }
}

impl Navigation for BrowserNavigation {
    fn read(&self) -> QueryParams {
        QueryParams::parse(&self.location_part(web_sys::Location::search))
    }

    fn write(&mut self, params: &QueryParams) {
        if self.read() == *params {
            return;
        }

        let url = relative_url(
            &self.location_part(web_sys::Location::pathname),
            params,
            &self.location_part(web_sys::Location::hash),
        );
        let pushed = self
            .window
            .history()
            .and_then(|history| history.push_state_with_url(&JsValue::NULL, "", Some(&url)));
        if let Err(e) = pushed {
            crate::logging::warn(&format!("更新地址栏失败: {:?}", e));
        }
    }

    fn href(&self) -> String {
        self.location_part(web_sys::Location::href)
    }

    fn subscribe(&mut self, listener: NavigationListener) {
        let callback = Closure::wrap(Box::new(move |_event: web_sys::Event| {
            listener();
        }) as Box<dyn FnMut(web_sys::Event)>);

        if let Err(e) = self
            .window
            .add_event_listener_with_callback("popstate", callback.as_ref().unchecked_ref())
        {
            crate::logging::warn(&format!("注册 popstate 监听失败: {:?}", e));
        }
        // 监听与页面同寿命
        callback.forget();
    }
}
