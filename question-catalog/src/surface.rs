//! 界面副作用：滚动定位、高亮样式、剪贴板。

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::error::{CatalogError, Result};

/// 高亮时加在题目卡片上的 CSS 类
pub const HIGHLIGHT_CLASS: &str = "question-highlight";

/// 题目卡片元素 id
pub fn element_id(question_id: &str) -> String {
    format!("question-{}", question_id)
}

/// 控制器需要的界面操作
pub trait Surface {
    /// 把题目卡片滚动到视口中；找不到元素时返回 false
    fn scroll_into_view(&mut self, question_id: &str) -> bool;
    /// 添加或移除高亮
    fn set_emphasis(&mut self, question_id: &str, on: bool);
    /// 以纯文本写入剪贴板。写入可能是异步的，完成或失败后调用 `done`
    fn copy_text(&mut self, text: &str, done: CopyDone);
}

/// 剪贴板写入结束后的回调
pub type CopyDone = Box<dyn FnOnce(Result<()>)>;

/// 测试界面的剪贴板行为
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CopyMode {
    /// 立即成功
    #[default]
    Succeed,
    /// 立即失败
    Fail,
    /// 挂起，直到 `finish_copy`
    Defer,
}

/// 记录下来的界面操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceEvent {
    Scrolled(String),
    Emphasis(String, bool),
    Copied(String),
}

#[derive(Default)]
struct Recorded {
    events: Vec<SurfaceEvent>,
    rendered: Option<Vec<String>>,
    clipboard: Option<String>,
    copy_mode: CopyMode,
    pending_copies: VecDeque<(String, CopyDone)>,
}

/// 只记录操作的界面实现，克隆出的句柄共享记录
#[derive(Clone, Default)]
pub struct RecordingSurface {
    inner: Rc<RefCell<Recorded>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// 限定已渲染的题目，其余 id 滚动时视为找不到元素
    pub fn with_rendered(ids: &[&str]) -> Self {
        let surface = Self::default();
        surface.inner.borrow_mut().rendered = Some(ids.iter().map(|id| id.to_string()).collect());
        surface
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.inner.borrow().events.clone()
    }

    pub fn clipboard(&self) -> Option<String> {
        self.inner.borrow().clipboard.clone()
    }

    pub fn set_copy_mode(&self, mode: CopyMode) {
        self.inner.borrow_mut().copy_mode = mode;
    }

    /// 结束最早挂起的一次写入，没有挂起的写入时返回 false
    pub fn finish_copy(&self, result: Result<()>) -> bool {
        let pending = self.inner.borrow_mut().pending_copies.pop_front();
        let Some((text, done)) = pending else {
            return false;
        };
        if result.is_ok() {
            self.record_copy(&text);
        }
        done(result);
        true
    }

    fn record_copy(&self, text: &str) {
        let mut inner = self.inner.borrow_mut();
        inner.clipboard = Some(text.to_string());
        inner.events.push(SurfaceEvent::Copied(text.to_string()));
    }
}

impl Surface for RecordingSurface {
    fn scroll_into_view(&mut self, question_id: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let found = inner
            .rendered
            .as_ref()
            .map_or(true, |ids| ids.iter().any(|id| id == question_id));
        if found {
            inner.events.push(SurfaceEvent::Scrolled(question_id.to_string()));
        }
        found
    }

    fn set_emphasis(&mut self, question_id: &str, on: bool) {
        self.inner
            .borrow_mut()
            .events
            .push(SurfaceEvent::Emphasis(question_id.to_string(), on));
    }

    fn copy_text(&mut self, text: &str, done: CopyDone) {
        let mode = self.inner.borrow().copy_mode;
        match mode {
            CopyMode::Succeed => {
                self.record_copy(text);
                done(Ok(()));
            }
            CopyMode::Fail => done(Err(CatalogError::Browser("剪贴板不可用".to_string()))),
            CopyMode::Defer => self
                .inner
                .borrow_mut()
                .pending_copies
                .push_back((text.to_string(), done)),
        }
    }
}

/// 浏览器 DOM 实现
pub struct BrowserSurface {
    window: web_sys::Window,
}

impl BrowserSurface {
    pub fn new(window: web_sys::Window) -> Self {
        Self { window }
    }

    fn element(&self, question_id: &str) -> Option<web_sys::Element> {
        self.window
            .document()
            .and_then(|document| document.get_element_by_id(&element_id(question_id)))
    }
}

impl Surface for BrowserSurface {
    fn scroll_into_view(&mut self, question_id: &str) -> bool {
        match self.element(question_id) {
            Some(element) => {
                let options = web_sys::ScrollIntoViewOptions::new();
                options.set_behavior(web_sys::ScrollBehavior::Smooth);
                options.set_block(web_sys::ScrollLogicalPosition::Center);
                element.scroll_into_view_with_scroll_into_view_options(&options);
                true
            }
            None => false,
        }
    }

    fn set_emphasis(&mut self, question_id: &str, on: bool) {
        if let Some(element) = self.element(question_id) {
            let classes = element.class_list();
            let result = if on {
                classes.add_1(HIGHLIGHT_CLASS)
            } else {
                classes.remove_1(HIGHLIGHT_CLASS)
            };
            if let Err(e) = result {
                crate::logging::warn(&format!("切换高亮样式失败: {:?}", e));
            }
        }
    }

    fn copy_text(&mut self, text: &str, done: CopyDone) {
        if text.is_empty() {
            done(Err(CatalogError::Browser("没有可复制的内容".to_string())));
            return;
        }
        let promise = self.window.navigator().clipboard().write_text(text);
        wasm_bindgen_futures::spawn_local(async move {
            let result = wasm_bindgen_futures::JsFuture::from(promise)
                .await
                .map(|_| ())
                .map_err(|e| CatalogError::Browser(format!("写入剪贴板失败: {:?}", e)));
            done(result);
        });
    }
}
