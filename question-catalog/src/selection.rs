//! 选择与高亮状态控制器。
//!
//! 地址栏中的 `q` 参数是跨导航状态的唯一来源：挂载和每次外部导航时
//! 重新从地址栏推导状态；切换分类、分享等用户操作会先写回地址栏。

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::Serialize;
use utils_common::{Category, Question};

use crate::catalog::QuestionLookup;
use crate::config::SelectionConfig;
use crate::error::{CatalogError, Result};
use crate::logging;
use crate::navigation::{Navigation, NavigationListener};
use crate::scheduler::{Scheduler, TimerToken};
use crate::surface::Surface;

/// 单个高亮的生命周期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HighlightPhase {
    /// 没有高亮
    NoSelection,
    /// 已选中，等待界面渲染后滚动定位
    PendingScroll,
    /// 已滚动并高亮，等待自动清除
    Settled,
}

/// 当前界面选择状态，只存在于页面会话中
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionState {
    pub active_category: Category,
    pub highlighted_question_id: Option<String>,
    pub open_question_id: Option<String>,
    pub highlight_phase: HighlightPhase,
    pub copied_question_id: Option<String>,
}

impl SelectionState {
    fn new(category: Category) -> Self {
        Self {
            active_category: category,
            highlighted_question_id: None,
            open_question_id: None,
            highlight_phase: HighlightPhase::NoSelection,
            copied_question_id: None,
        }
    }
}

/// 状态变化后的通知，附带当前分类下的题目。
/// 回调运行时控制器仍被借用，需要的数据都从参数中取。
pub type SelectionObserver = Box<dyn Fn(&SelectionState, &[Question])>;

// 剪贴板写入结果：(题目 id, 结果)
type CopyResults = Rc<RefCell<Vec<(String, Result<()>)>>>;

/// 选择状态控制器
pub struct SelectionController {
    config: SelectionConfig,
    state: SelectionState,
    lookup: Box<dyn QuestionLookup>,
    navigation: Box<dyn Navigation>,
    scheduler: Box<dyn Scheduler>,
    surface: Box<dyn Surface>,
    observer: Option<SelectionObserver>,
    handle: Weak<RefCell<SelectionController>>,
    copy_results: CopyResults,
}

impl SelectionController {
    pub fn new(
        config: SelectionConfig,
        lookup: Box<dyn QuestionLookup>,
        navigation: Box<dyn Navigation>,
        scheduler: Box<dyn Scheduler>,
        surface: Box<dyn Surface>,
    ) -> Self {
        Self {
            state: SelectionState::new(config.default_category),
            config,
            lookup,
            navigation,
            scheduler,
            surface,
            observer: None,
            handle: Weak::new(),
            copy_results: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// 设置状态变化回调。回调内不要再次调用控制器。
    pub fn set_observer(&mut self, observer: SelectionObserver) {
        self.observer = Some(observer);
    }

    /// 订阅外部导航，每次导航后从地址栏重新推导状态。
    /// 异步完成的剪贴板写入也经由这里登记的句柄回到控制器。
    pub fn attach(controller: &Rc<RefCell<Self>>) {
        let weak = Rc::downgrade(controller);
        controller.borrow_mut().handle = weak.clone();
        let listener: NavigationListener = Rc::new(move || {
            let Some(controller) = weak.upgrade() else {
                return;
            };
            match controller.try_borrow_mut() {
                Ok(mut controller) => controller.sync_from_url(),
                Err(_) => logging::warn("控制器正忙，忽略本次导航事件"),
            };
        });
        controller.borrow_mut().navigation.subscribe(listener);
    }

    /// 挂载：从当前地址栏推导初始状态
    pub fn mount(&mut self) {
        self.sync_from_url();
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    /// 当前分类下的题目
    pub fn visible_questions(&self) -> Vec<Question> {
        self.lookup.questions_in(self.state.active_category)
    }

    /// 从地址栏的题目参数推导选择状态；无法解析的 id 按未选中处理
    pub fn sync_from_url(&mut self) {
        match self.resolve_selection() {
            Ok(Some(question)) => self.select(question),
            Ok(None) => self.clear_selection(),
            Err(e) => {
                logging::log(&format!("忽略地址栏中的选择: {}", e));
                self.clear_selection();
            }
        }
        self.notify();
    }

    /// 用户手动切换分类：去掉地址栏中的题目参数并清除选择
    pub fn select_category(&mut self, category: Category) {
        let mut params = self.navigation.read();
        params.remove(&self.config.query_param);
        self.navigation.write(&params);

        self.clear_selection();
        self.state.active_category = category;
        self.notify();
    }

    /// 分享题目：写入地址栏并复制完整链接，复制成功后才显示“已复制”提示。
    /// 不改变题目的展开状态。
    pub fn share(&mut self, question_id: &str) -> Result<String> {
        if self.lookup.find_question(question_id).is_none() {
            return Err(CatalogError::NotFound(question_id.to_string()));
        }

        let mut params = self.navigation.read();
        params.set(&self.config.query_param, question_id);
        self.navigation.write(&params);

        let url = self.navigation.href();
        let results = self.copy_results.clone();
        let handle = self.handle.clone();
        let shared_id = question_id.to_string();
        self.surface.copy_text(
            &url,
            Box::new(move |result: Result<()>| {
                results.borrow_mut().push((shared_id, result));
                // 同步完成时控制器仍被借用，交给下面的 apply_copy_results
                if let Some(controller) = handle.upgrade() {
                    if let Ok(mut controller) = controller.try_borrow_mut() {
                        controller.apply_copy_results();
                    }
                }
            }),
        );
        self.apply_copy_results();

        Ok(url)
    }

    /// 展开或收起题目，同一时间只展开一道。返回该题目现在是否展开。
    pub fn toggle_question(&mut self, question_id: &str) -> bool {
        let is_open = self.state.open_question_id.as_deref() == Some(question_id);
        self.state.open_question_id = if is_open {
            None
        } else {
            Some(question_id.to_string())
        };
        self.notify();
        !is_open
    }

    /// 定时任务到期
    pub fn on_timer(&mut self, token: TimerToken) {
        match token {
            TimerToken::RevealSelection => self.reveal(),
            TimerToken::ClearHighlight => self.settle(),
            TimerToken::ClearCopied => {
                self.state.copied_question_id = None;
            }
        }
        self.notify();
    }

    // 处理已结束的剪贴板写入
    fn apply_copy_results(&mut self) {
        let results: Vec<_> = self.copy_results.borrow_mut().drain(..).collect();
        if results.is_empty() {
            return;
        }
        for (question_id, result) in results {
            match result {
                Ok(()) => {
                    self.state.copied_question_id = Some(question_id);
                    self.scheduler
                        .schedule(TimerToken::ClearCopied, self.config.copied_ms);
                }
                Err(e) => logging::warn(&format!("复制分享链接失败 {}: {}", question_id, e)),
            }
        }
        self.notify();
    }

    fn resolve_selection(&self) -> Result<Option<Question>> {
        let params = self.navigation.read();
        // 空白值视为没有选择，其余按原样查找
        let id = match params.get(&self.config.query_param) {
            Some(id) if !id.trim().is_empty() => id,
            _ => return Ok(None),
        };

        self.lookup
            .find_question(id)
            .map(Some)
            .ok_or_else(|| CatalogError::MalformedSelection(id.to_string()))
    }

    fn select(&mut self, question: Question) {
        self.drop_highlight();

        self.state.active_category = question.category;
        self.state.highlighted_question_id = Some(question.id.clone());
        self.state.open_question_id = Some(question.id);
        self.state.highlight_phase = HighlightPhase::PendingScroll;

        self.scheduler
            .schedule(TimerToken::RevealSelection, self.config.reveal_delay_ms);
    }

    fn clear_selection(&mut self) {
        self.drop_highlight();
        self.state.open_question_id = None;
    }

    // 去掉当前高亮并取消相关定时任务
    fn drop_highlight(&mut self) {
        self.scheduler.cancel(TimerToken::RevealSelection);
        self.scheduler.cancel(TimerToken::ClearHighlight);

        if let Some(id) = self.state.highlighted_question_id.take() {
            if self.state.highlight_phase == HighlightPhase::Settled {
                self.surface.set_emphasis(&id, false);
            }
        }
        self.state.highlight_phase = HighlightPhase::NoSelection;
    }

    fn reveal(&mut self) {
        if self.state.highlight_phase != HighlightPhase::PendingScroll {
            return;
        }
        let Some(id) = self.state.highlighted_question_id.clone() else {
            return;
        };

        if self.surface.scroll_into_view(&id) {
            self.surface.set_emphasis(&id, true);
            self.state.highlight_phase = HighlightPhase::Settled;
            self.scheduler
                .schedule(TimerToken::ClearHighlight, self.config.highlight_ms);
        } else {
            logging::warn(&format!("找不到题目卡片，跳过高亮: {}", id));
            self.state.highlighted_question_id = None;
            self.state.highlight_phase = HighlightPhase::NoSelection;
        }
    }

    fn settle(&mut self) {
        if self.state.highlight_phase != HighlightPhase::Settled {
            return;
        }
        if let Some(id) = self.state.highlighted_question_id.take() {
            self.surface.set_emphasis(&id, false);
        }
        self.state.highlight_phase = HighlightPhase::NoSelection;
    }

    fn notify(&self) {
        if let Some(observer) = &self.observer {
            observer(&self.state, &self.visible_questions());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::sample_catalog;
    use crate::catalog::QuestionCatalog;
    use crate::navigation::MemoryNavigation;
    use crate::scheduler::ManualScheduler;
    use crate::surface::{CopyMode, RecordingSurface, SurfaceEvent};
    use std::cell::Cell;

    const BASE: &str = "https://interview.example/";

    struct Harness {
        controller: Rc<RefCell<SelectionController>>,
        nav: MemoryNavigation,
        scheduler: ManualScheduler,
        surface: RecordingSurface,
    }

    impl Harness {
        fn mount(search: &str) -> Self {
            Self::mount_with(sample_catalog(), search, RecordingSurface::new())
        }

        fn mount_with(catalog: QuestionCatalog, search: &str, surface: RecordingSurface) -> Self {
            let nav = MemoryNavigation::with_search(BASE, search);
            let scheduler = ManualScheduler::new();
            let controller = Rc::new(RefCell::new(SelectionController::new(
                SelectionConfig::default(),
                Box::new(catalog),
                Box::new(nav.clone()),
                Box::new(scheduler.clone()),
                Box::new(surface.clone()),
            )));
            SelectionController::attach(&controller);
            controller.borrow_mut().mount();

            Self {
                controller,
                nav,
                scheduler,
                surface,
            }
        }

        fn state(&self) -> SelectionState {
            self.controller.borrow().state().clone()
        }

        fn run_timers(&self, ms: u64) {
            for token in self.scheduler.advance(ms) {
                self.controller.borrow_mut().on_timer(token);
            }
        }

        fn url_param(&self) -> Option<String> {
            self.nav.read().get("q").map(str::to_string)
        }
    }

    #[test]
    fn deep_link_selects_and_opens_question() {
        let only_42 = r#"{"questions": [
            {"id": "42", "title": "Parking Lot", "description": "d", "category": "low-level-design",
             "difficulty": "medium", "tags": []}
        ]}"#;
        let catalog = QuestionCatalog::from_documents(&[only_42]).unwrap();
        let h = Harness::mount_with(catalog, "?q=42", RecordingSurface::new());

        let state = h.state();
        assert_eq!(state.active_category, Category::LowLevelDesign);
        assert_eq!(state.open_question_id.as_deref(), Some("42"));
        assert_eq!(state.highlighted_question_id.as_deref(), Some("42"));
        assert_eq!(state.highlight_phase, HighlightPhase::PendingScroll);
    }

    #[test]
    fn highlight_runs_its_lifecycle() {
        let h = Harness::mount("?q=42");
        assert!(h.surface.events().is_empty());

        h.run_timers(100);
        assert_eq!(h.state().highlight_phase, HighlightPhase::Settled);
        assert_eq!(
            h.surface.events(),
            vec![
                SurfaceEvent::Scrolled("42".to_string()),
                SurfaceEvent::Emphasis("42".to_string(), true),
            ]
        );

        h.run_timers(2000);
        let state = h.state();
        assert_eq!(state.highlight_phase, HighlightPhase::NoSelection);
        assert_eq!(state.highlighted_question_id, None);
        assert_eq!(state.open_question_id.as_deref(), Some("42"));
        assert_eq!(
            h.surface.events().last(),
            Some(&SurfaceEvent::Emphasis("42".to_string(), false))
        );
    }

    #[test]
    fn manual_category_clears_url_and_selection() {
        let h = Harness::mount("?q=42");
        h.controller.borrow_mut().select_category(Category::HighLevelDesign);

        let state = h.state();
        assert_eq!(h.url_param(), None);
        assert_eq!(state.active_category, Category::HighLevelDesign);
        assert_eq!(state.open_question_id, None);
        assert_eq!(state.highlighted_question_id, None);
        assert!(!h.scheduler.is_pending(TimerToken::RevealSelection));
    }

    #[test]
    fn no_selection_is_idempotent() {
        let h = Harness::mount("");
        for _ in 0..2 {
            h.controller.borrow_mut().sync_from_url();
            let state = h.state();
            assert_eq!(state.highlighted_question_id, None);
            assert_eq!(state.open_question_id, None);
            assert_eq!(state.active_category, Category::DataStructures);
        }
    }

    #[test]
    fn unknown_or_empty_id_is_treated_as_absent() {
        for search in ["?q=nope", "?q=", "?q=%20", "?q=%20lru%20"] {
            let h = Harness::mount(search);
            let state = h.state();
            assert_eq!(state.open_question_id, None);
            assert_eq!(state.highlight_phase, HighlightPhase::NoSelection);
            assert!(!h.scheduler.is_pending(TimerToken::RevealSelection));
        }
    }

    #[test]
    fn back_and_forward_resync_state() {
        let h = Harness::mount("?q=42");
        h.nav.navigate("?q=lru");
        assert_eq!(h.state().active_category, Category::DataStructures);
        assert_eq!(h.state().open_question_id.as_deref(), Some("lru"));

        h.nav.back();
        assert_eq!(h.state().active_category, Category::LowLevelDesign);
        assert_eq!(h.state().open_question_id.as_deref(), Some("42"));

        h.controller.borrow_mut().select_category(Category::HighLevelDesign);
        h.nav.back();
        assert_eq!(h.state().open_question_id.as_deref(), Some("42"));
        h.nav.forward();
        assert_eq!(h.state().open_question_id, None);
    }

    #[test]
    fn newer_selection_supersedes_settled_highlight() {
        let h = Harness::mount("?q=42");
        h.run_timers(100);
        h.nav.navigate("?q=two-sum");

        assert!(!h.scheduler.is_pending(TimerToken::ClearHighlight));
        assert!(h.scheduler.is_pending(TimerToken::RevealSelection));
        assert_eq!(
            h.surface.events().last(),
            Some(&SurfaceEvent::Emphasis("42".to_string(), false))
        );

        h.run_timers(100);
        assert_eq!(h.state().highlighted_question_id.as_deref(), Some("two-sum"));
        assert_eq!(h.state().highlight_phase, HighlightPhase::Settled);
    }

    #[test]
    fn share_writes_url_and_copies_link() {
        let h = Harness::mount("");
        let url = h.controller.borrow_mut().share("url-shortener").unwrap();

        assert_eq!(url, "https://interview.example/?q=url-shortener");
        assert_eq!(h.url_param().as_deref(), Some("url-shortener"));
        assert_eq!(h.surface.clipboard().as_deref(), Some(url.as_str()));

        let state = h.state();
        assert_eq!(state.copied_question_id.as_deref(), Some("url-shortener"));
        assert_eq!(state.open_question_id, None);

        h.run_timers(2000);
        assert_eq!(h.state().copied_question_id, None);
    }

    #[test]
    fn share_then_resync_is_consistent() {
        let h = Harness::mount("");
        h.controller.borrow_mut().share("42").unwrap();
        h.controller.borrow_mut().sync_from_url();
        h.controller.borrow_mut().sync_from_url();

        let state = h.state();
        assert_eq!(state.active_category, Category::LowLevelDesign);
        assert_eq!(state.open_question_id.as_deref(), Some("42"));
        assert_eq!(h.url_param().as_deref(), Some("42"));
    }

    #[test]
    fn sharing_twice_restarts_copied_timer() {
        let h = Harness::mount("");
        h.controller.borrow_mut().share("42").unwrap();
        h.run_timers(1500);
        h.controller.borrow_mut().share("lru").unwrap();
        h.run_timers(1000);
        assert_eq!(h.state().copied_question_id.as_deref(), Some("lru"));
        h.run_timers(1000);
        assert_eq!(h.state().copied_question_id, None);
    }

    #[test]
    fn share_unknown_question_fails_without_touching_url() {
        let h = Harness::mount("?q=42");
        let err = h.controller.borrow_mut().share("ghost").unwrap_err();
        assert_eq!(err, CatalogError::NotFound("ghost".to_string()));
        assert_eq!(h.url_param().as_deref(), Some("42"));
        assert_eq!(h.surface.clipboard(), None);
    }

    #[test]
    fn toggle_keeps_a_single_question_open() {
        let h = Harness::mount("");
        let mut controller = h.controller.borrow_mut();
        assert!(controller.toggle_question("two-sum"));
        assert!(controller.toggle_question("lru"));
        assert_eq!(controller.state().open_question_id.as_deref(), Some("lru"));
        assert!(!controller.toggle_question("lru"));
        assert_eq!(controller.state().open_question_id, None);
    }

    #[test]
    fn missing_card_skips_highlight() {
        let h = Harness::mount_with(sample_catalog(), "?q=42", RecordingSurface::with_rendered(&[]));
        h.run_timers(100);

        let state = h.state();
        assert_eq!(state.highlight_phase, HighlightPhase::NoSelection);
        assert_eq!(state.highlighted_question_id, None);
        assert_eq!(state.open_question_id.as_deref(), Some("42"));
        assert!(!h.scheduler.is_pending(TimerToken::ClearHighlight));
    }

    #[test]
    fn visible_questions_follow_active_category() {
        let h = Harness::mount("?q=url-shortener");
        let ids: Vec<String> = h
            .controller
            .borrow()
            .visible_questions()
            .into_iter()
            .map(|q| q.id)
            .collect();
        assert_eq!(ids, vec!["url-shortener"]);
    }

    #[test]
    fn observer_sees_every_change() {
        let h = Harness::mount("");
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        h.controller
            .borrow_mut()
            .set_observer(Box::new(move |_, _| counter.set(counter.get() + 1)));

        h.controller.borrow_mut().select_category(Category::LowLevelDesign);
        h.nav.navigate("?q=42");
        h.run_timers(100);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn observer_receives_visible_questions() {
        let h = Harness::mount("");
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        h.controller.borrow_mut().set_observer(Box::new(move |state, questions| {
            let ids = questions.iter().map(|q| q.id.clone()).collect::<Vec<_>>();
            sink.borrow_mut().push((state.active_category, ids));
        }));

        h.controller.borrow_mut().select_category(Category::HighLevelDesign);
        assert_eq!(
            *seen.borrow(),
            vec![(Category::HighLevelDesign, vec!["url-shortener".to_string()])]
        );
    }

    #[test]
    fn failed_copy_is_not_acknowledged() {
        let surface = RecordingSurface::new();
        surface.set_copy_mode(CopyMode::Fail);
        let h = Harness::mount_with(sample_catalog(), "", surface);

        let url = h.controller.borrow_mut().share("42").unwrap();
        assert_eq!(url, "https://interview.example/?q=42");
        assert_eq!(h.url_param().as_deref(), Some("42"));
        assert_eq!(h.surface.clipboard(), None);
        assert_eq!(h.state().copied_question_id, None);
        assert!(!h.scheduler.is_pending(TimerToken::ClearCopied));
    }

    #[test]
    fn copied_hint_waits_for_clipboard() {
        let surface = RecordingSurface::new();
        surface.set_copy_mode(CopyMode::Defer);
        let h = Harness::mount_with(sample_catalog(), "", surface);

        h.controller.borrow_mut().share("lru").unwrap();
        assert_eq!(h.state().copied_question_id, None);
        assert!(!h.scheduler.is_pending(TimerToken::ClearCopied));

        assert!(h.surface.finish_copy(Ok(())));
        assert_eq!(h.state().copied_question_id.as_deref(), Some("lru"));
        h.run_timers(2000);
        assert_eq!(h.state().copied_question_id, None);

        h.controller.borrow_mut().share("42").unwrap();
        assert!(h.surface.finish_copy(Err(CatalogError::Browser("denied".to_string()))));
        assert_eq!(h.state().copied_question_id, None);
    }
}
