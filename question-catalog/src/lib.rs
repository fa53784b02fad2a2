use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use utils_common::{Category, Question, QuestionDraft, QuestionPatch};

// 导出模块
pub mod builder;
pub mod catalog;
pub mod config;
pub mod display;
pub mod error;
pub mod logging;
pub mod models;
pub mod navigation;
pub mod scheduler;
pub mod selection;
pub mod store;
pub mod surface;

pub use catalog::{Clock, QuestionCatalog, QuestionLookup, SystemClock};
pub use config::{CatalogConfig, SelectionConfig};
pub use error::CatalogError;
pub use selection::{HighlightPhase, SelectionController, SelectionState};

use navigation::BrowserNavigation;
use scheduler::{BrowserScheduler, TimerDispatch};
use store::LocalStorageStore;
use surface::BrowserSurface;

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// 已初始化的题库及其配置
struct CatalogSlot {
    catalog: Rc<RefCell<QuestionCatalog>>,
    config: CatalogConfig,
}

/// 最近一次状态通知时的视图
struct SelectionView {
    state: SelectionState,
    visible: Vec<Question>,
}

// wasm 为单线程，全局状态放在线程局部存储中
thread_local! {
    static CATALOG: RefCell<Option<CatalogSlot>> = RefCell::new(None);
    static CONTROLLER: RefCell<Option<Rc<RefCell<SelectionController>>>> = RefCell::new(None);
    static LAST_VIEW: RefCell<Option<SelectionView>> = RefCell::new(None);
}

/// 初始化函数 - 设置错误处理
#[wasm_bindgen(start)]
pub fn start() {
    console_error_panic_hook::set_once();
}

/// 版本信息
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// 分类信息 - 供标签页渲染
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CategoryInfo {
    id: &'static str,
    title: &'static str,
    short_label: &'static str,
    description: &'static str,
}

fn to_js<E: std::fmt::Display>(e: E) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn serialize<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("序列化结果失败: {}", e)))
}

fn parse_category(category: &str) -> Result<Category, JsValue> {
    category.parse::<Category>().map_err(|e| JsValue::from_str(&e))
}

fn shared_catalog() -> Result<(Rc<RefCell<QuestionCatalog>>, CatalogConfig), JsValue> {
    CATALOG
        .with(|slot| {
            slot.borrow()
                .as_ref()
                .map(|s| (s.catalog.clone(), s.config.clone()))
        })
        .ok_or_else(|| JsValue::from_str("题库未初始化"))
}

fn install_catalog(catalog: QuestionCatalog, config: CatalogConfig, persist: bool) -> Result<(), JsValue> {
    let catalog = if persist {
        let store = LocalStorageStore::open(&config.storage_key).map_err(to_js)?;
        catalog.with_store(Box::new(store)).map_err(to_js)?
    } else {
        catalog
    };

    logging::log(&format!(
        "题库初始化完成: {} 道题目{}",
        catalog.list_all().len(),
        if persist { "（本地存储模式）" } else { "" }
    ));

    CATALOG.with(|slot| {
        *slot.borrow_mut() = Some(CatalogSlot {
            catalog: Rc::new(RefCell::new(catalog)),
            config,
        });
    });
    Ok(())
}

// 延迟 `delay_ms` 毫秒后执行 `op`，以 Promise 返回结果，模拟网络开销
fn delayed<F>(delay_ms: u32, op: F) -> js_sys::Promise
where
    F: FnOnce() -> Result<JsValue, JsValue> + 'static,
{
    let mut op = Some(op);
    js_sys::Promise::new(&mut |resolve: js_sys::Function, reject: js_sys::Function| {
        let Some(op) = op.take() else {
            return;
        };
        let Some(window) = web_sys::window() else {
            let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("window 不可用"));
            return;
        };

        let reject_later = reject.clone();
        let callback = Closure::once_into_js(move || {
            let settled = match op() {
                Ok(value) => resolve.call1(&JsValue::NULL, &value),
                Err(e) => reject_later.call1(&JsValue::NULL, &e),
            };
            if let Err(e) = settled {
                logging::warn(&format!("返回写操作结果失败: {:?}", e));
            }
        });

        if let Err(e) = window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.unchecked_ref(),
            delay_ms.min(i32::MAX as u32) as i32,
        ) {
            let _ = reject.call1(&JsValue::NULL, &e);
        }
    })
}

/// 题库JS接口 - 提供给JavaScript使用的题库API
#[wasm_bindgen]
pub struct QuestionCatalogJS;

#[wasm_bindgen]
impl QuestionCatalogJS {
    /// 以若干 JSON 文档（字符串数组，按顺序拼接）初始化题库
    #[wasm_bindgen]
    pub fn init(documents: &js_sys::Array, config_json: &str, persist: bool) -> Result<(), JsValue> {
        console_error_panic_hook::set_once();

        let config = CatalogConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e))?;
        let texts = documents
            .iter()
            .map(|doc| doc.as_string().ok_or_else(|| JsValue::from_str("题目文档必须是 JSON 字符串")))
            .collect::<Result<Vec<String>, JsValue>>()?;
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

        let catalog = QuestionCatalog::from_documents(&texts).map_err(|e| {
            logging::warn(&format!("初始化题库失败: {}", e));
            to_js(e)
        })?;
        install_catalog(catalog, config, persist)
    }

    /// 以构建工具生成的压缩打包初始化题库
    #[wasm_bindgen]
    pub fn init_bundle(data: &[u8], config_json: &str, persist: bool) -> Result<(), JsValue> {
        console_error_panic_hook::set_once();

        let config = CatalogConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e))?;
        let catalog = QuestionCatalog::from_bundle(data).map_err(|e| {
            logging::warn(&format!("初始化题库失败: {}", e));
            to_js(e)
        })?;
        install_catalog(catalog, config, persist)
    }

    /// 全部题目
    #[wasm_bindgen]
    pub fn list_all() -> Result<JsValue, JsValue> {
        let (catalog, _) = shared_catalog()?;
        let questions = catalog.borrow().list_all();
        serialize(&questions)
    }

    /// 某分类下的题目
    #[wasm_bindgen]
    pub fn list_by_category(category: &str) -> Result<JsValue, JsValue> {
        let category = parse_category(category)?;
        let (catalog, _) = shared_catalog()?;
        let questions = catalog.borrow().list_by_category(category);
        serialize(&questions)
    }

    /// 按 id 查找，不存在时返回 null
    #[wasm_bindgen]
    pub fn get_by_id(id: &str) -> Result<JsValue, JsValue> {
        let (catalog, _) = shared_catalog()?;
        let question = catalog.borrow().get_by_id(id);
        match question {
            Some(question) => serialize(&question),
            None => Ok(JsValue::NULL),
        }
    }

    /// 静态数据中的重复 id
    #[wasm_bindgen]
    pub fn duplicate_ids() -> Result<JsValue, JsValue> {
        let (catalog, _) = shared_catalog()?;
        let duplicates = catalog.borrow().duplicate_ids();
        serialize(&duplicates)
    }

    /// 新建题目，延迟后返回新记录
    #[wasm_bindgen]
    pub fn create(draft_json: &str) -> js_sys::Promise {
        let prepared = serde_json::from_str::<QuestionDraft>(draft_json)
            .map_err(|e| JsValue::from_str(&format!("解析题目数据失败: {}", e)))
            .and_then(|draft| shared_catalog().map(|shared| (draft, shared)));

        match prepared {
            Ok((draft, (catalog, config))) => delayed(config.mutation_latency_ms, move || {
                let created = catalog.borrow_mut().create(draft).map_err(to_js)?;
                serialize(&created)
            }),
            Err(e) => js_sys::Promise::reject(&e),
        }
    }

    /// 更新题目，延迟后返回合并后的记录
    #[wasm_bindgen]
    pub fn update(id: String, patch_json: &str) -> js_sys::Promise {
        let prepared = serde_json::from_str::<QuestionPatch>(patch_json)
            .map_err(|e| JsValue::from_str(&format!("解析更新数据失败: {}", e)))
            .and_then(|patch| shared_catalog().map(|shared| (patch, shared)));

        match prepared {
            Ok((patch, (catalog, config))) => delayed(config.mutation_latency_ms, move || {
                let updated = catalog.borrow_mut().update(&id, patch).map_err(to_js)?;
                serialize(&updated)
            }),
            Err(e) => js_sys::Promise::reject(&e),
        }
    }

    /// 删除题目
    #[wasm_bindgen(js_name = deleteQuestion)]
    pub fn delete(id: String) -> js_sys::Promise {
        match shared_catalog() {
            Ok((catalog, config)) => delayed(config.mutation_latency_ms, move || {
                catalog.borrow_mut().delete(&id).map_err(to_js)?;
                Ok(JsValue::UNDEFINED)
            }),
            Err(e) => js_sys::Promise::reject(&e),
        }
    }

    /// 标签页顺序的分类信息
    #[wasm_bindgen]
    pub fn categories() -> Result<JsValue, JsValue> {
        let infos: Vec<CategoryInfo> = Category::ALL
            .iter()
            .map(|c| CategoryInfo {
                id: c.as_str(),
                title: c.title(),
                short_label: c.short_label(),
                description: c.description(),
            })
            .collect();
        serialize(&infos)
    }

    /// 解答要点列表
    #[wasm_bindgen]
    pub fn solution_bullets(solution: &str) -> Result<JsValue, JsValue> {
        serialize(&display::solution_bullets(solution))
    }

    /// 视频嵌入地址
    #[wasm_bindgen]
    pub fn video_embed_url(video: &str) -> Option<String> {
        display::video_embed_url(video)
    }
}

fn mounted_controller() -> Result<Rc<RefCell<SelectionController>>, JsValue> {
    CONTROLLER
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| JsValue::from_str("选择控制器未挂载"))
}

fn with_controller<T>(f: impl FnOnce(&mut SelectionController) -> Result<T, JsValue>) -> Result<T, JsValue> {
    let controller = mounted_controller()?;
    let mut controller = controller
        .try_borrow_mut()
        .map_err(|_| JsValue::from_str("选择控制器正忙"))?;
    f(&mut *controller)
}

// 只读访问；状态回调期间控制器仍被借用，此时读取回调时记录的视图
fn read_controller<T>(f: impl FnOnce(&SelectionState, &[Question]) -> Result<T, JsValue>) -> Result<T, JsValue> {
    let controller = mounted_controller()?;
    if let Ok(controller) = controller.try_borrow() {
        return f(controller.state(), &controller.visible_questions());
    }
    LAST_VIEW.with(|view| match view.borrow().as_ref() {
        Some(view) => f(&view.state, &view.visible),
        None => Err(JsValue::from_str("选择控制器正忙")),
    })
}

/// 选择状态JS接口 - 地址栏深链接、分类切换与分享
#[wasm_bindgen]
pub struct SelectionControllerJS;

#[wasm_bindgen]
impl SelectionControllerJS {
    /// 挂载控制器并返回初始状态。`on_change` 在每次状态变化后以
    /// (新状态, 当前分类下的题目) 调用。
    #[wasm_bindgen]
    pub fn mount(config_json: &str, on_change: Option<js_sys::Function>) -> Result<JsValue, JsValue> {
        console_error_panic_hook::set_once();

        let config = SelectionConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e))?;
        let (catalog, _) = shared_catalog()?;
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("window 不可用"))?;
        let navigation = BrowserNavigation::new().map_err(to_js)?;

        // 定时器到期后分发给控制器，控制器创建后再填入
        let handle: Rc<RefCell<Weak<RefCell<SelectionController>>>> = Rc::new(RefCell::new(Weak::new()));
        let dispatch_handle = handle.clone();
        let dispatch: TimerDispatch = Rc::new(move |token| {
            let controller = match dispatch_handle.borrow().upgrade() {
                Some(controller) => controller,
                None => return,
            };
            let fired = controller.try_borrow_mut().map(|mut c| c.on_timer(token));
            if fired.is_err() {
                logging::warn(&format!("控制器正忙，丢弃定时任务 {:?}", token));
            }
        });
        let mut scheduler = BrowserScheduler::new(window.clone());
        scheduler.set_dispatch(dispatch);

        let controller = Rc::new(RefCell::new(SelectionController::new(
            config,
            Box::new(catalog),
            Box::new(navigation),
            Box::new(scheduler),
            Box::new(BrowserSurface::new(window)),
        )));
        *handle.borrow_mut() = Rc::downgrade(&controller);

        controller.borrow_mut().set_observer(Box::new(move |state, visible| {
            LAST_VIEW.with(|view| {
                *view.borrow_mut() = Some(SelectionView {
                    state: state.clone(),
                    visible: visible.to_vec(),
                })
            });

            let Some(on_change) = &on_change else {
                return;
            };
            let values = serde_wasm_bindgen::to_value(state)
                .and_then(|state| serde_wasm_bindgen::to_value(visible).map(|visible| (state, visible)));
            match values {
                Ok((state, visible)) => {
                    if let Err(e) = on_change.call2(&JsValue::NULL, &state, &visible) {
                        logging::warn(&format!("状态回调出错: {:?}", e));
                    }
                }
                Err(e) => logging::warn(&format!("序列化选择状态失败: {}", e)),
            }
        }));

        SelectionController::attach(&controller);
        controller.borrow_mut().mount();
        CONTROLLER.with(|slot| *slot.borrow_mut() = Some(controller));

        read_controller(|state, _| serialize(state))
    }

    /// 当前状态
    #[wasm_bindgen]
    pub fn state() -> Result<JsValue, JsValue> {
        read_controller(|state, _| serialize(state))
    }

    /// 当前分类下的题目
    #[wasm_bindgen]
    pub fn visible_questions() -> Result<JsValue, JsValue> {
        read_controller(|_, visible| serialize(&visible))
    }

    /// 用户手动切换分类
    #[wasm_bindgen]
    pub fn select_category(category: &str) -> Result<JsValue, JsValue> {
        let category = parse_category(category)?;
        with_controller(|c| {
            c.select_category(category);
            serialize(c.state())
        })
    }

    /// 分享题目，返回已复制的链接
    #[wasm_bindgen]
    pub fn share(question_id: &str) -> Result<String, JsValue> {
        with_controller(|c| c.share(question_id).map_err(to_js))
    }

    /// 展开或收起题目，返回现在是否展开
    #[wasm_bindgen]
    pub fn toggle_question(question_id: &str) -> Result<bool, JsValue> {
        with_controller(|c| Ok(c.toggle_question(question_id)))
    }
}
