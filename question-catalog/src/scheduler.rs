//! 按令牌区分的可取消定时回调。同一令牌再次调度时取消之前的那一次。

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// 定时任务令牌，同一时间每种令牌最多只有一个有效任务
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerToken {
    /// 界面渲染后滚动定位并高亮选中的题目
    RevealSelection,
    /// 清除高亮
    ClearHighlight,
    /// 清除“已复制”提示
    ClearCopied,
}

/// 定时器接口
pub trait Scheduler {
    /// 在 `delay_ms` 毫秒后触发 `token`，替换同一令牌已有的任务
    fn schedule(&mut self, token: TimerToken, delay_ms: u32);
    /// 取消 `token` 的任务，没有任务时无操作
    fn cancel(&mut self, token: TimerToken);
}

#[derive(Default)]
struct ManualTimers {
    now_ms: u64,
    seq: u64,
    // token -> (到期时间, 调度序号)
    pending: HashMap<TimerToken, (u64, u64)>,
}

/// 虚拟时间定时器，由测试手动推进；克隆出的句柄共享同一份状态
#[derive(Clone, Default)]
pub struct ManualScheduler {
    timers: Rc<RefCell<ManualTimers>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 推进虚拟时间，返回期间到期的令牌（按到期先后）
    pub fn advance(&self, ms: u64) -> Vec<TimerToken> {
        let mut timers = self.timers.borrow_mut();
        timers.now_ms += ms;
        let now = timers.now_ms;

        let mut due: Vec<(TimerToken, (u64, u64))> = timers
            .pending
            .iter()
            .filter(|(_, (at, _))| *at <= now)
            .map(|(token, entry)| (*token, *entry))
            .collect();
        due.sort_by_key(|(_, entry)| *entry);

        for (token, _) in &due {
            timers.pending.remove(token);
        }
        due.into_iter().map(|(token, _)| token).collect()
    }

    /// 令牌是否仍在等待
    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.timers.borrow().pending.contains_key(&token)
    }

    /// 令牌剩余等待时间
    pub fn remaining(&self, token: TimerToken) -> Option<u64> {
        let timers = self.timers.borrow();
        timers.pending.get(&token).map(|(at, _)| at - timers.now_ms)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, token: TimerToken, delay_ms: u32) {
        let mut timers = self.timers.borrow_mut();
        let at = timers.now_ms + delay_ms as u64;
        timers.seq += 1;
        let seq = timers.seq;
        timers.pending.insert(token, (at, seq));
    }

    fn cancel(&mut self, token: TimerToken) {
        self.timers.borrow_mut().pending.remove(&token);
    }
}

/// 到期令牌的分发目标
pub type TimerDispatch = Rc<dyn Fn(TimerToken)>;

/// 按令牌登记的超时句柄与其回调，移除时回调随之释放
struct TimeoutTable<C> {
    entries: HashMap<TimerToken, (i32, C)>,
}

impl<C> TimeoutTable<C> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// 登记新的超时，返回被替换的旧条目
    fn insert(&mut self, token: TimerToken, handle: i32, callback: C) -> Option<(i32, C)> {
        self.entries.insert(token, (handle, callback))
    }

    fn take(&mut self, token: TimerToken) -> Option<(i32, C)> {
        self.entries.remove(&token)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

type BrowserTimeouts = Rc<RefCell<TimeoutTable<Closure<dyn FnMut()>>>>;

/// 浏览器定时器：`setTimeout` / `clearTimeout`
pub struct BrowserScheduler {
    window: web_sys::Window,
    timeouts: BrowserTimeouts,
    dispatch: Option<TimerDispatch>,
}

impl BrowserScheduler {
    pub fn new(window: web_sys::Window) -> Self {
        Self {
            window,
            timeouts: Rc::new(RefCell::new(TimeoutTable::new())),
            dispatch: None,
        }
    }

    /// 设置到期后的分发函数，未设置时到期令牌被丢弃
    pub fn set_dispatch(&mut self, dispatch: TimerDispatch) {
        self.dispatch = Some(dispatch);
    }

    /// 仍在等待的超时数量
    pub fn pending(&self) -> usize {
        self.timeouts.borrow().len()
    }
}

impl Scheduler for BrowserScheduler {
    fn schedule(&mut self, token: TimerToken, delay_ms: u32) {
        self.cancel(token);

        let dispatch = self.dispatch.clone();
        let timeouts = self.timeouts.clone();
        let callback = Closure::<dyn FnMut()>::new(move || {
            // 执行中的闭包由 wasm-bindgen 在本次调用返回后释放
            let fired = timeouts.borrow_mut().take(token);
            if let Some(dispatch) = &dispatch {
                dispatch(token);
            }
            drop(fired);
        });

        match self.window.set_timeout_with_callback_and_timeout_and_arguments_0(
            callback.as_ref().unchecked_ref(),
            delay_ms.min(i32::MAX as u32) as i32,
        ) {
            Ok(handle) => {
                self.timeouts.borrow_mut().insert(token, handle, callback);
            }
            Err(e) => crate::logging::warn(&format!("设置定时器失败 {:?}: {:?}", token, e)),
        }
    }

    fn cancel(&mut self, token: TimerToken) {
        let cancelled = self.timeouts.borrow_mut().take(token);
        if let Some((handle, callback)) = cancelled {
            self.window.clear_timeout_with_handle(handle);
            drop(callback);
        }
    }
}
