//! 运行时抽象
//!
//! 浏览器只有单线程事件循环，所有 Future 都是 `!Send`。
//! `Runtime` 把时钟、定时器和任务派发收拢到一处，测试时替换为确定性的实现。

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::pin::pin;
use std::rc::Rc;
use std::time::Duration;

use agriwaste_shared::Timestamp;
use futures::channel::oneshot;
use futures::future::{Either, LocalBoxFuture, select};

use crate::error::{ApiError, ApiResult};

pub trait Runtime {
    /// 当前时间（毫秒精度）
    fn now(&self) -> Timestamp;
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
    /// 派发后台任务（fire-and-forget）
    fn spawn(&self, task: LocalBoxFuture<'static, ()>);
}

pub type SharedRuntime = Rc<dyn Runtime>;

/// 浏览器运行时：`Date.now()` + `setTimeout` + 微任务队列
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserRuntime;

impl Runtime for BrowserRuntime {
    fn now(&self) -> Timestamp {
        Timestamp::from(chrono::Utc::now())
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        Box::pin(gloo_timers::future::sleep(duration))
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

// =========================================================
// 取消令牌
// =========================================================

#[derive(Default)]
struct TokenInner {
    cancelled: Cell<bool>,
    callbacks: RefCell<Vec<Box<dyn FnOnce()>>>,
}

/// 单线程取消令牌
///
/// 克隆共享同一状态。取消是一次性的：回调只触发一次，
/// 在已取消的令牌上注册的回调会立即执行。
#[derive(Clone, Default)]
pub struct CancellationToken {
    inner: Rc<TokenInner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.get()
    }

    pub fn cancel(&self) {
        if self.inner.cancelled.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.inner.callbacks.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }

    pub fn on_cancel(&self, callback: impl FnOnce() + 'static) {
        if self.is_cancelled() {
            callback();
        } else {
            self.inner.callbacks.borrow_mut().push(Box::new(callback));
        }
    }

    /// 派生子令牌：父令牌取消时子令牌随之取消，反之不然
    pub fn child(&self) -> CancellationToken {
        let child = CancellationToken::new();
        let linked = child.clone();
        self.on_cancel(move || linked.cancel());
        child
    }

    /// 令牌被取消时完成
    pub fn cancelled(&self) -> impl Future<Output = ()> + 'static {
        let (tx, rx) = oneshot::channel::<()>();
        self.on_cancel(move || {
            let _ = tx.send(());
        });
        async move {
            let _ = rx.await;
        }
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// 在限定时间内等待请求完成
///
/// 超时后触发 `token`，让传输层中止对应的 fetch。
pub async fn with_timeout<T, F>(
    runtime: &dyn Runtime,
    limit: Duration,
    token: &CancellationToken,
    future: F,
) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    let future = pin!(future);
    match select(future, runtime.sleep(limit)).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => {
            token.cancel();
            Err(ApiError::Timeout(limit))
        }
    }
}

/// 等待 `future`，令牌取消时提前返回 `ApiError::Cancelled`
pub async fn until_cancelled<T, F>(token: &CancellationToken, future: F) -> ApiResult<T>
where
    F: Future<Output = ApiResult<T>>,
{
    if token.is_cancelled() {
        return Err(ApiError::Cancelled);
    }
    let future = pin!(future);
    let cancelled = pin!(token.cancelled());
    match select(future, cancelled).await {
        Either::Left((result, _)) => result,
        Either::Right(((), _)) => Err(ApiError::Cancelled),
    }
}
