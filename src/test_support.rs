// Dobles de prueba compartidos por los tests unitarios

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use futures::channel::oneshot;
use futures::executor::LocalPool;
use futures::future::{self, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::services::api_client::{ApiClient, ApiRequest, ApiResponse, HttpTransport};
use crate::services::retry::Sleeper;
use crate::utils::clock::ManualClock;
use crate::utils::scheduler::{ManualScheduler, Spawner, Timers};

type Handler = Box<dyn Fn(&str, &ApiRequest) -> ApiResult<ApiResponse>>;

/// Transporte con respuestas programadas que registra cada petición
pub struct MockTransport {
    handler: Handler,
    calls: RefCell<Vec<(String, ApiRequest)>>,
}

impl MockTransport {
    pub fn new(handler: impl Fn(&str, &ApiRequest) -> ApiResult<ApiResponse> + 'static) -> Rc<Self> {
        Rc::new(Self { handler: Box::new(handler), calls: RefCell::new(Vec::new()) })
    }

    /// Devuelve las respuestas en orden; la última se repite
    pub fn sequence(responses: Vec<ApiResult<ApiResponse>>) -> Rc<Self> {
        let queue = RefCell::new(VecDeque::from(responses));
        Self::new(move |_, _| {
            let mut queue = queue.borrow_mut();
            if queue.len() > 1 {
                queue.pop_front().unwrap()
            } else {
                queue.front().cloned().unwrap()
            }
        })
    }

    pub fn calls(&self) -> Vec<(String, ApiRequest)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(url, _)| url.clone()).collect()
    }
}

impl HttpTransport for MockTransport {
    fn send(&self, url: String, request: ApiRequest) -> LocalBoxFuture<'static, ApiResult<ApiResponse>> {
        let result = (self.handler)(&url, &request);
        self.calls.borrow_mut().push((url, request));
        Box::pin(future::ready(result))
    }
}

type PendingReply = (String, oneshot::Sender<ApiResult<ApiResponse>>);

/// Transporte que retiene cada petición hasta que el test la responde
#[derive(Default)]
pub struct DeferredTransport {
    pending: RefCell<Vec<PendingReply>>,
}

impl DeferredTransport {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn pending_urls(&self) -> Vec<String> {
        self.pending.borrow().iter().map(|(url, _)| url.clone()).collect()
    }

    /// Responde la primera petición pendiente cuya URL contiene `fragment`
    pub fn respond(&self, fragment: &str, result: ApiResult<ApiResponse>) -> bool {
        let mut pending = self.pending.borrow_mut();
        let Some(index) = pending.iter().position(|(url, _)| url.contains(fragment)) else {
            return false;
        };
        let (_, sender) = pending.remove(index);
        sender.send(result).is_ok()
    }
}

impl HttpTransport for DeferredTransport {
    fn send(&self, url: String, _request: ApiRequest) -> LocalBoxFuture<'static, ApiResult<ApiResponse>> {
        let (sender, receiver) = oneshot::channel();
        self.pending.borrow_mut().push((url, sender));
        Box::pin(async move { receiver.await.unwrap_or(Err(ApiError::Cancelled)) })
    }
}

pub fn ok(body: Value) -> ApiResult<ApiResponse> {
    Ok(ApiResponse { status: 200, body })
}

pub fn status(code: u16) -> ApiResult<ApiResponse> {
    Ok(ApiResponse { status: code, body: json!({ "message": format!("status {}", code) }) })
}

pub fn network_error() -> ApiResult<ApiResponse> {
    Err(ApiError::Network("connection reset".into()))
}

pub fn client<T: HttpTransport + 'static>(transport: &Rc<T>) -> ApiClient {
    ApiClient::new("http://api", transport.clone())
}

/// Sleeper que resuelve al instante y anota cada espera
#[derive(Default)]
pub struct RecordingSleeper {
    delays: RefCell<Vec<u32>>,
}

impl RecordingSleeper {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn delays(&self) -> Vec<u32> {
        self.delays.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        self.delays.borrow_mut().push(ms);
        Box::pin(future::ready(()))
    }
}

/// Tiempo virtual: scheduler manual + Timers enlazados al mismo reloj
pub fn manual_timers() -> (ManualScheduler, Timers) {
    let scheduler = ManualScheduler::new(ManualClock::new(0));
    let timers = Timers::manual(&scheduler);
    (scheduler, timers)
}

/// Executor local para tareas lanzadas con un Spawner
pub fn local_spawner() -> (LocalPool, Spawner) {
    let pool = LocalPool::new();
    let handle = pool.spawner();
    let spawner: Spawner = Rc::new(move |task| {
        handle.spawn_local(task).expect("spawn en LocalPool");
    });
    (pool, spawner)
}
