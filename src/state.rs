use crate::adapters::HttpChatProvider;
use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::push::DispatchLoopHandle;
use crate::store::Store;
use crate::timer::TimerState;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub(crate) auth: Option<AuthState>,
    pub(crate) store: Arc<Store>,
    /// Live per-user timer engines; the store's snapshots are the durable
    /// mirror.
    pub(crate) timers: Arc<Mutex<HashMap<String, TimerState>>>,
    pub(crate) chat: Option<HttpChatProvider>,
    pub(crate) dispatch_loop: Arc<Mutex<Option<DispatchLoopHandle>>>,
}
