use crate::adapters::{TokioTimeProvider, WebPushSender};
use crate::config::{AppConfig, DispatchConfig};
use crate::ports::{PushSender, TimeProvider};
use crate::store::Store;

pub(crate) mod dispatch;
pub(crate) mod vapid;

use std::sync::Arc;
use tokio::task::JoinHandle;

pub use vapid::{VapidCredentials, generate_vapid_credentials};
pub(crate) use vapid::{VapidStatus, load_vapid_config};

/// Owns the background dispatch task so the app can stop it.
pub(crate) struct DispatchLoopHandle {
    handle: JoinHandle<()>,
}

impl DispatchLoopHandle {
    pub(crate) fn abort(&self) {
        self.handle.abort();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for DispatchLoopHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Starts the interval dispatch loop when VAPID is fully configured. An
/// unconfigured deployment still serves every other surface; the dispatch
/// endpoint reports 503 and this returns `None`.
pub(crate) fn maybe_start_dispatch_loop(
    config: &AppConfig,
    store: Arc<Store>,
) -> Option<DispatchLoopHandle> {
    let vapid = match load_vapid_config(config) {
        VapidStatus::Ready(vapid) => vapid,
        VapidStatus::Incomplete => {
            eprintln!("push dispatch disabled: incomplete VAPID configuration");
            return None;
        }
        VapidStatus::Missing => return None,
    };

    let sender = match WebPushSender::new(vapid) {
        Ok(sender) => sender,
        Err(err) => {
            eprintln!("push dispatch disabled: failed to init web-push ({err})");
            return None;
        }
    };

    Some(spawn_dispatch_loop(
        TokioTimeProvider,
        sender,
        store,
        config.dispatch.clone(),
    ))
}

fn spawn_dispatch_loop<T, S>(
    time: T,
    sender: S,
    store: Arc<Store>,
    config: DispatchConfig,
) -> DispatchLoopHandle
where
    T: TimeProvider,
    S: PushSender,
{
    let handle = tokio::spawn(async move {
        loop {
            time.sleep(config.interval).await;
            match dispatch::run_dispatch(&time, &sender, &store, &config).await {
                Ok(summary) if summary.processed > 0 => {
                    eprintln!(
                        "push dispatch: processed {} ({} sent, {} failed, {} deferred)",
                        summary.processed, summary.sent, summary.failed, summary.deferred
                    );
                }
                Ok(_) => {}
                Err(err) => eprintln!("push dispatch error: {err}"),
            }
        }
    });
    DispatchLoopHandle { handle }
}
