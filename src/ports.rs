use std::time::Duration;

use time::OffsetDateTime;

use crate::types::chat::{ChatMessage, Persona};
use crate::types::push::{PushPayload, Subscription};

pub trait TimeProvider: Clone + Send + Sync + 'static {
    type Sleep<'a>: Future<Output = ()> + Send + 'a
    where
        Self: 'a;

    fn now(&self) -> OffsetDateTime;
    fn sleep<'a>(&'a self, duration: Duration) -> Self::Sleep<'a>;
}

/// The one distinction the dispatcher needs from a failed delivery: a gone
/// endpoint (HTTP 404/410 from the push service) gets its subscription
/// pruned, anything else is left alone.
pub trait SendFailure: std::fmt::Display + Send + Sync + 'static {
    fn endpoint_gone(&self) -> bool;
}

pub trait PushSender: Clone + Send + Sync + 'static {
    type Error: SendFailure;
    type Fut<'a>: Future<Output = Result<(), Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn send<'a>(
        &'a self,
        subscription: &'a Subscription,
        payload: &'a PushPayload,
    ) -> Self::Fut<'a>;
}

pub trait ChatProvider: Clone + Send + Sync + 'static {
    type Error: std::fmt::Display + Send + Sync + 'static;
    type Fut<'a>: Future<Output = Result<String, Self::Error>> + Send + 'a
    where
        Self: 'a;

    fn complete<'a>(&'a self, persona: Persona, messages: &'a [ChatMessage]) -> Self::Fut<'a>;
}
