use crate::error::DispatchError;
use crate::exchange::Exchange;
use crate::handler::HandlerResult;
use crate::interceptor::{Interceptor, Next};
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Turns a panic raised further down the chain into [`DispatchError::PanicRecovered`].
///
/// Only panics below this interceptor are caught, so it is usually registered first on the
/// router. The panic message is logged and never sent to the client.
#[derive(Debug, Default, Clone, Copy)]
pub struct Recovery;

#[async_trait]
impl Interceptor for Recovery {
    async fn intercept(&self, exchange: &mut Exchange, next: Next<'_>) -> HandlerResult {
        match AssertUnwindSafe(next.run(exchange)).catch_unwind().await {
            Ok(result) => result,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(method = %exchange.method(), path = %exchange.path(), panic = %message, "recover from handler panic");
                Err(DispatchError::PanicRecovered { message })
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
