use crate::exchange::Exchange;
use crate::handler::HandlerResult;
use crate::interceptor::{Interceptor, Next};
use async_trait::async_trait;
use std::time::Instant;
use tracing::info;

/// Logs method, path, final status and elapsed time of every request passing through.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccessLog;

#[async_trait]
impl Interceptor for AccessLog {
    async fn intercept(&self, exchange: &mut Exchange, next: Next<'_>) -> HandlerResult {
        let start = Instant::now();
        let result = next.run(exchange).await;

        let status = match &result {
            Ok(response) => response.status(),
            Err(e) => e.status(),
        };
        info!(
            method = %exchange.method(),
            path = %exchange.path(),
            status = status.as_u16(),
            elapsed = ?start.elapsed(),
            "served request"
        );
        result
    }
}
