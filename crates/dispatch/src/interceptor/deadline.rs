use crate::exchange::Exchange;
use crate::handler::HandlerResult;
use crate::interceptor::{Interceptor, Next};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

/// Gives every request passing through a time budget, measured from when this interceptor runs.
///
/// The budget only tightens an existing deadline. It is observed cooperatively: typed handlers
/// check it while reading the body and before invoking user logic, raw handlers can poll
/// [`Exchange::is_cancelled`] or await [`Exchange::cancelled`].
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    budget: Duration,
}

impl Deadline {
    pub fn new(budget: Duration) -> Self {
        Self { budget }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }
}

#[async_trait]
impl Interceptor for Deadline {
    async fn intercept(&self, exchange: &mut Exchange, next: Next<'_>) -> HandlerResult {
        exchange.tighten_deadline(Instant::now() + self.budget);
        next.run(exchange).await
    }
}
