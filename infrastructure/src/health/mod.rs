pub mod checks;

use async_trait::async_trait;
use futures::{
    future::{BoxFuture, TryFutureExt},
    stream::{iter, StreamExt},
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;

/// All health checks.
#[derive(Default)]
pub struct HealthChecks {
    pub startup: Checks,
    pub liveness: Checks,
    pub readiness: Checks,
}

/// State of a check
#[derive(Copy, Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum State {
    Up,
    Down,
}

/// Result of a single check.
#[derive(Clone, Debug, Eq, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub name: String,
    pub state: State,
    /// Additional data, ensure that no secret get exposed through this
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

#[derive(Clone, Debug, serde::Serialize)]
pub struct CheckResults {
    pub results: Vec<CheckResult>,
}

impl CheckResults {
    /// Check if all results are [`State::Up`].
    pub fn all_up(&self) -> bool {
        self.results.iter().all(|result| result.state == State::Up)
    }
}

#[async_trait]
pub trait Check: Send + Sync {
    type Error: std::fmt::Display;

    /// Run the check. If it returns an error, the check is considered failed/down.
    async fn run(&self) -> Result<(), Self::Error>;
}

#[async_trait]
impl<F, Fut, E> Check for F
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), E>> + Send,
    E: std::fmt::Display,
{
    type Error = E;

    async fn run(&self) -> Result<(), Self::Error> {
        (self)().await
    }
}

type CheckFn = dyn Fn() -> BoxFuture<'static, Result<(), String>> + Send + Sync;

/// Checks for a specific health check type.
#[derive(Default)]
pub struct Checks {
    checks: RwLock<BTreeMap<String, Arc<CheckFn>>>,
}

impl Checks {
    /// Register a new check.
    ///
    /// Registering a check with the same name will replace the old check.
    pub async fn register<C>(&self, name: impl Into<String>, check: C)
    where
        C: Check + 'static,
    {
        let check = Arc::new(check);
        let check: Arc<CheckFn> = Arc::new(move || {
            let check = check.clone();
            Box::pin(async move { check.run().map_err(|err| err.to_string()).await })
        });
        self.checks.write().await.insert(name.into(), check);
    }

    /// Unregister a check. If it isn't registered, nothing will happen.
    pub async fn unregister(&self, name: &str) {
        self.checks.write().await.remove(name);
    }

    pub async fn run(&self) -> CheckResults {
        let results = iter(self.checks.read().await.iter())
            .then(|(name, check)| async move {
                match (**check)().await {
                    Ok(()) => CheckResult {
                        name: name.clone(),
                        state: State::Up,
                        data: Value::Null,
                    },
                    Err(err) => CheckResult {
                        name: name.clone(),
                        state: State::Down,
                        data: json!({
                            "message": err,
                        }),
                    },
                }
            })
            .collect()
            .await;

        CheckResults { results }
    }
}
