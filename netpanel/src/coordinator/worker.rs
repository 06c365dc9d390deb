//! What a worker does for each operation kind.

use log::{debug, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::events::{Operation, OperationOutput};
use super::guard::AttemptToken;
use super::prompt::{PromptBridge, PromptOutcome};
use crate::Result;
use crate::api::models::{ActiveConnectionDetails, ConnectionError};
use crate::backend::Backend;

/// Everything a worker needs, shared by all workers.
pub(crate) struct WorkerContext {
    pub(crate) backend: Arc<dyn Backend>,
    pub(crate) prompts: Arc<PromptBridge>,
    pub(crate) operation_timeout: Option<Duration>,
    pub(crate) prompt_timeout: Duration,
}

impl WorkerContext {
    /// Runs one backend call under the operation timeout.
    async fn bounded<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T> {
        match self.operation_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .unwrap_or(Err(ConnectionError::Timeout)),
            None => call.await,
        }
    }
}

/// Executes `op` against the backend. `attempt` is set for guarded kinds.
pub(crate) async fn run(
    ctx: &WorkerContext,
    op: Operation,
    attempt: Option<&AttemptToken>,
) -> Result<OperationOutput> {
    let backend = ctx.backend.as_ref();

    match op {
        Operation::Scan => {
            let networks = ctx.bounded(backend.list_networks()).await?;
            let active = ctx.bounded(backend.active_network()).await?;
            debug!("Scan found {} networks, active {active:?}", networks.len());
            Ok(OperationOutput::Networks { networks, active })
        }

        Operation::Connect { ssid, password } => {
            let ap = ctx.bounded(backend.locate(&ssid)).await?;

            let password = match password {
                Some(pw) => Some(pw),
                None if ctx.bounded(backend.requires_secret(&ap)).await? => {
                    let attempt_id = attempt.map_or(0, AttemptToken::id);
                    match ctx
                        .prompts
                        .request_password(attempt_id, &ssid, ctx.prompt_timeout)
                        .await?
                    {
                        PromptOutcome::Password(pw) => Some(pw),
                        PromptOutcome::Cancelled => return Err(ConnectionError::PromptCancelled),
                        PromptOutcome::TimedOut => return Err(ConnectionError::PromptTimedOut),
                    }
                }
                None => None,
            };

            ctx.bounded(backend.connect(&ssid, &ap, password.as_deref()))
                .await?;
            info!("Connected to '{ssid}' via {}", backend.name());
            Ok(OperationOutput::AttemptDone)
        }

        Operation::Disconnect { ssid } => {
            ctx.bounded(backend.disconnect(&ssid)).await?;
            info!("Disconnected from '{ssid}'");
            Ok(OperationOutput::AttemptDone)
        }

        Operation::FetchDetails { ssid } => {
            let link = ctx.bounded(backend.active_link()).await?;
            let target = ssid.or_else(|| link.as_ref().map(|l| l.ssid.clone()));

            let details = match &link {
                Some(l) if target.as_deref() == Some(l.ssid.as_str()) => {
                    ctx.bounded(backend.device_details(&l.device)).await?
                }
                _ => ActiveConnectionDetails::disconnected(),
            };
            Ok(OperationOutput::Details {
                ssid: target,
                details,
            })
        }

        Operation::FetchPassword => {
            let ssid = ctx.bounded(backend.active_network()).await?;
            let password = match &ssid {
                Some(s) => ctx.bounded(backend.stored_secret(s)).await?,
                None => None,
            };
            Ok(OperationOutput::Password { ssid, password })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::backend::mock::{MockCall, MockOp};
    use tokio::sync::mpsc;

    fn context(mock: Arc<MockBackend>) -> WorkerContext {
        let (tx, _rx) = mpsc::unbounded_channel();
        WorkerContext {
            backend: mock,
            prompts: Arc::new(PromptBridge::new(tx)),
            operation_timeout: Some(Duration::from_secs(90)),
            prompt_timeout: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn details_for_inactive_network_are_placeholders() {
        let mock = Arc::new(MockBackend::with_sample_networks());
        let ctx = context(Arc::clone(&mock));

        let out = run(
            &ctx,
            Operation::FetchDetails {
                ssid: Some("Office_Main".into()),
            },
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            out,
            OperationOutput::Details {
                ssid: Some("Office_Main".into()),
                details: ActiveConnectionDetails::disconnected(),
            }
        );
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::DeviceDetails(_))));
    }

    #[tokio::test]
    async fn details_default_to_active_network() {
        let mock = Arc::new(MockBackend::with_sample_networks());
        let ctx = context(mock);

        match run(&ctx, Operation::FetchDetails { ssid: None }, None).await {
            Ok(OperationOutput::Details { ssid, details }) => {
                assert_eq!(ssid.as_deref(), Some("Home_Fiber_5G"));
                assert_eq!(details.ipv4, "192.168.1.42");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn password_of_active_network() {
        let mock = Arc::new(MockBackend::with_sample_networks());
        let ctx = context(mock);
        assert_eq!(
            run(&ctx, Operation::FetchPassword, None).await.unwrap(),
            OperationOutput::Password {
                ssid: Some("Home_Fiber_5G".into()),
                password: Some("correct horse battery".into()),
            }
        );
    }

    #[tokio::test]
    async fn supplied_password_skips_prompt() {
        let mock = Arc::new(MockBackend::new().with_network(
            "Secure-AP",
            Some(60),
            crate::api::models::Security::Wpa2,
        ));
        let ctx = context(Arc::clone(&mock));
        let op = Operation::Connect {
            ssid: "Secure-AP".into(),
            password: Some("hunter2".into()),
        };
        assert_eq!(run(&ctx, op, None).await.unwrap(), OperationOutput::AttemptDone);
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::RequiresSecret(_))));
        assert_eq!(ctx.prompts.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_backend_call_times_out() {
        let mock = Arc::new(MockBackend::with_sample_networks());
        mock.delay(MockOp::ListNetworks, Duration::from_secs(120));
        let ctx = context(mock);
        assert_eq!(
            run(&ctx, Operation::Scan, None).await,
            Err(ConnectionError::Timeout)
        );
    }

    #[tokio::test]
    async fn vanished_network_is_not_found() {
        let ctx = context(Arc::new(MockBackend::with_sample_networks()));
        let op = Operation::Connect {
            ssid: "Ghost".into(),
            password: None,
        };
        assert_eq!(
            run(&ctx, op, None).await,
            Err(ConnectionError::NotFound("Ghost".into()))
        );
    }
}
