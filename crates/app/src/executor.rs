//! Action executor — turns one [`Action`] into one outbound message.

use std::sync::Arc;

use homeflow_domain::automation::{Action, ActionKind};
use homeflow_domain::device_state::UNKNOWN_DEVICE_TYPE;
use homeflow_domain::error::HomeflowError;
use homeflow_domain::id::AutomationId;
use homeflow_domain::message::Outbound;

use crate::device_cache::DeviceStateCache;
use crate::ports::{Clock, MessagePublisher};

/// Why an action did not execute.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    #[error("unsupported action type `{0}`")]
    Unsupported(String),

    #[error("`{field}` is required for {kind} action")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("failed to dispatch action")]
    Dispatch(#[source] HomeflowError),
}

/// Executes single actions on behalf of an automation.
pub struct ActionExecutor<P> {
    publisher: P,
    devices: Arc<DeviceStateCache>,
    clock: Arc<dyn Clock>,
}

impl<P: MessagePublisher> ActionExecutor<P> {
    pub fn new(publisher: P, devices: Arc<DeviceStateCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            publisher,
            devices,
            clock,
        }
    }

    /// Wait for the action's delay, if any, then dispatch it.
    ///
    /// # Errors
    ///
    /// Returns [`ActionError`] when the action kind is unsupported, a
    /// required field is missing, or the publisher rejects the message.
    #[tracing::instrument(skip_all, fields(automation_id = %automation_id, action = %action.kind))]
    pub async fn execute(
        &self,
        action: &Action,
        automation_id: &AutomationId,
    ) -> Result<(), ActionError> {
        if let Some(delay) = action.delay() {
            tracing::debug!(delay_secs = delay.as_secs(), "delaying action");
            tokio::time::sleep(delay).await;
        }

        let message = self.build(action)?;
        let subject = message.subject.clone();
        self.publisher
            .publish(message)
            .await
            .map_err(ActionError::Dispatch)?;
        tracing::info!(%subject, "action dispatched");
        Ok(())
    }

    fn build(&self, action: &Action) -> Result<Outbound, ActionError> {
        let at = self.clock.now();
        match &action.kind {
            ActionKind::DeviceCommand => {
                let device_id = action
                    .device_id
                    .as_ref()
                    .filter(|id| !id.is_empty())
                    .ok_or(ActionError::MissingField {
                        kind: "device_command",
                        field: "device_id",
                    })?;
                let device_type = self.devices.device_type(device_id).unwrap_or_else(|| {
                    tracing::warn!(%device_id, "device type unknown, addressing as `unknown`");
                    UNKNOWN_DEVICE_TYPE.to_string()
                });
                Ok(Outbound::device_command(
                    &device_type,
                    device_id,
                    action.command.as_deref(),
                    &action.data,
                    at,
                ))
            }
            ActionKind::SceneActivate => {
                let scene = action
                    .scene
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(ActionError::MissingField {
                        kind: "scene_activate",
                        field: "scene",
                    })?;
                Ok(Outbound::scene_activation(scene, at))
            }
            ActionKind::Notification => Ok(Outbound::notification(&action.data, at)),
            ActionKind::Other(kind) => Err(ActionError::Unsupported(kind.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use homeflow_domain::id::DeviceId;
    use homeflow_domain::value::{AttributeValue, Attributes};

    use super::*;
    use crate::testing::{FixedClock, SpyPublisher};

    fn executor(publisher: Arc<SpyPublisher>) -> (ActionExecutor<Arc<SpyPublisher>>, Arc<DeviceStateCache>) {
        let devices = Arc::new(DeviceStateCache::new());
        let exec = ActionExecutor::new(publisher, Arc::clone(&devices), Arc::new(FixedClock::default()));
        (exec, devices)
    }

    fn owner() -> AutomationId {
        AutomationId::new("a1")
    }

    #[tokio::test]
    async fn should_address_command_by_cached_device_type() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, devices) = executor(Arc::clone(&spy));
        devices.merge(
            &DeviceId::new("lamp"),
            Some("light"),
            &Attributes::from([("state".to_string(), AttributeValue::from("off"))]),
            homeflow_domain::time::now(),
        );

        let action = Action::device_command("lamp", "turn_on").with_data("brightness", 80);
        exec.execute(&action, &owner()).await.unwrap();

        let sent = spy.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "home.devices.light.lamp.command");
        assert_eq!(sent[0].payload["command"], "turn_on");
        assert_eq!(sent[0].payload["brightness"], 80);
    }

    #[tokio::test]
    async fn should_use_unknown_device_type_when_device_not_cached() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, _) = executor(Arc::clone(&spy));

        exec.execute(&Action::device_command("lamp", "turn_on"), &owner())
            .await
            .unwrap();

        assert_eq!(spy.subjects(), vec!["home.devices.unknown.lamp.command"]);
    }

    #[tokio::test]
    async fn should_publish_scene_activation() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, _) = executor(Arc::clone(&spy));

        exec.execute(&Action::scene("movie"), &owner()).await.unwrap();

        assert_eq!(spy.subjects(), vec!["home.scenes.movie.activate"]);
    }

    #[tokio::test]
    async fn should_publish_notification() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, _) = executor(Arc::clone(&spy));

        let action = Action::notification("Door", "Front door opened").with_data("priority", "high");
        exec.execute(&action, &owner()).await.unwrap();

        let sent = spy.messages();
        assert_eq!(sent[0].subject, "home.notifications.send");
        assert_eq!(sent[0].payload["title"], "Door");
        assert_eq!(sent[0].payload["priority"], "high");
    }

    #[tokio::test]
    async fn should_reject_unknown_action_kind() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, _) = executor(Arc::clone(&spy));

        let action = Action::of_kind(ActionKind::Other("webhook".to_string()));
        let result = exec.execute(&action, &owner()).await;

        assert!(matches!(result, Err(ActionError::Unsupported(kind)) if kind == "webhook"));
        assert!(spy.messages().is_empty());
    }

    #[tokio::test]
    async fn should_reject_device_command_without_device() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, _) = executor(Arc::clone(&spy));

        let action = Action::of_kind(ActionKind::DeviceCommand);
        let result = exec.execute(&action, &owner()).await;

        assert!(matches!(
            result,
            Err(ActionError::MissingField {
                field: "device_id",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn should_report_dispatch_failure() {
        let spy = Arc::new(SpyPublisher::failing_on("home.scenes.movie.activate"));
        let (exec, _) = executor(Arc::clone(&spy));

        let result = exec.execute(&Action::scene("movie"), &owner()).await;

        assert!(matches!(result, Err(ActionError::Dispatch(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn should_wait_for_delay_before_dispatching() {
        let spy = Arc::new(SpyPublisher::default());
        let (exec, _) = executor(Arc::clone(&spy));
        let start = tokio::time::Instant::now();

        exec.execute(&Action::scene("movie").with_delay(2), &owner())
            .await
            .unwrap();

        let sent_at = spy.sent_at()[0];
        assert!(sent_at.duration_since(start) >= Duration::from_secs(2));
    }
}
