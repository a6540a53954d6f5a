use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::{JobOptions, JobQueue, Worker};
use crate::error::Result;
use crate::registration::StreamWebhookRegistrar;
use crate::users::{UserId, UserStore};

/// Registers the Twitch stream webhook for one user
pub struct TwitchWebhookRegistrationWorker {
    users: Arc<dyn UserStore>,
    registrar: Arc<dyn StreamWebhookRegistrar>,
}

impl TwitchWebhookRegistrationWorker {
    pub fn new(users: Arc<dyn UserStore>, registrar: Arc<dyn StreamWebhookRegistrar>) -> Self {
        Self { users, registrar }
    }
}

#[async_trait]
impl Worker for TwitchWebhookRegistrationWorker {
    type Args = UserId;
    const NAME: &'static str = "TwitchWebhookRegistrationWorker";

    fn options() -> JobOptions {
        JobOptions {
            queue: "low_priority",
            retry: 1,
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn perform(&self, user_id: UserId) -> Result<()> {
        let Some(user) = self.users.find(user_id).await? else {
            debug!(%user_id, "User not found, nothing to register");
            return Ok(());
        };
        if !user.twitch_username_present() {
            debug!(%user_id, "User has no Twitch username, nothing to register");
            return Ok(());
        }

        self.registrar.register(&user).await?;
        Ok(())
    }
}

/// Fans out a registration job for every user with a Twitch username
pub struct RegisterAllTwitchWebhooksWorker {
    users: Arc<dyn UserStore>,
    queue: JobQueue,
}

impl RegisterAllTwitchWebhooksWorker {
    pub fn new(users: Arc<dyn UserStore>, queue: JobQueue) -> Self {
        Self { users, queue }
    }
}

#[async_trait]
impl Worker for RegisterAllTwitchWebhooksWorker {
    type Args = ();
    const NAME: &'static str = "RegisterAllTwitchWebhooksWorker";

    fn options() -> JobOptions {
        JobOptions {
            queue: "low_priority",
            retry: 0,
        }
    }

    async fn perform(&self, _args: ()) -> Result<()> {
        let user_ids = self.users.ids_with_twitch_username().await?;
        for user_id in &user_ids {
            self.queue
                .enqueue::<TwitchWebhookRegistrationWorker>(*user_id)
                .await?;
        }
        info!(count = user_ids.len(), "Enqueued Twitch webhook registrations");
        Ok(())
    }
}
