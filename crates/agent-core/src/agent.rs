//! Agent Process Loop
//!
//! An agent is a [`Handler`] behind a mailbox. [`serve`] drains the mailbox
//! and handles each request on its own task, so a slow request never blocks
//! the agent from accepting the next one.

use async_trait::async_trait;
use std::sync::Arc;

use crate::mailbox::{Ask, Envelope, Mailbox};
use crate::session::SessionId;

/// Request handler for an agent process
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Agent name used in logs
    fn name(&self) -> &'static str;

    /// Handle one request. Failures are folded into the response type.
    async fn handle(&self, session: &SessionId, request: Self::Request) -> Self::Response;
}

/// Run `handler` until every postbox for `mailbox` is dropped
pub async fn serve<H: Handler>(mut mailbox: Mailbox<Ask<H::Request, H::Response>>, handler: Arc<H>) {
    let address = mailbox.address().clone();
    tracing::info!(agent = handler.name(), %address, "Agent listening");

    while let Some(envelope) = mailbox.recv().await {
        let handler = handler.clone();
        let address = address.clone();

        tokio::spawn(async move {
            let Envelope {
                id,
                session,
                sender,
                payload: Ask { body, reply_to },
                ..
            } = envelope;

            tracing::debug!(agent = handler.name(), %session, %sender, request = %id, "Handling request");
            let response = handler.handle(&session, body).await;

            let reply = Envelope::reply(id, session, address, response);
            if let Err(e) = reply_to.deliver(reply).await {
                // Requester gave up (timeout or cancellation); drop the reply.
                tracing::debug!(agent = handler.name(), request = %id, "Reply discarded: {}", e);
            }
        });
    }

    tracing::info!(agent = handler.name(), %address, "Agent stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::{mailbox, Address};
    use std::time::Duration;

    struct Upper;

    #[async_trait]
    impl Handler for Upper {
        type Request = String;
        type Response = String;

        fn name(&self) -> &'static str {
            "upper"
        }

        async fn handle(&self, _session: &SessionId, request: String) -> String {
            request.to_uppercase()
        }
    }

    #[tokio::test]
    async fn test_serve_replies() {
        let (postbox, inbox) = mailbox(Address::new("agent://upper"), 8);
        let task = tokio::spawn(serve(inbox, Arc::new(Upper)));

        let reply = postbox
            .ask(
                &Address::new("agent://client"),
                &SessionId::new(),
                "sol".to_string(),
                Duration::from_secs(1),
            )
            .await
            .unwrap();
        assert_eq!(reply, "SOL");

        drop(postbox);
        task.await.unwrap();
    }
}
