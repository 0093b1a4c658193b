//! Agent Mailboxes
//!
//! Per-recipient bounded queues carrying typed [`Envelope`]s. Every envelope
//! names its session explicitly; nothing is inferred from transport state.
//!
//! Delivery is at-least-once from the receiver's point of view: a recipient
//! must tolerate seeing the same envelope id twice. Request/reply is built on
//! top with [`Ask`] and [`Postbox::ask`], which correlates replies by the
//! request envelope id and discards anything else.

use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::session::SessionId;

/// Stable, opaque agent address
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// One-off address for a reply mailbox
    pub fn ephemeral() -> Self {
        Self(format!("reply://{}", Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message in flight between agents
#[derive(Clone, Debug)]
pub struct Envelope<T> {
    /// Unique envelope id
    pub id: Uuid,

    /// Id of the request this envelope answers
    pub correlation: Option<Uuid>,

    /// Session the payload belongs to
    pub session: SessionId,

    /// Sending agent
    pub sender: Address,

    pub sent_at: DateTime<Utc>,

    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(session: SessionId, sender: Address, payload: T) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation: None,
            session,
            sender,
            sent_at: Utc::now(),
            payload,
        }
    }

    /// Build a reply correlated with `request`
    pub fn reply(request: Uuid, session: SessionId, sender: Address, payload: T) -> Self {
        Self {
            correlation: Some(request),
            ..Self::new(session, sender, payload)
        }
    }
}

/// Sending half of a mailbox
pub struct Postbox<T> {
    address: Address,
    tx: mpsc::Sender<Envelope<T>>,
}

impl<T> Clone for Postbox<T> {
    fn clone(&self) -> Self {
        Self {
            address: self.address.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<T> std::fmt::Debug for Postbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Postbox").field("address", &self.address).finish()
    }
}

impl<T: Send> Postbox<T> {
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Queue an envelope, waiting for capacity
    pub async fn deliver(&self, envelope: Envelope<T>) -> Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| AgentError::MailboxClosed(self.address.to_string()))
    }

    /// Wrap `payload` in an envelope and queue it
    pub async fn post(&self, session: &SessionId, sender: &Address, payload: T) -> Result<Uuid> {
        let envelope = Envelope::new(session.clone(), sender.clone(), payload);
        let id = envelope.id;
        self.deliver(envelope).await?;
        Ok(id)
    }

    /// Queue `payload` only if there is room right now; never waits
    pub fn try_post(&self, session: &SessionId, sender: &Address, payload: T) -> Result<Uuid> {
        let envelope = Envelope::new(session.clone(), sender.clone(), payload);
        let id = envelope.id;
        self.tx.try_send(envelope).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => AgentError::MailboxFull(self.address.to_string()),
            mpsc::error::TrySendError::Closed(_) => AgentError::MailboxClosed(self.address.to_string()),
        })?;
        Ok(id)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half of a mailbox
pub struct Mailbox<T> {
    address: Address,
    rx: mpsc::Receiver<Envelope<T>>,
}

impl<T> Mailbox<T> {
    pub const fn address(&self) -> &Address {
        &self.address
    }

    /// Wait for the next envelope; `None` once every postbox is dropped
    pub async fn recv(&mut self) -> Option<Envelope<T>> {
        self.rx.recv().await
    }

    /// Take an envelope if one is already queued
    pub fn try_recv(&mut self) -> Option<Envelope<T>> {
        self.rx.try_recv().ok()
    }
}

/// Create a bounded mailbox for `address`
pub fn mailbox<T>(address: Address, capacity: usize) -> (Postbox<T>, Mailbox<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (
        Postbox {
            address: address.clone(),
            tx,
        },
        Mailbox { address, rx },
    )
}

/// Request payload that carries where to send the answer
pub struct Ask<Req, Resp> {
    pub body: Req,
    pub reply_to: Postbox<Resp>,
}

impl<Req, Resp> Postbox<Ask<Req, Resp>>
where
    Req: Send,
    Resp: Send,
{
    /// Send a request and wait up to `within` for the correlated reply
    pub async fn ask(
        &self,
        from: &Address,
        session: &SessionId,
        body: Req,
        within: Duration,
    ) -> Result<Resp> {
        let (reply_to, mut replies) = mailbox::<Resp>(Address::ephemeral(), 4);
        let request = Envelope::new(session.clone(), from.clone(), Ask { body, reply_to });
        let request_id = request.id;

        tokio::time::timeout(within, async {
            self.deliver(request).await?;
            while let Some(reply) = replies.recv().await {
                if reply.correlation == Some(request_id) {
                    return Ok(reply.payload);
                }
                tracing::debug!(
                    agent = %self.address,
                    envelope = %reply.id,
                    "Discarding uncorrelated reply"
                );
            }
            Err(AgentError::MailboxClosed(self.address.to_string()))
        })
        .await
        .map_err(|_| AgentError::Timeout {
            address: self.address.to_string(),
            after_ms: u64::try_from(within.as_millis()).unwrap_or(u64::MAX),
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_and_receive() {
        let (postbox, mut inbox) = mailbox::<String>(Address::new("agent://echo"), 8);
        let session = SessionId::from_string("s-1");
        let id = postbox
            .post(&session, &Address::new("agent://client"), "hello".into())
            .await
            .unwrap();

        let envelope = inbox.recv().await.unwrap();
        assert_eq!(envelope.id, id);
        assert_eq!(envelope.session, session);
        assert_eq!(envelope.payload, "hello");
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_ask_ignores_uncorrelated_replies() {
        let (postbox, mut inbox) = mailbox::<Ask<u32, u32>>(Address::new("agent://double"), 8);

        tokio::spawn(async move {
            while let Some(envelope) = inbox.recv().await {
                let Ask { body, reply_to } = envelope.payload;
                // A stray duplicate first, then the real answer.
                let stray = Envelope::reply(Uuid::new_v4(), envelope.session.clone(), Address::new("agent://double"), 0);
                reply_to.deliver(stray).await.unwrap();
                let reply = Envelope::reply(envelope.id, envelope.session, Address::new("agent://double"), body * 2);
                reply_to.deliver(reply).await.unwrap();
            }
        });

        let answer = postbox
            .ask(&Address::new("agent://client"), &SessionId::new(), 21, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(answer, 42);
    }

    #[tokio::test]
    async fn test_ask_times_out() {
        let (postbox, _inbox) = mailbox::<Ask<u32, u32>>(Address::new("agent://silent"), 8);

        let err = postbox
            .ask(&Address::new("agent://client"), &SessionId::new(), 1, Duration::from_millis(20))
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Timeout { after_ms: 20, .. }));
        assert_eq!(err.code(), "downstream_timeout");
    }

    #[tokio::test]
    async fn test_ask_closed_mailbox() {
        let (postbox, inbox) = mailbox::<Ask<u32, u32>>(Address::new("agent://gone"), 8);
        drop(inbox);

        let err = postbox
            .ask(&Address::new("agent://client"), &SessionId::new(), 1, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::MailboxClosed(_)));
    }

    #[tokio::test]
    async fn test_try_post_never_waits() {
        let (postbox, mut inbox) = mailbox::<u32>(Address::new("client://slow"), 1);
        let session = SessionId::new();
        let from = Address::new("agent://router");

        postbox.try_post(&session, &from, 1).unwrap();
        let err = postbox.try_post(&session, &from, 2).unwrap_err();
        assert!(matches!(err, AgentError::MailboxFull(_)));

        assert_eq!(inbox.recv().await.unwrap().payload, 1);
        drop(inbox);
        let err = postbox.try_post(&session, &from, 3).unwrap_err();
        assert!(matches!(err, AgentError::MailboxClosed(_)));
    }
}
