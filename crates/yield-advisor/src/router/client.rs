//! Client side of the session protocol
//!
//! A [`Conversation`] owns one session with the router and a private mailbox
//! for the frames it sends back. Used by the HTTP front door and by tests.

use std::time::Duration;
use uuid::Uuid;

use agent_core::{mailbox, Address, AgentError, ChatMessage, ClientFrame, Mailbox, Postbox, SessionId};

use super::process::RouterHandle;
use super::reply::QueryReply;

const FRAME_BUFFER: usize = 32;

pub struct Conversation {
    router: RouterHandle,
    session: SessionId,
    address: Address,
    reply_to: Postbox<ClientFrame>,
    frames: Mailbox<ClientFrame>,
}

impl Conversation {
    pub fn open(router: RouterHandle, session: SessionId) -> Self {
        let address = Address::ephemeral();
        let (reply_to, frames) = mailbox(address.clone(), FRAME_BUFFER);
        Self {
            router,
            session,
            address,
            reply_to,
            frames,
        }
    }

    pub const fn session(&self) -> &SessionId {
        &self.session
    }

    pub async fn send(&self, message: ChatMessage) -> agent_core::Result<Uuid> {
        self.router
            .send(&self.session, &self.address, message, self.reply_to.clone())
            .await
    }

    /// Next frame of any kind
    pub async fn next_frame(&mut self, within: Duration) -> agent_core::Result<ClientFrame> {
        match tokio::time::timeout(within, self.frames.recv()).await {
            Ok(Some(envelope)) => Ok(envelope.payload),
            Ok(None) => Err(AgentError::MailboxClosed(self.address.to_string())),
            Err(_) => Err(AgentError::Timeout {
                address: self.router.address().to_string(),
                after_ms: u64::try_from(within.as_millis()).unwrap_or(u64::MAX),
            }),
        }
    }

    /// Wait for the message answering `msg_id`, skipping acks and anything else
    pub async fn reply_to(&mut self, msg_id: Uuid, within: Duration) -> agent_core::Result<ChatMessage> {
        let deadline = tokio::time::Instant::now() + within;
        loop {
            let left = deadline.saturating_duration_since(tokio::time::Instant::now());
            match self.next_frame(left).await? {
                ClientFrame::Message(message) if message.in_reply_to == Some(msg_id) => return Ok(message),
                ClientFrame::Message(other) => {
                    tracing::debug!(session = %self.session, message = %other.msg_id, "Skipping unrelated message");
                }
                ClientFrame::Ack(_) => {}
            }
        }
    }

    /// Send a text query and wait for its reply
    pub async fn ask(&mut self, text: &str, within: Duration) -> agent_core::Result<QueryReply> {
        let msg_id = self.send(ChatMessage::text(text)).await?;
        let message = self.reply_to(msg_id, within).await?;
        QueryReply::from_chat(&message)
            .ok_or_else(|| AgentError::Other(format!("reply to {msg_id} carried no intent")))
    }

    /// Send `EndSession`; the router cancels anything still in flight
    pub async fn close(self) -> agent_core::Result<()> {
        self.send(ChatMessage::end_session()).await.map(|_| ())
    }
}
