//! Delivery of one-time codes.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::PhoneNumber;

use crate::error::{BookingError, Result};

/// Hands a freshly issued one-time code to its delivery channel.
#[async_trait]
pub trait OtpSender: Send + Sync {
    async fn send(&self, phone: &PhoneNumber, code: &str) -> Result<()>;
}

/// Sender that only writes a log line; used where no SMS gateway is wired.
#[derive(Debug, Clone, Default)]
pub struct LoggingOtpSender;

#[async_trait]
impl OtpSender for LoggingOtpSender {
    async fn send(&self, phone: &PhoneNumber, _code: &str) -> Result<()> {
        tracing::info!(%phone, "One-time code issued");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryOtpState {
    sent: Vec<(PhoneNumber, String)>,
    fail_on_send: bool,
}

/// In-memory sender for testing; keeps every code it was handed.
#[derive(Debug, Clone, Default)]
pub struct InMemoryOtpSender {
    state: Arc<RwLock<InMemoryOtpState>>,
}

impl InMemoryOtpSender {
    /// Creates a new in-memory sender.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the sender to fail on every send call.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.state.write().unwrap().fail_on_send = fail;
    }

    /// Returns the codes handed over so far, oldest first.
    pub fn sent(&self) -> Vec<(PhoneNumber, String)> {
        self.state.read().unwrap().sent.clone()
    }

    /// Returns the last code sent to `phone`.
    pub fn last_code_for(&self, phone: &PhoneNumber) -> Option<String> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, code)| code.clone())
    }
}

#[async_trait]
impl OtpSender for InMemoryOtpSender {
    async fn send(&self, phone: &PhoneNumber, code: &str) -> Result<()> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_send {
            return Err(BookingError::Delivery(format!("gateway rejected {phone}")));
        }

        state.sent.push((phone.clone(), code.to_string()));
        Ok(())
    }
}
