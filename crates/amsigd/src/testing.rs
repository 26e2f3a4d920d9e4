//! Test doubles shared by the unit tests.

use std::sync::Mutex;

use amsig_core::{Receiver, ReceiverTable};
use amsig_protocol::{RequestBody, RequestId};
use async_trait::async_trait;

use crate::connection::{OnAssigned, RequestSink};
use crate::error::ConnectionError;

/// Records every request instead of writing it to a socket.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<RequestBody>>,
    fail: bool,
}

impl RecordingSink {
    /// A sink whose every send fails with `NotConnected`.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<RequestBody> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RequestSink for RecordingSink {
    async fn send_tracked(
        &self,
        body: RequestBody,
        on_assigned: OnAssigned<'_>,
    ) -> Result<RequestId, ConnectionError> {
        if self.fail {
            return Err(ConnectionError::NotConnected);
        }
        let mut sent = self.sent.lock().unwrap();
        sent.push(body);
        let id = RequestId::from(sent.len() as u64);
        on_assigned(&id);
        Ok(id)
    }
}

/// A one-receiver table named `ops`, sending from `+1000`.
pub fn receivers(to: &[&str]) -> ReceiverTable {
    ReceiverTable::new(vec![Receiver {
        name: "ops".to_string(),
        sender: "+1000".to_string(),
        to: to.iter().map(|s| s.to_string()).collect(),
        template: "default".to_string(),
        subscribe: false,
    }])
    .unwrap()
}
