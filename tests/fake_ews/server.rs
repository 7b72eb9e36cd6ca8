//! In-process fake Exchange server
//!
//! `FakeExchange` implements the crate's `Transport` trait. The client
//! it creates answers each operation from a `Mailbox` via the handlers
//! in `handlers`, parsing the resulting SOAP envelope into the
//! structured shape the real transport would deliver.
//!
//! Tests can also force a transport error for an operation, or replace
//! its answer with a hand-written structured value to exercise shapes
//! the XML path never produces (e.g. a one-element item sequence).

use super::handlers;
use super::mailbox::Mailbox;
use async_trait::async_trait;
use ews_client::soap::parse_response;
use ews_client::{
    NtlmSecurity, Operation, SoapClient, Transport, TransportError, TransportOptions, XmlFragment,
};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    requests: Vec<(Operation, String)>,
    security: Option<NtlmSecurity>,
    service_description: Option<PathBuf>,
    options: Option<TransportOptions>,
    failures: HashMap<Operation, TransportError>,
    canned: HashMap<Operation, Value>,
}

/// A fake EWS endpoint backed by an in-memory mailbox.
#[derive(Clone)]
pub struct FakeExchange {
    mailbox: Arc<Mailbox>,
    state: Arc<Mutex<State>>,
}

impl FakeExchange {
    pub fn new(mailbox: Mailbox) -> Self {
        Self {
            mailbox: Arc::new(mailbox),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// Make every `operation` call fail with `message`.
    pub fn fail(self, operation: Operation, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, TransportError::new(message));
        self
    }

    /// Answer `operation` with `response` instead of consulting the mailbox.
    pub fn canned(self, operation: Operation, response: Value) -> Self {
        self.state
            .lock()
            .unwrap()
            .canned
            .insert(operation, response);
        self
    }

    /// Every request received so far, in order.
    pub fn requests(&self) -> Vec<(Operation, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn security(&self) -> Option<NtlmSecurity> {
        self.state.lock().unwrap().security.clone()
    }

    pub fn service_description(&self) -> Option<PathBuf> {
        self.state.lock().unwrap().service_description.clone()
    }

    pub fn options(&self) -> Option<TransportOptions> {
        self.state.lock().unwrap().options.clone()
    }
}

#[async_trait]
impl Transport for FakeExchange {
    async fn create(
        &self,
        service_description: &Path,
        options: &TransportOptions,
    ) -> Result<Box<dyn SoapClient>, TransportError> {
        let mut state = self.state.lock().unwrap();
        state.service_description = Some(service_description.to_path_buf());
        state.options = Some(options.clone());
        Ok(Box::new(FakeClient {
            server: self.clone(),
        }))
    }
}

struct FakeClient {
    server: FakeExchange,
}

#[async_trait]
impl SoapClient for FakeClient {
    fn set_security(&mut self, security: NtlmSecurity) -> Result<(), TransportError> {
        self.server.state.lock().unwrap().security = Some(security);
        Ok(())
    }

    async fn call(
        &self,
        operation: Operation,
        request: XmlFragment,
    ) -> Result<Value, TransportError> {
        let request = request.into_string();
        {
            let mut state = self.server.state.lock().unwrap();
            state.requests.push((operation, request.clone()));
            if let Some(error) = state.failures.get(&operation) {
                return Err(error.clone());
            }
            if let Some(response) = state.canned.get(&operation) {
                return Ok(response.clone());
            }
        }

        let mailbox = &self.server.mailbox;
        let xml = match operation {
            Operation::FindItem => handlers::find_item(mailbox, &request),
            Operation::GetItem => handlers::get_item(mailbox, &request),
            Operation::CreateItem => handlers::create_item(&request),
            Operation::FindFolder => handlers::find_folder(mailbox, &request),
        };
        parse_response(&xml).map_err(|e| TransportError::new(e.to_string()))
    }
}
