//! Request execution: sanitize, sign, send, decode.
//!
//! # Design
//! `RequestExecutor` holds only the transport and signer, both behind
//! `Arc`. The request and handler for a call are passed in and consumed,
//! so one executor can be shared by the facade and any number of
//! background workers.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::decode::{decode, ResponseHandler};
use crate::error::GeoError;
use crate::http::{sanitize_query, HttpRequest};
use crate::signing::RequestSigner;
use crate::transport::Transport;

pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    signer: Arc<dyn RequestSigner>,
}

impl std::fmt::Debug for RequestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestExecutor").finish_non_exhaustive()
    }
}

impl RequestExecutor {
    pub fn new(transport: Arc<dyn Transport>, signer: Arc<dyn RequestSigner>) -> Self {
        Self { transport, signer }
    }

    /// Dispatch `request` and decode the reply with `handler`.
    ///
    /// Returns `Ok(None)` for a successful reply without a body.
    pub fn execute<H: ResponseHandler>(
        &self,
        mut request: HttpRequest,
        handler: &H,
    ) -> Result<Option<H::Output>, GeoError> {
        let sanitized = sanitize_query(&request.url);
        if sanitized != request.url {
            trace!(from = %request.url, to = %sanitized, "stripped empty query parameters");
            request.url = sanitized;
        }

        self.signer.sign(&mut request)?;

        debug!(method = %request.method, url = %request.url, "dispatching request");
        let response = self.transport.send(&request)?;
        debug!(status = response.status, url = %request.url, "received response");

        decode(response, handler)
    }
}
