//! RemoteCall trait - Dispatcher input interface
//!
//! One network request against one endpoint.

use std::future::Future;

use crate::{CallContext, CallError, CallReply, EndpointCall};

/// Remote call injected into the dispatcher
///
/// Implementations should observe `ctx` (cancellation and deadline) and return
/// early once it fires; the dispatcher does not abort attempts on its own.
#[trait_variant::make(RemoteCall: Send)]
pub trait LocalRemoteCall {
    /// Perform one request
    ///
    /// # Errors
    /// Returns the per-attempt failure; the dispatcher tags it with the endpoint.
    async fn call(&self, request: &EndpointCall, ctx: &CallContext)
        -> Result<CallReply, CallError>;
}

/// Adapter turning a closure into a [`RemoteCall`]
///
/// ```ignore
/// let caller = FnRemoteCall::new(|call: EndpointCall, ctx: CallContext| async move {
///     http_post(&call.endpoint, &call.method, call.params, ctx).await
/// });
/// ```
#[derive(Clone)]
pub struct FnRemoteCall<F> {
    f: F,
}

impl<F> FnRemoteCall<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> RemoteCall for FnRemoteCall<F>
where
    F: Fn(EndpointCall, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<CallReply, CallError>> + Send,
{
    async fn call(
        &self,
        request: &EndpointCall,
        ctx: &CallContext,
    ) -> Result<CallReply, CallError> {
        (self.f)(request.clone(), ctx.clone()).await
    }
}
