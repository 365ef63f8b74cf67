use std::future::Future;

use roblox_types::{CallFailure, CallPayload, CallRequest};

/// Performs one named remote call against the directory.
///
/// Implementations must not mutate shared state beyond the outbound call
/// itself and must not retry.
pub trait DirectoryGateway: Send + Sync + 'static {
    fn call(
        &self,
        request: &CallRequest,
    ) -> impl Future<Output = Result<CallPayload, CallFailure>> + Send;
}
