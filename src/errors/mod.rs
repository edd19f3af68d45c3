mod harness_error;
mod rpc_error;

pub use harness_error::{ErrorResult, HarnessError, TransportError, TransportErrorKind};
pub use rpc_error::{RpcError, RpcErrorCode};
