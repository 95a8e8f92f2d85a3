//! Marketo SOAP client and request signing.
//!
//! This module provides the [`SoapClient`] for issuing signed calls against
//! the Marketo SOAP API, the [`RpcTransport`] seam it runs over, and the
//! credential/signature types ([`Credentials`], [`Signature`]).

mod auth;
mod soap;
mod transport;

pub use auth::{AuthHeader, Credentials, Signature};
pub use soap::{RETRY_TIMEOUT_COUNT, SoapClient};
pub use transport::{CALL_TIMEOUT_SECS, HttpSoapTransport, RpcFailure, RpcTransport};
