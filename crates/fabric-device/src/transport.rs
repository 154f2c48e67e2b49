//! Transport contract between adapters and a device session.
//!
//! Adapters only ever see `&mut dyn Transport`; the orchestrator obtains
//! sessions through a [`TransportFactory`], so neither names a concrete
//! protocol implementation.

use async_trait::async_trait;

use crate::error::{DeviceError, DeviceResult, NOT_AUTHORIZED_MESSAGE};
use crate::target::DeviceTarget;
use crate::xml::XmlElement;

/// Prefix NETCONF client libraries put in front of rpc-error messages.
pub const NETCONF_ERROR_PREFIX: &str = "netconf rpc [error] ";

/// A request/response session with one device.
///
/// A session is owned by exactly one device task and never shared.
#[async_trait]
pub trait Transport: Send {
    /// Host this session talks to.
    fn host(&self) -> &str;

    async fn login(&mut self) -> DeviceResult<()>;

    /// Reads running configuration selected by an XPath filter.
    async fn get_config(&mut self, filter: &str) -> DeviceResult<String>;

    /// Merges a configuration fragment into running configuration.
    async fn edit_config(&mut self, fragment: &str) -> DeviceResult<String>;

    /// Sends a raw RPC body and returns the reply.
    async fn execute_rpc(&mut self, request: &str) -> DeviceResult<String>;

    async fn close(&mut self) -> DeviceResult<()>;
}

/// Creates unconnected sessions for device targets.
pub trait TransportFactory: Send + Sync {
    fn connect(&self, target: &DeviceTarget) -> DeviceResult<Box<dyn Transport>>;
}

/// Classifies a reply body, turning any `<rpc-error>` into a [`DeviceError`].
///
/// `access-denied` becomes [`DeviceError::NotAuthorized`]; any other error
/// becomes [`DeviceError::Protocol`] with the error message, or the error tag
/// when the device sent no message.
pub fn classify_reply(reply: &str) -> DeviceResult<()> {
    if !reply.contains("rpc-error") {
        return Ok(());
    }
    let doc = XmlElement::parse(reply)?;
    let Some(rpc_error) = doc.find("rpc-error") else {
        return Ok(());
    };

    let tag = rpc_error.find_text("error-tag").unwrap_or_default().trim();
    if tag == "access-denied" {
        return Err(DeviceError::NotAuthorized);
    }

    let message = rpc_error
        .find_text("error-message")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(tag);
    Err(DeviceError::protocol(message))
}

/// Classifies an error message raised below the reply level.
///
/// Messages carrying [`NETCONF_ERROR_PREFIX`] are reduced to the device's own
/// text; an authorization refusal is normalised; everything else is passed
/// through as an opaque transport error.
pub fn classify_transport_message(host: &str, message: &str) -> DeviceError {
    if message.contains(NOT_AUTHORIZED_MESSAGE) {
        return DeviceError::NotAuthorized;
    }
    if let Some(pos) = message.rfind(NETCONF_ERROR_PREFIX) {
        let rest = &message[pos + NETCONF_ERROR_PREFIX.len()..];
        if !rest.is_empty() {
            return DeviceError::protocol(rest);
        }
    }
    DeviceError::transport(host, message)
}

/// Wraps an XPath filter in a `<get-config>` request.
pub fn build_get_config(filter: &str) -> String {
    format!(
        "<get-config><source><running/></source><filter type=\"xpath\" select=\"{}\"/></get-config>",
        crate::xml::escape(filter)
    )
}

/// Wraps a configuration fragment in an `<edit-config>` request.
pub fn build_edit_config(fragment: &str) -> String {
    format!(
        "<edit-config><target><running/></target>{}</edit-config>",
        fragment
    )
}
