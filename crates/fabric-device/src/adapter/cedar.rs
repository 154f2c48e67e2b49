//! SLX 9240 (Cedar) generation.

use async_trait::async_trait;

use crate::error::DeviceResult;
use crate::transport::Transport;

use super::templates;
use super::{AnycastGatewayParams, DeviceAdapter, SwitchingBase};

/// Cedar has no IPv6 anycast gateway.
#[derive(Debug, Clone, Default)]
pub struct Cedar {
    switching: SwitchingBase,
}

impl Cedar {
    pub fn new() -> Self {
        Self {
            switching: SwitchingBase::new(),
        }
    }
}

#[async_trait]
impl DeviceAdapter for Cedar {
    fn name(&self) -> &'static str {
        "slx-cedar"
    }

    fn delegate(&self) -> Option<&dyn DeviceAdapter> {
        Some(&self.switching)
    }

    async fn configure_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
        params: &AnycastGatewayParams,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_anycast_gateway(params, false))
            .await
    }

    async fn unconfigure_anycast_gateway(
        &self,
        transport: &mut dyn Transport,
    ) -> DeviceResult<String> {
        transport
            .edit_config(&templates::build_anycast_gateway_delete(false))
            .await
    }
}
