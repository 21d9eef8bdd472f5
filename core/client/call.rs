//! A closed set of the eight `HttpClient` operations, reified as data so the
//! decorator layers (redirecting, retryable, sessioned) can each implement
//! their cross-cutting behavior once instead of per-operation.

use crate::error::ClientError;
use crate::transport::{EurekaHttpResponse, HttpClient, RequestKind};

pub enum Call<'a> {
    Register(&'a [u8]),
    Cancel { app_name: &'a str, instance_id: &'a str },
    Heartbeat { app_name: &'a str, instance_id: &'a str },
    StatusUpdate { app_name: &'a str, instance_id: &'a str, status: &'a str },
    GetApplications,
    GetDelta,
    GetVip { vip_address: &'a str },
    GetById { app_name: &'a str, instance_id: &'a str },
}

impl<'a> Call<'a> {
    pub fn kind(&self) -> RequestKind {
        match self {
            Call::Register(_) => RequestKind::Register,
            Call::Cancel { .. } => RequestKind::Cancel,
            Call::Heartbeat { .. } => RequestKind::Heartbeat,
            Call::StatusUpdate { .. } => RequestKind::StatusUpdate,
            Call::GetApplications | Call::GetDelta | Call::GetVip { .. } | Call::GetById { .. } => RequestKind::Read,
        }
    }
}

pub async fn apply_call(client: &dyn HttpClient, call: &Call<'_>) -> Result<EurekaHttpResponse, ClientError> {
    match call {
        Call::Register(instance_info) => client.register(instance_info).await,
        Call::Cancel { app_name, instance_id } => client.cancel(app_name, instance_id).await,
        Call::Heartbeat { app_name, instance_id } => client.send_heartbeat(app_name, instance_id).await,
        Call::StatusUpdate { app_name, instance_id, status } => client.status_update(app_name, instance_id, status).await,
        Call::GetApplications => client.get_applications().await,
        Call::GetDelta => client.get_delta().await,
        Call::GetVip { vip_address } => client.get_vip(vip_address).await,
        Call::GetById { app_name, instance_id } => client.get_by_id(app_name, instance_id).await,
    }
}
