//! CompositeResolver — prefers local-registry endpoints, falls through to a
//! remote vip resolver.

use std::sync::Arc;

use async_trait::async_trait;

use crate::endpoint::EndpointList;

use super::Resolver;

pub struct CompositeResolver {
    local: Arc<dyn Resolver>,
    remote: Arc<dyn Resolver>,
    region: String,
}

impl CompositeResolver {
    pub fn new(local: Arc<dyn Resolver>, remote: Arc<dyn Resolver>, region: impl Into<String>) -> Self {
        CompositeResolver {
            local,
            remote,
            region: region.into(),
        }
    }
}

#[async_trait]
impl Resolver for CompositeResolver {
    fn region(&self) -> String {
        self.region.clone()
    }

    async fn endpoints(&self) -> EndpointList {
        let local = self.local.endpoints().await;
        if !local.is_empty() {
            return local;
        }
        self.remote.endpoints().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::Endpoint;

    struct Fixed(Vec<Endpoint>);

    #[async_trait]
    impl Resolver for Fixed {
        fn region(&self) -> String {
            "us-east-1".to_string()
        }
        async fn endpoints(&self) -> EndpointList {
            EndpointList::new(self.0.clone())
        }
    }

    #[tokio::test]
    async fn prefers_local_when_non_empty() {
        let local = Arc::new(Fixed(vec![Endpoint::new("local", 80, false, "us-east-1")]));
        let remote = Arc::new(Fixed(vec![Endpoint::new("remote", 80, false, "us-east-1")]));
        let resolver = CompositeResolver::new(local, remote, "us-east-1");
        let result = resolver.endpoints().await;
        assert_eq!(result.get(0).unwrap().host, "local");
    }

    #[tokio::test]
    async fn falls_through_to_remote_when_local_is_empty() {
        let local = Arc::new(Fixed(vec![]));
        let remote = Arc::new(Fixed(vec![Endpoint::new("remote", 80, false, "us-east-1")]));
        let resolver = CompositeResolver::new(local, remote, "us-east-1");
        let result = resolver.endpoints().await;
        assert_eq!(result.get(0).unwrap().host, "remote");
    }

    #[tokio::test]
    async fn region_is_the_configured_local_region() {
        let local = Arc::new(Fixed(vec![]));
        let remote = Arc::new(Fixed(vec![]));
        let resolver = CompositeResolver::new(local, remote, "eu-west-1");
        assert_eq!(resolver.region(), "eu-west-1");
    }
}
