//! Virtual network subnets

use crate::client::ArmClient;
use async_trait::async_trait;
use clusterbase_cloud::{ProviderError, ProviderResult, Subnet, SubnetsClient};
use std::sync::Arc;

pub const NETWORK_API_VERSION: &str = "2020-08-01";

pub struct Subnets {
    client: Arc<ArmClient>,
}

impl Subnets {
    pub fn new(client: Arc<ArmClient>) -> Self {
        Self { client }
    }
}

fn validate_subnet_id(subnet_id: &str) -> ProviderResult<()> {
    let segments: Vec<&str> = subnet_id.trim_matches('/').split('/').collect();
    let valid = segments.len() == 10
        && segments[0].eq_ignore_ascii_case("subscriptions")
        && segments[2].eq_ignore_ascii_case("resourceGroups")
        && segments[6].eq_ignore_ascii_case("virtualNetworks")
        && segments[8].eq_ignore_ascii_case("subnets");

    if valid {
        Ok(())
    } else {
        Err(ProviderError::Unexpected(format!(
            "parsing failed for {}. Invalid resource Id format",
            subnet_id
        )))
    }
}

#[async_trait]
impl SubnetsClient for Subnets {
    async fn get(&self, subnet_id: &str) -> ProviderResult<Subnet> {
        validate_subnet_id(subnet_id)?;
        self.client.get_json(subnet_id, NETWORK_API_VERSION).await
    }

    async fn create_or_update(&self, subnet_id: &str, subnet: &Subnet) -> ProviderResult<()> {
        validate_subnet_id(subnet_id)?;
        tracing::info!(subnet = subnet_id, "Updating subnet");
        let _updated: Subnet = self
            .client
            .put_json(subnet_id, NETWORK_API_VERSION, subnet)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AzureConfig;
    use clusterbase_cloud::SubResource;
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SUBNET_ID: &str = "/subscriptions/sub-1/resourceGroups/vnet-rg/providers/Microsoft.Network/virtualNetworks/vnet/subnets/master";

    fn subnets(server: &MockServer) -> Subnets {
        Subnets::new(Arc::new(
            ArmClient::new(AzureConfig::with_token(server.uri(), "sub-1", "t"))
                .unwrap()
                .with_poll_interval(Duration::from_millis(10)),
        ))
    }

    #[test]
    fn test_validate_subnet_id() {
        assert!(validate_subnet_id(SUBNET_ID).is_ok());
        assert!(validate_subnet_id("/subscriptions/sub-1/resourceGroups/rg").is_err());
        assert!(validate_subnet_id("not-an-id").is_err());
    }

    #[tokio::test]
    async fn test_get_preserves_unknown_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SUBNET_ID))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": SUBNET_ID,
                "name": "master",
                "etag": "W/\"1\"",
                "properties": {
                    "addressPrefix": "10.0.0.0/24",
                    "routeTable": { "id": "/rt" }
                }
            })))
            .mount(&server)
            .await;

        let subnet = subnets(&server).get(SUBNET_ID).await.unwrap();
        assert_eq!(subnet.properties.address_prefix.as_deref(), Some("10.0.0.0/24"));
        assert!(subnet.extra.contains_key("etag"));
        assert!(subnet.properties.extra.contains_key("routeTable"));
    }

    #[tokio::test]
    async fn test_create_or_update_sends_nsg() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(SUBNET_ID))
            .and(body_partial_json(serde_json::json!({
                "properties": { "networkSecurityGroup": { "id": "/nsg" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": SUBNET_ID,
                "properties": { "networkSecurityGroup": { "id": "/nsg" } }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut subnet = Subnet::default();
        subnet.properties.network_security_group = Some(SubResource::new("/nsg"));
        subnets(&server)
            .create_or_update(SUBNET_ID, &subnet)
            .await
            .unwrap();
    }
}
