//! Resource descriptors for the base deployment

use clusterbase_cloud::{Resource, ResourceRef};
use serde_json::{Value, json};

pub const STORAGE_ACCOUNT_TYPE: &str = "Microsoft.Storage/storageAccounts";
pub const BLOB_CONTAINER_TYPE: &str = "Microsoft.Storage/storageAccounts/blobServices/containers";
pub const NSG_TYPE: &str = "Microsoft.Network/networkSecurityGroups";
pub const ROLE_ASSIGNMENT_TYPE: &str = "Microsoft.Authorization/roleAssignments";
pub const PRIVATE_LINK_SERVICE_TYPE: &str = "Microsoft.Network/privateLinkServices";
pub const LOAD_BALANCER_TYPE: &str = "Microsoft.Network/loadBalancers";
pub const FRONTEND_IP_CONFIGURATION_TYPE: &str =
    "Microsoft.Network/loadBalancers/frontendIPConfigurations";
pub const BACKEND_ADDRESS_POOL_TYPE: &str = "Microsoft.Network/loadBalancers/backendAddressPools";
pub const PROBE_TYPE: &str = "Microsoft.Network/loadBalancers/probes";
pub const PUBLIC_IP_TYPE: &str = "Microsoft.Network/publicIPAddresses";
pub const PRIVATE_ENDPOINT_TYPE: &str = "Microsoft.Network/privateEndpoints";
pub const DENY_ASSIGNMENT_TYPE: &str = "Microsoft.Authorization/denyAssignments";

const STORAGE_API_VERSION: &str = "2019-06-01";
const NETWORK_API_VERSION: &str = "2020-08-01";
const ROLE_ASSIGNMENT_API_VERSION: &str = "2018-09-01-preview";
const DENY_ASSIGNMENT_API_VERSION: &str = "2018-07-01-preview";

pub const CONTRIBUTOR_ROLE_ID: &str = "b24988ac-6180-42a0-ab88-20f7382dd24c";
/// Built-in principal matching every identity
const EVERYONE_PRINCIPAL_ID: &str = "00000000-0000-0000-0000-000000000000";

pub const INTERNAL_LB_FRONTEND: &str = "internal-lb-ip-v4";
pub const PUBLIC_LB_FRONTEND: &str = "public-lb-ip-v4";
pub const OUTBOUND_RULE: &str = "outbound-rule-v4";
const API_PORT: u16 = 6443;
const MACHINE_CONFIG_PORT: u16 = 22623;

pub fn nsg_name(infra_id: &str) -> String {
    format!("{}-nsg", infra_id)
}

pub fn internal_load_balancer_name(infra_id: &str) -> String {
    format!("{}-internal", infra_id)
}

pub fn api_public_ip_name(infra_id: &str) -> String {
    format!("{}-pip-v4", infra_id)
}

pub fn default_public_ip_name(infra_id: &str) -> String {
    format!("{}-default-v4", infra_id)
}

/// Full ID of a public IP in the cluster resource group
pub fn public_ip_id(resource_group_id: &str, name: &str) -> String {
    format!(
        "{}/providers/{}/{}",
        resource_group_id.trim_end_matches('/'),
        PUBLIC_IP_TYPE,
        name
    )
}

fn sub_resource(resource_type: &str, name: String) -> Value {
    json!({ "id": ResourceRef::new(resource_type, name).expression() })
}

fn standard_sku() -> Value {
    json!({ "name": "Standard" })
}

pub fn storage_account(
    name: &str,
    region: &str,
    allowed_subnets: &[String],
    encrypt: bool,
) -> Resource {
    let virtual_network_rules: Vec<Value> = allowed_subnets
        .iter()
        .map(|id| json!({ "id": id, "action": "Allow" }))
        .collect();

    let mut properties = json!({
        "supportsHttpsTrafficOnly": true,
        "minimumTlsVersion": "TLS1_2",
        "allowBlobPublicAccess": false,
        "networkAcls": {
            "bypass": "AzureServices",
            "defaultAction": "Deny",
            "virtualNetworkRules": virtual_network_rules,
        },
    });

    if encrypt {
        properties["encryption"] = json!({
            "keySource": "Microsoft.Storage",
            "requireInfrastructureEncryption": true,
            "services": {
                "blob": { "enabled": true },
                "file": { "enabled": true },
            },
        });
    }

    Resource::new(STORAGE_ACCOUNT_TYPE, name, STORAGE_API_VERSION)
        .with_location(region)
        .with_sku(json!({ "name": "Standard_LRS" }))
        .with_kind("StorageV2")
        .with_properties(properties)
}

pub fn storage_account_blob_container(account: &str, container: &str) -> Resource {
    Resource::new(
        BLOB_CONTAINER_TYPE,
        format!("{}/default/{}", account, container),
        STORAGE_API_VERSION,
    )
    .with_properties(json!({ "publicAccess": "None" }))
    .depends_on(ResourceRef::new(STORAGE_ACCOUNT_TYPE, account))
}

pub fn cluster_nsg(infra_id: &str, region: &str, api_server_public: bool) -> Resource {
    let mut rules = Vec::new();
    if api_server_public {
        rules.push(json!({
            "name": "apiserver_in",
            "properties": {
                "protocol": "Tcp",
                "sourcePortRange": "*",
                "destinationPortRange": API_PORT.to_string(),
                "sourceAddressPrefix": "*",
                "destinationAddressPrefix": "*",
                "access": "Allow",
                "priority": 101,
                "direction": "Inbound",
            },
        }));
    }

    Resource::new(NSG_TYPE, nsg_name(infra_id), NETWORK_API_VERSION)
        .with_location(region)
        .with_properties(json!({ "securityRules": rules }))
}

/// Contributor on the resource group for the cluster service principal
pub fn cluster_service_principal_rbac(sp_object_id: &str) -> Resource {
    Resource::new(
        ROLE_ASSIGNMENT_TYPE,
        "[guid(resourceGroup().id, 'SP / Contributor')]",
        ROLE_ASSIGNMENT_API_VERSION,
    )
    .with_properties(json!({
        "scope": "[resourceGroup().id]",
        "roleDefinitionId": format!(
            "[subscriptionResourceId('Microsoft.Authorization/roleDefinitions', '{}')]",
            CONTRIBUTOR_ROLE_ID
        ),
        "principalId": sp_object_id,
        "principalType": "ServicePrincipal",
    }))
}

pub fn private_link_service(
    infra_id: &str,
    region: &str,
    master_subnet_id: &str,
    rp_subscription_id: &str,
) -> Resource {
    let lb_name = internal_load_balancer_name(infra_id);

    Resource::new(
        PRIVATE_LINK_SERVICE_TYPE,
        format!("{}-pls", infra_id),
        NETWORK_API_VERSION,
    )
    .with_location(region)
    .with_properties(json!({
        "loadBalancerFrontendIpConfigurations": [
            sub_resource(
                FRONTEND_IP_CONFIGURATION_TYPE,
                format!("{}/{}", lb_name, INTERNAL_LB_FRONTEND),
            ),
        ],
        "ipConfigurations": [{
            "name": format!("{}-pls-nic", infra_id),
            "properties": {
                "subnet": { "id": master_subnet_id },
            },
        }],
        "visibility": { "subscriptions": [rp_subscription_id] },
        "autoApproval": { "subscriptions": [rp_subscription_id] },
    }))
    .depends_on(ResourceRef::new(LOAD_BALANCER_TYPE, lb_name))
}

fn https_probe(name: &str, port: u16, path: &str) -> Value {
    json!({
        "name": name,
        "properties": {
            "protocol": "Https",
            "port": port,
            "requestPath": path,
            "intervalInSeconds": 5,
            "numberOfProbes": 2,
        },
    })
}

struct RuleSpec<'a> {
    name: &'a str,
    frontend: &'a str,
    port: u16,
    probe: &'a str,
}

/// Load-balancing rule; the backend pool is named after the infra ID
fn lb_rule(lb_name: &str, backend_pool: &str, rule: RuleSpec<'_>) -> Value {
    let RuleSpec {
        name,
        frontend,
        port,
        probe,
    } = rule;

    json!({
        "name": name,
        "properties": {
            "frontendIPConfiguration": sub_resource(
                FRONTEND_IP_CONFIGURATION_TYPE,
                format!("{}/{}", lb_name, frontend),
            ),
            "backendAddressPool": sub_resource(
                BACKEND_ADDRESS_POOL_TYPE,
                format!("{}/{}", lb_name, backend_pool),
            ),
            "probe": sub_resource(PROBE_TYPE, format!("{}/{}", lb_name, probe)),
            "protocol": "Tcp",
            "loadDistribution": "Default",
            "frontendPort": port,
            "backendPort": port,
            "idleTimeoutInMinutes": 30,
            "disableOutboundSnat": true,
        },
    })
}

pub fn internal_load_balancer(infra_id: &str, region: &str, master_subnet_id: &str) -> Resource {
    let name = internal_load_balancer_name(infra_id);

    Resource::new(LOAD_BALANCER_TYPE, name.clone(), NETWORK_API_VERSION)
        .with_location(region)
        .with_sku(standard_sku())
        .with_properties(json!({
            "frontendIPConfigurations": [{
                "name": INTERNAL_LB_FRONTEND,
                "properties": {
                    "privateIPAllocationMethod": "Dynamic",
                    "subnet": { "id": master_subnet_id },
                },
            }],
            "backendAddressPools": [{ "name": infra_id }],
            "loadBalancingRules": [
                lb_rule(&name, infra_id, RuleSpec {
                    name: "api-internal-v4",
                    frontend: INTERNAL_LB_FRONTEND,
                    port: API_PORT,
                    probe: "api-internal-probe",
                }),
                lb_rule(&name, infra_id, RuleSpec {
                    name: "sint-v4",
                    frontend: INTERNAL_LB_FRONTEND,
                    port: MACHINE_CONFIG_PORT,
                    probe: "sint-probe",
                }),
            ],
            "probes": [
                https_probe("api-internal-probe", API_PORT, "/readyz"),
                https_probe("sint-probe", MACHINE_CONFIG_PORT, "/healthz"),
            ],
        }))
}

pub fn public_ip_address(region: &str, name: &str) -> Resource {
    Resource::new(PUBLIC_IP_TYPE, name, NETWORK_API_VERSION)
        .with_location(region)
        .with_sku(standard_sku())
        .with_properties(json!({ "publicIPAllocationMethod": "Static" }))
}

/// Public load balancer over the given outbound IPs.
///
/// The API frontend (`<infraID>-pip-v4`) exists when the API server is
/// public; `outbound_ip_names` are the public IPs carrying egress. Each
/// referenced IP becomes a dependency and must be declared in the same
/// template.
pub fn public_load_balancer(
    infra_id: &str,
    region: &str,
    api_server_public: bool,
    outbound_ip_names: &[String],
) -> Resource {
    let api_ip = api_public_ip_name(infra_id);
    let frontend_name = |ip: &str| {
        if ip == api_ip {
            PUBLIC_LB_FRONTEND.to_string()
        } else {
            ip.to_string()
        }
    };

    let mut ips: Vec<&str> = Vec::new();
    if api_server_public {
        ips.push(&api_ip);
    }
    for ip in outbound_ip_names {
        if !ips.contains(&ip.as_str()) {
            ips.push(ip);
        }
    }

    let frontends: Vec<Value> = ips
        .iter()
        .map(|ip| {
            json!({
                "name": frontend_name(ip),
                "properties": {
                    "publicIPAddress": sub_resource(PUBLIC_IP_TYPE, ip.to_string()),
                },
            })
        })
        .collect();

    let mut outbound_frontends: Vec<Value> = outbound_ip_names
        .iter()
        .map(|ip| {
            sub_resource(
                FRONTEND_IP_CONFIGURATION_TYPE,
                format!("{}/{}", infra_id, frontend_name(ip)),
            )
        })
        .collect();
    if outbound_frontends.is_empty() && api_server_public {
        outbound_frontends.push(sub_resource(
            FRONTEND_IP_CONFIGURATION_TYPE,
            format!("{}/{}", infra_id, PUBLIC_LB_FRONTEND),
        ));
    }

    let mut rules = Vec::new();
    let mut probes = Vec::new();
    if api_server_public {
        rules.push(lb_rule(
            infra_id,
            infra_id,
            RuleSpec {
                name: "api-internal-v4",
                frontend: PUBLIC_LB_FRONTEND,
                port: API_PORT,
                probe: "api-internal-probe",
            },
        ));
        probes.push(https_probe("api-internal-probe", API_PORT, "/readyz"));
    }

    let mut outbound_rules = Vec::new();
    if !outbound_frontends.is_empty() {
        outbound_rules.push(json!({
            "name": OUTBOUND_RULE,
            "properties": {
                "frontendIPConfigurations": outbound_frontends,
                "backendAddressPool": sub_resource(
                    BACKEND_ADDRESS_POOL_TYPE,
                    format!("{}/{}", infra_id, infra_id),
                ),
                "protocol": "All",
                "idleTimeoutInMinutes": 30,
            },
        }));
    }

    let mut resource = Resource::new(LOAD_BALANCER_TYPE, infra_id, NETWORK_API_VERSION)
        .with_location(region)
        .with_sku(standard_sku())
        .with_properties(json!({
            "frontendIPConfigurations": frontends,
            "backendAddressPools": [{ "name": infra_id }],
            "loadBalancingRules": rules,
            "probes": probes,
            "outboundRules": outbound_rules,
        }));

    for ip in ips {
        resource = resource.depends_on(ResourceRef::new(PUBLIC_IP_TYPE, ip));
    }
    resource
}

pub fn private_endpoint(
    infra_id: &str,
    region: &str,
    master_subnet_id: &str,
    gateway_private_link_service_id: &str,
) -> Resource {
    Resource::new(
        PRIVATE_ENDPOINT_TYPE,
        format!("{}-pe", infra_id),
        NETWORK_API_VERSION,
    )
    .with_location(region)
    .with_properties(json!({
        "subnet": { "id": master_subnet_id },
        "manualPrivateLinkServiceConnections": [{
            "name": "gateway-plsconnection",
            "properties": {
                "privateLinkServiceId": gateway_private_link_service_id,
            },
        }],
    }))
}

/// Blocks writes and deletes in the resource group for everyone but the
/// cluster service principal
pub fn deny_assignment(sp_object_id: &str) -> Resource {
    let name = "[guid(resourceGroup().id, 'cluster resource group deny assignment')]";

    Resource::new(DENY_ASSIGNMENT_TYPE, name, DENY_ASSIGNMENT_API_VERSION).with_properties(json!({
        "denyAssignmentName": name,
        "permissions": [{
            "actions": ["*/action", "*/delete", "*/write"],
            "notActions": [
                "Microsoft.Compute/disks/beginGetAccess/action",
                "Microsoft.Compute/disks/endGetAccess/action",
                "Microsoft.Compute/disks/write",
                "Microsoft.Compute/snapshots/beginGetAccess/action",
                "Microsoft.Compute/snapshots/delete",
                "Microsoft.Compute/snapshots/endGetAccess/action",
                "Microsoft.Compute/snapshots/write",
                "Microsoft.Network/networkInterfaces/effectiveRouteTable/action",
                "Microsoft.Network/networkSecurityGroups/join/action",
            ],
        }],
        "scope": "[resourceGroup().id]",
        "principals": [{
            "id": EVERYONE_PRINCIPAL_ID,
            "type": "SystemDefined",
        }],
        "excludePrincipals": [{
            "id": sp_object_id,
            "type": "ServicePrincipal",
        }],
        "isSystemProtected": true,
    }))
}
