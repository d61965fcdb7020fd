mod common;

use clusterbase::{BASE_DEPLOYMENT_NAME, Step, network_security_group_id};
use clusterbase_cloud::{CloudError, ClusterStore, ResourceGroup, ResourceGroupsClient};
use common::*;

#[tokio::test]
async fn test_install_persists_state_across_managers() {
    let project = TestProject::new();
    let doc = project.import(cluster()).await;
    assert!(project.state_file_exists(&doc.key));

    let mut manager = project.manager("installer").await.unwrap();
    manager.install().await.unwrap();
    manager.release().await.unwrap();

    let stored = project.store("reader").get(&doc.key).await.unwrap();
    let properties = &stored.cluster.properties;
    assert!(properties.infra_id.starts_with("prod-cluster-"));
    assert!(properties.infra_id.len() <= clusterbase::INFRA_ID_MAX_LEN);
    let effective = &properties
        .network_profile
        .load_balancer_profile
        .as_ref()
        .unwrap()
        .effective_outbound_ips;
    assert_eq!(effective.len(), 2);
    assert!(effective.iter().all(|ip| ip.id.starts_with(RESOURCE_GROUP_ID)));
    assert!(stored.lease_owner.is_none());

    let submitted = project.deployments.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].0, RESOURCE_GROUP);
    assert_eq!(submitted[0].1, BASE_DEPLOYMENT_NAME);

    let nsg_id = network_security_group_id(&stored.cluster);
    for id in [MASTER_SUBNET_ID, WORKER_SUBNET_ID] {
        let subnet = project.subnets.subnet(id).unwrap();
        assert_eq!(subnet.properties.network_security_group.unwrap().id, nsg_id);
    }
}

#[tokio::test]
async fn test_install_is_rerunnable() {
    let project = TestProject::new();
    let doc = project.import(cluster()).await;

    let mut first = project.manager("installer").await.unwrap();
    first.install().await.unwrap();
    first.release().await.unwrap();
    let after_first = project.store("reader").get(&doc.key).await.unwrap();

    // the group now exists and belongs to the cluster, so it is adopted
    let mut second = project.manager("installer").await.unwrap();
    second.install().await.unwrap();
    second.release().await.unwrap();
    let after_second = project.store("reader").get(&doc.key).await.unwrap();

    assert_eq!(
        after_first.cluster.properties.infra_id,
        after_second.cluster.properties.infra_id
    );
    assert_eq!(project.resource_groups.puts().len(), 2);
    assert_eq!(project.deployments.submitted().len(), 2);

    // NSGs were already attached: only the two master policy writes plus
    // the first run's two attachments
    assert_eq!(project.subnets.puts().len(), 4);
}

#[tokio::test]
async fn test_foreign_resource_group_blocks_install() {
    let project = TestProject::new();
    project.import(cluster()).await;
    let foreign = ResourceGroup {
        location: Some("westeurope".to_string()),
        managed_by: Some("/subscriptions/other/clusters/someone-else".to_string()),
        ..Default::default()
    };
    project
        .resource_groups
        .create_or_update(RESOURCE_GROUP, &foreign)
        .await
        .unwrap();

    let mut manager = project.manager("installer").await.unwrap();
    let err = manager.install().await.unwrap_err();
    manager.release().await.unwrap();

    assert_eq!(
        err.code(),
        Some(clusterbase_cloud::ErrorCode::ClusterResourceGroupAlreadyExists)
    );
    assert_eq!(project.resource_groups.puts().len(), 1);
    assert!(project.deployments.submitted().is_empty());
}

#[tokio::test]
async fn test_lease_excludes_second_installer() {
    let project = TestProject::new();
    project.import(cluster()).await;

    let holder = project.manager("installer-a").await.unwrap();
    let err = project.manager("installer-b").await.err().unwrap();
    assert!(matches!(err, CloudError::LeaseError(_)));

    holder.release().await.unwrap();
    let mut next = project.manager("installer-b").await.unwrap();
    next.run_step(Step::InfraId).await.unwrap();
    next.release().await.unwrap();
}

#[tokio::test]
async fn test_template_orders_references_before_use() {
    let project = TestProject::new();
    project.import(cluster()).await;

    let mut manager = project.manager("installer").await.unwrap();
    manager.run_step(Step::InfraId).await.unwrap();
    let template = manager.build_base_resources().await.unwrap();
    manager.release().await.unwrap();

    let json = serde_json::to_value(&template).unwrap();
    assert_eq!(json["contentVersion"], "1.0.0.0");

    let resources = json["resources"].as_array().unwrap();
    let expression = |r: &serde_json::Value| {
        let name = r["name"].as_str().unwrap();
        let segments: Vec<String> = name.split('/').map(|s| format!("'{}'", s)).collect();
        format!(
            "[resourceId('{}', {})]",
            r["type"].as_str().unwrap(),
            segments.join(", ")
        )
    };
    for (i, resource) in resources.iter().enumerate() {
        let Some(depends_on) = resource["dependsOn"].as_array() else {
            continue;
        };
        for dependency in depends_on {
            let declared = resources[..i]
                .iter()
                .any(|earlier| expression(earlier) == dependency.as_str().unwrap());
            assert!(declared, "{} referenced before declaration", dependency);
        }
    }
}
