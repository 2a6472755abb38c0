//! Snapshot endpoint synthesis
//!
//! Produces one load assignment per ready (upstream, routing target) pair.
//! Upstreams are visited in declaration order and resolver nodes in target
//! order, so identical snapshots always yield identical resource lists.

use meshlet_core::{
    CompiledDiscoveryChain, ConfigSnapshot, DiscoveryTarget, ServiceKind, Upstream,
    UpstreamDestType,
};
use tracing::debug;

use crate::error::{XdsError, XdsResult};
use crate::failover::plan_failover_tiers;
use crate::load_assignment::{make_load_assignment, make_load_assignment_for_discovery_chain};
use crate::resource::ClusterLoadAssignment;

/// How an upstream's traffic is routed
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UpstreamChain<'a> {
    /// No compiled chain; always the case for prepared queries
    Absent,
    /// A chain equivalent to plain routing to the service
    Default,
    /// A chain with splitting, redirection or failover
    Compiled(&'a CompiledDiscoveryChain),
}

impl<'a> UpstreamChain<'a> {
    /// Classify the chain compiled for `upstream`
    pub fn for_upstream(snapshot: &'a ConfigSnapshot, upstream: &Upstream, id: &str) -> Self {
        if upstream.destination_type == UpstreamDestType::PreparedQuery {
            return UpstreamChain::Absent;
        }

        match snapshot.discovery_chain.get(id) {
            None => UpstreamChain::Absent,
            Some(chain) if chain.is_default() => UpstreamChain::Default,
            Some(chain) => UpstreamChain::Compiled(chain),
        }
    }
}

/// Synthesize the endpoint resources for a snapshot.
///
/// `token` is forwarded untouched to collaborators enforcing access control.
/// Fails only on a missing snapshot or an unsupported service kind; targets
/// whose endpoints have not arrived yet are left out of the result.
pub fn endpoints_from_snapshot(
    snapshot: Option<&ConfigSnapshot>,
    token: &str,
) -> XdsResult<Vec<ClusterLoadAssignment>> {
    let snapshot =
        snapshot.ok_or_else(|| XdsError::InvalidInput("nil config given".to_string()))?;

    match snapshot.kind {
        ServiceKind::ConnectProxy => Ok(endpoints_from_snapshot_connect_proxy(snapshot, token)),
        kind @ (ServiceKind::Typical | ServiceKind::MeshGateway) => Err(XdsError::InvalidInput(
            format!("Invalid service kind: {}", kind),
        )),
    }
}

fn endpoints_from_snapshot_connect_proxy(
    snapshot: &ConfigSnapshot,
    _token: &str,
) -> Vec<ClusterLoadAssignment> {
    let mut resources = Vec::with_capacity(snapshot.proxy.upstreams.len());

    for upstream in &snapshot.proxy.upstreams {
        let id = upstream.identifier();

        match UpstreamChain::for_upstream(snapshot, upstream, &id) {
            UpstreamChain::Absent | UpstreamChain::Default => {
                match snapshot.upstream_endpoints.get(&id) {
                    Some(endpoints) => resources.push(make_load_assignment(&id, endpoints)),
                    None => debug!(upstream = %id, "Upstream endpoints not ready, skipping"),
                }
            }
            UpstreamChain::Compiled(chain) => {
                let Some(chain_endpoints) = snapshot.watched_upstream_endpoints.get(&id) else {
                    debug!(upstream = %id, "Chain endpoints not ready, skipping upstream");
                    continue;
                };

                for (target, node) in &chain.group_resolver_nodes {
                    let Some(plan) =
                        plan_failover_tiers(target, &node.group_resolver, chain_endpoints)
                    else {
                        debug!(
                            upstream = %id,
                            routing_target = %target,
                            "Target endpoints not ready, skipping"
                        );
                        continue;
                    };

                    let name = cluster_name(&id, target);
                    resources.push(make_load_assignment_for_discovery_chain(
                        &name,
                        chain,
                        plan.overprovisioning_factor,
                        &plan.tiers,
                    ));
                }
            }
        }
    }

    debug!(
        proxy = %snapshot.proxy_id,
        upstreams = snapshot.proxy.upstreams.len(),
        resources = resources.len(),
        "Synthesized endpoint resources"
    );

    resources
}

/// Name of the cluster serving `target` on behalf of upstream `upstream_id`.
///
/// The name is `service,subset,namespace,datacenter~upstream_id`. Every
/// target field is kept, empty or not, and `%`, `,` and `~` inside a field
/// are percent-encoded. The target part therefore has exactly three commas
/// and no `~`, so distinct (upstream, target) pairs never share a name.
pub fn cluster_name(upstream_id: &str, target: &DiscoveryTarget) -> String {
    let mut name = String::with_capacity(upstream_id.len() + 32);
    for (i, field) in [
        &target.service,
        &target.service_subset,
        &target.namespace,
        &target.datacenter,
    ]
    .into_iter()
    .enumerate()
    {
        if i > 0 {
            name.push(',');
        }
        push_escaped(&mut name, field);
    }
    name.push('~');
    name.push_str(upstream_id);
    name
}

fn push_escaped(out: &mut String, field: &str) {
    for c in field.chars() {
        match c {
            '%' => out.push_str("%25"),
            ',' => out.push_str("%2C"),
            '~' => out.push_str("%7E"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failover::DEFAULT_OVERPROVISIONING_FACTOR;
    use crate::resource::EndpointHealth;
    use meshlet_core::{
        CheckServiceNode, CheckServiceNodes, DiscoveryFailover, DiscoveryGraphNode,
        GroupResolver, GroupResolverNode, HealthCheck, HealthStatus, Node, NodeService, Weights,
    };
    use std::collections::{BTreeMap, HashSet};

    fn target(service: &str) -> DiscoveryTarget {
        DiscoveryTarget::new(service, "", "default", "dc1")
    }

    fn instance(addr: &str, weights: Option<Weights>, checks: &[HealthStatus]) -> CheckServiceNode {
        CheckServiceNode {
            node: Node {
                node: format!("node-{}", addr),
                address: addr.to_string(),
                datacenter: "dc1".to_string(),
            },
            service: NodeService {
                id: format!("svc-{}", addr),
                service: "svc".to_string(),
                address: String::new(),
                port: 8080,
                weights,
            },
            checks: checks
                .iter()
                .map(|s| HealthCheck::new("check", *s))
                .collect(),
        }
    }

    fn resolver_node(service: &str, failover: &[&str], factor: i32) -> GroupResolverNode {
        GroupResolverNode {
            name: service.to_string(),
            group_resolver: GroupResolver {
                default: false,
                target: target(service),
                failover: (!failover.is_empty()).then(|| DiscoveryFailover {
                    targets: failover.iter().map(|t| target(t)).collect(),
                    overprovisioning_factor: factor,
                }),
            },
        }
    }

    fn compiled_chain(service: &str, nodes: Vec<GroupResolverNode>) -> CompiledDiscoveryChain {
        CompiledDiscoveryChain {
            service_name: service.to_string(),
            namespace: "default".to_string(),
            datacenter: "dc1".to_string(),
            protocol: "tcp".to_string(),
            start_node: Some(DiscoveryGraphNode::Splitter {
                name: service.to_string(),
            }),
            group_resolver_nodes: nodes
                .into_iter()
                .map(|n| (n.group_resolver.target.clone(), n))
                .collect(),
        }
    }

    fn default_chain(service: &str) -> CompiledDiscoveryChain {
        let node = GroupResolverNode {
            name: service.to_string(),
            group_resolver: GroupResolver {
                default: true,
                target: target(service),
                failover: None,
            },
        };
        CompiledDiscoveryChain {
            start_node: Some(DiscoveryGraphNode::GroupResolver(node.clone())),
            ..compiled_chain(service, vec![node])
        }
    }

    fn snapshot(upstreams: Vec<Upstream>) -> ConfigSnapshot {
        let mut snap = ConfigSnapshot::new(ServiceKind::ConnectProxy, "dc1");
        snap.proxy_id = "web-sidecar-proxy".to_string();
        snap.proxy.upstreams = upstreams;
        snap
    }

    fn watched(
        targets: &[(&str, CheckServiceNodes)],
    ) -> BTreeMap<DiscoveryTarget, CheckServiceNodes> {
        targets
            .iter()
            .map(|(t, nodes)| (target(t), nodes.clone()))
            .collect()
    }

    #[test]
    fn test_nil_snapshot_invalid() {
        let result = endpoints_from_snapshot(None, "");
        assert!(matches!(result, Err(XdsError::InvalidInput(_))));
    }

    #[test]
    fn test_unsupported_kind_invalid() {
        for kind in [ServiceKind::Typical, ServiceKind::MeshGateway] {
            let mut snap = snapshot(vec![Upstream::service("web")]);
            snap.kind = kind;
            snap.upstream_endpoints
                .insert("web".to_string(), vec![instance("10.0.0.1", None, &[])]);

            let result = endpoints_from_snapshot(Some(&snap), "token");
            assert_eq!(
                result,
                Err(XdsError::InvalidInput(format!("Invalid service kind: {}", kind)))
            );
        }
    }

    #[test]
    fn test_flat_upstream() {
        let mut snap = snapshot(vec![Upstream::service("web")]);
        snap.upstream_endpoints.insert(
            "web".to_string(),
            vec![
                instance(
                    "10.0.0.1",
                    Some(Weights {
                        passing: 10,
                        warning: 1,
                    }),
                    &[HealthStatus::Passing],
                ),
                instance(
                    "10.0.0.2",
                    Some(Weights {
                        passing: 10,
                        warning: 3,
                    }),
                    &[HealthStatus::Warning],
                ),
            ],
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), 1);

        let cla = &resources[0];
        assert_eq!(cla.cluster_name, "web");
        assert_eq!(cla.endpoints.len(), 1);
        assert!(cla.policy.is_none());

        let eps = &cla.endpoints[0].lb_endpoints;
        let weights: Vec<u32> = eps.iter().map(|e| e.load_balancing_weight).collect();
        let statuses: Vec<EndpointHealth> = eps.iter().map(|e| e.health_status).collect();
        assert_eq!(weights, vec![10, 3]);
        assert_eq!(statuses, vec![EndpointHealth::Healthy, EndpointHealth::Healthy]);
    }

    #[test]
    fn test_failover_with_missing_target() {
        let mut snap = snapshot(vec![Upstream::service("api")]);
        snap.discovery_chain.insert(
            "api".to_string(),
            compiled_chain("api", vec![resolver_node("t1", &["t2", "t3"], 0)]),
        );
        snap.watched_upstream_endpoints.insert(
            "api".to_string(),
            watched(&[
                ("t1", vec![instance("10.0.0.1", None, &[])]),
                ("t3", vec![instance("10.0.0.3", None, &[])]),
            ]),
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), 1);

        let cla = &resources[0];
        assert_eq!(cla.endpoints.len(), 2);
        assert_eq!(cla.endpoints[0].priority, 0);
        assert_eq!(cla.endpoints[0].lb_endpoints[0].address.address, "10.0.0.1");
        assert_eq!(cla.endpoints[1].priority, 1);
        assert_eq!(cla.endpoints[1].lb_endpoints[0].address.address, "10.0.0.3");
        assert_eq!(
            cla.policy.unwrap().overprovisioning_factor,
            DEFAULT_OVERPROVISIONING_FACTOR
        );
    }

    #[test]
    fn test_zero_passing_weight_unhealthy() {
        let mut snap = snapshot(vec![Upstream::service("web")]);
        snap.upstream_endpoints.insert(
            "web".to_string(),
            vec![instance(
                "10.0.0.1",
                Some(Weights {
                    passing: 0,
                    warning: 1,
                }),
                &[],
            )],
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        let ep = &resources[0].endpoints[0].lb_endpoints[0];
        assert_eq!(ep.load_balancing_weight, 1);
        assert_eq!(ep.health_status, EndpointHealth::Unhealthy);
    }

    #[test]
    fn test_missing_primary_target_skipped() {
        let mut snap = snapshot(vec![Upstream::service("api")]);
        snap.discovery_chain.insert(
            "api".to_string(),
            compiled_chain(
                "api",
                vec![resolver_node("t1", &[], 0), resolver_node("t2", &[], 0)],
            ),
        );
        snap.watched_upstream_endpoints.insert(
            "api".to_string(),
            watched(&[("t2", vec![instance("10.0.0.2", None, &[])])]),
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].cluster_name, "t2,,default,dc1~api");
        assert!(resources[0].policy.is_none());
    }

    #[test]
    fn test_unwatched_chain_upstream_skipped() {
        let mut snap = snapshot(vec![Upstream::service("api"), Upstream::service("web")]);
        snap.discovery_chain.insert(
            "api".to_string(),
            compiled_chain("api", vec![resolver_node("api", &[], 0)]),
        );
        snap.upstream_endpoints
            .insert("web".to_string(), vec![instance("10.0.0.1", None, &[])]);

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].cluster_name, "web");
    }

    #[test]
    fn test_flat_upstream_without_endpoints_skipped() {
        let snap = snapshot(vec![Upstream::service("web")]);
        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert!(resources.is_empty());
    }

    #[test]
    fn test_default_chain_uses_flat_path() {
        let mut snap = snapshot(vec![Upstream::service("web")]);
        snap.discovery_chain
            .insert("web".to_string(), default_chain("web"));
        snap.upstream_endpoints
            .insert("web".to_string(), vec![instance("10.0.0.1", None, &[])]);
        snap.watched_upstream_endpoints.insert(
            "web".to_string(),
            watched(&[("web", vec![instance("10.9.9.9", None, &[])])]),
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].cluster_name, "web");
        assert_eq!(
            resources[0].endpoints[0].lb_endpoints[0].address.address,
            "10.0.0.1"
        );
    }

    #[test]
    fn test_prepared_query_ignores_chain() {
        let upstream = Upstream::prepared_query("geo");
        let id = upstream.identifier();
        let mut snap = snapshot(vec![upstream.clone()]);
        snap.discovery_chain
            .insert(id.clone(), compiled_chain("geo", vec![resolver_node("geo", &[], 0)]));
        snap.upstream_endpoints
            .insert(id.clone(), vec![instance("10.0.0.1", None, &[])]);

        assert_eq!(
            UpstreamChain::for_upstream(&snap, &upstream, &id),
            UpstreamChain::Absent
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].cluster_name, "prepared_query:geo");
    }

    #[test]
    fn test_output_order_and_unique_names() {
        let mut snap = snapshot(vec![Upstream::service("web"), Upstream::service("api")]);
        snap.upstream_endpoints
            .insert("web".to_string(), vec![instance("10.0.0.1", None, &[])]);
        snap.discovery_chain.insert(
            "api".to_string(),
            compiled_chain(
                "api",
                vec![
                    resolver_node("zeta", &[], 0),
                    resolver_node("api", &["zeta"], 3),
                    resolver_node("beta", &[], 0),
                ],
            ),
        );
        snap.watched_upstream_endpoints.insert(
            "api".to_string(),
            watched(&[
                ("api", vec![instance("10.0.1.1", None, &[])]),
                ("beta", vec![instance("10.0.2.1", None, &[])]),
                ("zeta", vec![instance("10.0.3.1", None, &[])]),
            ]),
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.cluster_name.as_str()).collect();
        assert_eq!(names, vec![
                "web",
                "api,,default,dc1~api",
                "beta,,default,dc1~api",
                "zeta,,default,dc1~api",
            ]);
        assert_eq!(resources[1].endpoints.len(), 2);
        assert_eq!(resources[1].policy.unwrap().overprovisioning_factor, 3);

        let unique: HashSet<&str> = names.iter().copied().collect();
        assert_eq!(unique.len(), names.len());
    }

    #[test]
    fn test_idempotent() {
        let mut snap = snapshot(vec![Upstream::service("api"), Upstream::service("web")]);
        snap.upstream_endpoints.insert(
            "web".to_string(),
            vec![
                instance("10.0.0.1", None, &[]),
                instance("10.0.0.2", None, &[HealthStatus::Critical]),
            ],
        );
        snap.discovery_chain.insert(
            "api".to_string(),
            compiled_chain(
                "api",
                vec![
                    resolver_node("a", &["b", "c"], 0),
                    resolver_node("b", &["a"], 7),
                    resolver_node("c", &[], 0),
                ],
            ),
        );
        snap.watched_upstream_endpoints.insert(
            "api".to_string(),
            watched(&[
                ("a", vec![instance("10.1.0.1", None, &[])]),
                ("b", vec![instance("10.2.0.1", None, &[])]),
                ("c", vec![instance("10.3.0.1", None, &[])]),
            ]),
        );

        let first = serde_json::to_vec(&endpoints_from_snapshot(Some(&snap), "").unwrap()).unwrap();
        let second =
            serde_json::to_vec(&endpoints_from_snapshot(Some(&snap.clone()), "").unwrap())
                .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_cluster_name() {
        let local = DiscoveryTarget::new("api", "", "default", "dc1");
        assert_eq!(cluster_name("api", &local), "api,,default,dc1~api");

        let subset = DiscoveryTarget::new("api", "v2", "default", "dc1");
        assert_eq!(cluster_name("api", &subset), "api,v2,default,dc1~api");

        let remote = DiscoveryTarget::new("api", "", "payments", "dc2");
        assert_eq!(
            cluster_name("api?dc=dc2", &remote),
            "api,,payments,dc2~api?dc=dc2"
        );

        let odd = DiscoveryTarget::new("a~b", "", "x,y", "50%");
        assert_eq!(cluster_name("api", &odd), "a%7Eb,,x%2Cy,50%25~api");
    }

    #[test]
    fn test_lookalike_targets_get_distinct_names() {
        let targets = [
            DiscoveryTarget::new("api", "", "default", "dc1"),
            DiscoveryTarget::new("api", "", "", "dc1"),
            DiscoveryTarget::new("api", "", "default", ""),
            DiscoveryTarget::new("b", "a", "default", "dc1"),
            DiscoveryTarget::new("a.b", "", "default", "dc1"),
            DiscoveryTarget::new("a,b", "", "default", "dc1"),
            DiscoveryTarget::new("a", "b", "default", "dc1"),
        ];

        let mut snap = snapshot(vec![Upstream::service("api")]);
        let nodes: Vec<GroupResolverNode> = targets
            .iter()
            .map(|t| GroupResolverNode {
                name: t.service.clone(),
                group_resolver: GroupResolver {
                    default: false,
                    target: t.clone(),
                    failover: None,
                },
            })
            .collect();
        snap.discovery_chain
            .insert("api".to_string(), compiled_chain("api", nodes));
        snap.watched_upstream_endpoints.insert(
            "api".to_string(),
            targets
                .iter()
                .map(|t| (t.clone(), vec![instance("10.0.0.1", None, &[])]))
                .collect(),
        );

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        assert_eq!(resources.len(), targets.len());

        let names: HashSet<&str> = resources.iter().map(|r| r.cluster_name.as_str()).collect();
        assert_eq!(names.len(), resources.len(), "duplicate cluster names");
    }

    #[test]
    fn test_same_target_from_two_upstreams() {
        let mut snap = snapshot(vec![Upstream::service("api"), Upstream::service("edge")]);
        for upstream in ["api", "edge"] {
            snap.discovery_chain.insert(
                upstream.to_string(),
                compiled_chain(upstream, vec![resolver_node("api", &[], 0)]),
            );
            snap.watched_upstream_endpoints.insert(
                upstream.to_string(),
                watched(&[("api", vec![instance("10.0.0.1", None, &[])])]),
            );
        }

        let resources = endpoints_from_snapshot(Some(&snap), "").unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.cluster_name.as_str()).collect();
        assert_eq!(names, vec!["api,,default,dc1~api", "api,,default,dc1~edge"]);
    }
}
