//! 依赖图
//!
//! 注册表的只读快照，给工具使用。边是声明的构造依赖；
//! 工厂对静态分析不透明，没有出边。

use super::container::{Binding, Registry, Scope, TypeCatalog};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// 节点种类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    Process,
    Tick,
    Prototype,
    Factory,
}

impl From<Scope> for ServiceKind {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::Process => ServiceKind::Process,
            Scope::Tick => ServiceKind::Tick,
            Scope::Prototype => ServiceKind::Prototype,
        }
    }
}

/// 单个服务节点
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceNode {
    pub id: String,
    pub kind: ServiceKind,
    pub resolved: bool,
    /// 具体类型名；工厂为 "factory"
    pub concrete: String,
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DependencyGraph {
    nodes: BTreeMap<String, ServiceNode>,
}

impl DependencyGraph {
    /// 由注册表和类型目录生成快照；`resolved` 判断ID是否已在缓存中
    pub fn snapshot<F>(registry: &Registry, catalog: &TypeCatalog, resolved: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let mut nodes = BTreeMap::new();

        for (id, binding) in registry.bindings() {
            let node = match binding {
                Binding::Factory(_) => ServiceNode {
                    id: id.clone(),
                    kind: ServiceKind::Factory,
                    resolved: resolved(id),
                    concrete: "factory".to_string(),
                    dependencies: Vec::new(),
                },
                Binding::Concrete(concrete) => {
                    let dependencies = match catalog.get(concrete) {
                        Some(metadata) => metadata.dependencies().map(str::to_string).collect(),
                        // 指向另一个绑定的别名
                        None if concrete != id && registry.binding(concrete).is_some() => {
                            vec![concrete.clone()]
                        }
                        None => Vec::new(),
                    };
                    ServiceNode {
                        id: id.clone(),
                        kind: registry.scope(id).into(),
                        resolved: resolved(id),
                        concrete: concrete.clone(),
                        dependencies,
                    }
                }
            };
            nodes.insert(id.clone(), node);
        }

        for type_name in catalog.type_names() {
            if nodes.contains_key(type_name) {
                continue;
            }
            let Some(metadata) = catalog.get(type_name) else {
                continue;
            };
            nodes.insert(
                type_name.to_string(),
                ServiceNode {
                    id: type_name.to_string(),
                    kind: registry.scope(type_name).into(),
                    resolved: resolved(type_name),
                    concrete: type_name.to_string(),
                    dependencies: metadata.dependencies().map(str::to_string).collect(),
                },
            );
        }

        Self { nodes }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &ServiceNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &str) -> Option<&ServiceNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 从 `id` 出发能否走到一个环
    pub fn has_cycle(&self, id: &str) -> bool {
        self.find_cycle(id).is_some()
    }

    /// 从 `id` 出发找到的第一个环，首尾是同一个ID
    pub fn find_cycle(&self, id: &str) -> Option<Vec<String>> {
        let mut path = Vec::new();
        let mut finished = HashSet::new();
        self.visit(id, &mut path, &mut finished)
    }

    fn visit<'a>(
        &'a self,
        id: &'a str,
        path: &mut Vec<&'a str>,
        finished: &mut HashSet<&'a str>,
    ) -> Option<Vec<String>> {
        if let Some(start) = path.iter().position(|entry| *entry == id) {
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(id.to_string());
            return Some(cycle);
        }
        if finished.contains(id) {
            return None;
        }
        let node = self.nodes.get(id)?;

        path.push(&node.id);
        for dependency in &node.dependencies {
            if let Some(cycle) = self.visit(dependency, path, finished) {
                return Some(cycle);
            }
        }
        path.pop();
        finished.insert(&node.id);
        None
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::container::TypeMetadata;
    use crate::infrastructure::provider::factory;

    fn node_type(name: &str, deps: &[&str]) -> TypeMetadata {
        deps.iter()
            .fold(TypeMetadata::named(name), |builder, dep| builder.dependency(dep, dep))
            .build(|_| Ok(()))
    }

    #[test]
    fn test_snapshot_kinds_and_dependencies() {
        let mut registry = Registry::new();
        let mut catalog = TypeCatalog::new();
        catalog.register(node_type("Mailer", &["Transport"]));
        registry.bind("mailer", Binding::Concrete("Mailer".into()), None);
        registry.bind("clock", Binding::Factory(factory(|_| Ok(1u8))), None);
        registry.set_scope("mailer", Scope::Process);

        let graph = DependencyGraph::snapshot(&registry, &catalog, |id| id == "mailer");

        let mailer = graph.node("mailer").unwrap();
        assert_eq!(mailer.kind, ServiceKind::Process);
        assert!(mailer.resolved);
        assert_eq!(mailer.dependencies, vec!["Transport"]);

        let clock = graph.node("clock").unwrap();
        assert_eq!(clock.kind, ServiceKind::Factory);
        assert_eq!(clock.concrete, "factory");
        assert!(!clock.resolved);

        assert!(graph.node("Mailer").is_some());
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn test_cycle_detection_is_structural() {
        let mut catalog = TypeCatalog::new();
        catalog.register(node_type("A", &["B"]));
        catalog.register(node_type("B", &["C"]));
        catalog.register(node_type("C", &["A"]));
        catalog.register(node_type("D", &["E"]));
        catalog.register(node_type("E", &[]));
        let graph = DependencyGraph::snapshot(&Registry::new(), &catalog, |_| false);

        assert!(graph.has_cycle("A"));
        assert_eq!(
            graph.find_cycle("B").unwrap(),
            vec!["B", "C", "A", "B"]
        );
        assert!(!graph.has_cycle("D"));
        assert!(!graph.has_cycle("unknown"));
    }

    #[test]
    fn test_cycle_reachable_from_entry_point() {
        let mut catalog = TypeCatalog::new();
        catalog.register(node_type("Entry", &["Loop"]));
        catalog.register(node_type("Loop", &["Loop"]));
        let graph = DependencyGraph::snapshot(&Registry::new(), &catalog, |_| false);
        assert_eq!(graph.find_cycle("Entry").unwrap(), vec!["Loop", "Loop"]);
    }

    #[test]
    fn test_graph_serializes_for_tooling() {
        let mut registry = Registry::new();
        registry.bind("clock", Binding::Factory(factory(|_| Ok(1u8))), None);
        let graph = DependencyGraph::snapshot(&registry, &TypeCatalog::new(), |_| false);
        let json = graph.to_json().unwrap();
        assert!(json.contains("\"kind\": \"factory\""));
    }
}
