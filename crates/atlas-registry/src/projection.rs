//! Serializable snapshots of live components.
//!
//! Projections copy everything they need out of the live tree, so the
//! returned summaries share no state with the registry. Titles default to
//! the component name and descriptions to the empty string, but only when
//! they were never declared: an explicitly empty title stays empty.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use atlas_types::error::{AtlasError, Result};

use crate::module::{Component, Module};

/// Flat summary of any component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSummary {
    pub name: String,
    pub title: String,
    pub description: String,
}

/// Summary of a module and, recursively, everything below it.
///
/// Converters are not part of the tree summary; they are only available
/// through the per-module listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    pub name: String,
    pub title: String,
    pub description: String,
    pub modules: Vec<ModuleSummary>,
    pub types: Vec<ComponentSummary>,
    pub constraints: Vec<ComponentSummary>,
    pub commands: Vec<ComponentSummary>,
}

/// Project a component into its flat summary.
pub fn project(component: &Component) -> ComponentSummary {
    ComponentSummary {
        name: component.name().to_string(),
        title: component.title().unwrap_or(component.name()).to_string(),
        description: component.description().unwrap_or_default().to_string(),
    }
}

/// One module being projected: its header and flat collections are already
/// copied, child modules are consumed from `pending`.
struct Frame {
    module: Arc<Module>,
    pending: std::vec::IntoIter<Arc<Module>>,
    summary: ModuleSummary,
}

impl Frame {
    fn enter(module: Arc<Module>) -> Self {
        let header = project(module.component());
        let summary = ModuleSummary {
            name: header.name,
            title: header.title,
            description: header.description,
            modules: Vec::new(),
            types: module.types().iter().map(project).collect(),
            constraints: module.constraints().iter().map(project).collect(),
            commands: module.commands().iter().map(project).collect(),
        };
        let pending = module.modules().into_iter();
        Self {
            module,
            pending,
            summary,
        }
    }
}

/// Project a module and its whole subtree, preserving child order.
///
/// Traversal is iterative, so depth is bounded by memory rather than the
/// call stack. A module that is its own ancestor fails with
/// [`AtlasError::Cycle`]. The same module reachable through two different
/// parents is not a cycle and is projected at both places.
pub fn project_module(module: &Arc<Module>) -> Result<ModuleSummary> {
    let mut ancestors: HashSet<*const Module> = HashSet::new();
    ancestors.insert(Arc::as_ptr(module));
    let mut stack = vec![Frame::enter(Arc::clone(module))];

    while let Some(frame) = stack.last_mut() {
        if let Some(child) = frame.pending.next() {
            if !ancestors.insert(Arc::as_ptr(&child)) {
                return Err(AtlasError::Cycle(format!(
                    "{} (reached again from {})",
                    child.path(),
                    frame.module.path()
                )));
            }
            stack.push(Frame::enter(child));
            continue;
        }

        let Some(done) = stack.pop() else { break };
        ancestors.remove(&Arc::as_ptr(&done.module));
        match stack.last_mut() {
            Some(parent) => parent.summary.modules.push(done.summary),
            None => return Ok(done.summary),
        }
    }

    unreachable!("the root frame returns its summary when popped")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ComponentKind;
    use crate::path::ModulePath;

    fn module(path: &str) -> Arc<Module> {
        Arc::new(Module::namespace(ModulePath::parse(path).unwrap()))
    }

    #[test]
    fn project_defaults_title_and_description() {
        let s = project(&Component::new("t1"));
        assert_eq!(
            s,
            ComponentSummary {
                name: "t1".into(),
                title: "t1".into(),
                description: String::new(),
            }
        );
    }

    #[test]
    fn project_keeps_declared_fields() {
        let s = project(
            &Component::new("url")
                .with_title("URL")
                .with_description("network address"),
        );
        assert_eq!(s.title, "URL");
        assert_eq!(s.description, "network address");
    }

    #[test]
    fn project_keeps_explicitly_empty_title() {
        let s = project(&Component::new("t1").with_title(""));
        assert_eq!(s.title, "");
    }

    #[test]
    fn project_module_mirrors_tree() {
        let root = module("a");
        root.add_component(ComponentKind::Type, Component::new("t1"))
            .unwrap();
        root.add_component(ComponentKind::Constraint, Component::new("k1"))
            .unwrap();
        root.add_component(ComponentKind::Converter, Component::new("v1"))
            .unwrap();
        let b = module("a.b");
        b.add_component(ComponentKind::Command, Component::new("run"))
            .unwrap();
        root.add_module(Arc::clone(&b)).unwrap();
        root.add_module(module("a.c")).unwrap();

        let s = project_module(&root).unwrap();
        assert_eq!(s.name, "a");
        assert_eq!(s.title, "a");
        assert_eq!(s.types.len(), 1);
        assert_eq!(s.constraints[0].name, "k1");
        assert_eq!(s.modules.len(), 2);
        assert_eq!(s.modules[0].name, "b");
        assert_eq!(s.modules[0].commands[0].title, "run");
        assert_eq!(s.modules[1].name, "c");
    }

    #[test]
    fn project_module_is_idempotent_and_detached() {
        let root = module("a");
        root.add_module(module("a.b")).unwrap();
        let first = project_module(&root).unwrap();
        let second = project_module(&root).unwrap();
        assert_eq!(first, second);

        root.add_module(module("a.c")).unwrap();
        assert_eq!(first.modules.len(), 1);
        assert_eq!(root.modules().len(), 2);
    }

    #[test]
    fn self_cycle_detected() {
        let a = module("a");
        a.add_module(Arc::clone(&a)).unwrap();
        let err = project_module(&a).unwrap_err();
        match err {
            AtlasError::Cycle(msg) => assert_eq!(msg, "a (reached again from a)"),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn deep_cycle_detected() {
        let a = module("a");
        let b = module("a.b");
        let c = module("a.b.c");
        a.add_module(Arc::clone(&b)).unwrap();
        b.add_module(Arc::clone(&c)).unwrap();
        c.add_module(Arc::clone(&a)).unwrap();
        let err = project_module(&b).unwrap_err();
        match err {
            AtlasError::Cycle(msg) => assert!(msg.starts_with("a.b ")),
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn shared_subtree_is_not_a_cycle() {
        let root = module("r");
        let left = module("r.left");
        let right = module("r.right");
        let shared = module("shared");
        left.add_module(Arc::clone(&shared)).unwrap();
        right.add_module(Arc::clone(&shared)).unwrap();
        root.add_module(left).unwrap();
        root.add_module(right).unwrap();

        let s = project_module(&root).unwrap();
        assert_eq!(s.modules[0].modules[0].name, "shared");
        assert_eq!(s.modules[1].modules[0].name, "shared");
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let root = module("n");
        let mut current = Arc::clone(&root);
        for i in 0..1_000 {
            let next = Arc::new(Module::namespace(current.path().child(&format!("n{i}"))));
            current.add_module(Arc::clone(&next)).unwrap();
            current = next;
        }
        let s = project_module(&root).unwrap();
        let mut depth = 0;
        let mut node = &s;
        while let Some(child) = node.modules.first() {
            depth += 1;
            node = child;
        }
        assert_eq!(depth, 1_000);
    }

    #[test]
    fn summary_serializes_flat_fields() {
        let root = module("a");
        root.add_component(ComponentKind::Type, Component::new("t1"))
            .unwrap();
        let json = serde_json::to_value(project_module(&root).unwrap()).unwrap();
        assert_eq!(json["name"], "a");
        assert_eq!(json["types"][0]["title"], "t1");
        assert_eq!(json["types"][0]["description"], "");
        assert!(json.get("converters").is_none());
    }

    mod prop {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        struct Shape {
            title: Option<String>,
            types: usize,
            children: Vec<Shape>,
        }

        fn arb_shape() -> impl Strategy<Value = Shape> {
            let leaf = (proptest::option::of("[a-z]{0,6}"), 0usize..4).prop_map(|(title, types)| {
                Shape {
                    title,
                    types,
                    children: Vec::new(),
                }
            });
            leaf.prop_recursive(4, 48, 4, |inner| {
                (
                    proptest::option::of("[a-z]{0,6}"),
                    0usize..4,
                    proptest::collection::vec(inner, 0..4),
                )
                    .prop_map(|(title, types, children)| Shape {
                        title,
                        types,
                        children,
                    })
            })
        }

        fn build(shape: &Shape, path: ModulePath) -> Arc<Module> {
            let name = path.name().unwrap_or_default().to_string();
            let mut header = Component::new(name);
            if let Some(title) = &shape.title {
                header = header.with_title(title.clone());
            }
            let module = Arc::new(Module::new(path, header));
            for i in 0..shape.types {
                module
                    .add_component(ComponentKind::Type, Component::new(format!("t{i}")))
                    .unwrap();
            }
            for (i, child) in shape.children.iter().enumerate() {
                let child_path = module.path().child(&format!("m{i}"));
                module.add_module(build(child, child_path)).unwrap();
            }
            module
        }

        fn isomorphic(module: &Module, summary: &ModuleSummary) -> bool {
            let children = module.modules();
            summary.name == module.name()
                && summary.title == module.title().unwrap_or(module.name())
                && summary.types.len() == module.types().len()
                && summary.modules.len() == children.len()
                && children
                    .iter()
                    .zip(&summary.modules)
                    .all(|(m, s)| isomorphic(m, s))
        }

        proptest! {
            #[test]
            fn projection_is_structurally_isomorphic(shape in arb_shape()) {
                let root = build(&shape, ModulePath::root().child("root"));
                let summary = project_module(&root).unwrap();
                prop_assert!(isomorphic(&root, &summary));
            }

            #[test]
            fn projection_is_repeatable(shape in arb_shape()) {
                let root = build(&shape, ModulePath::root().child("root"));
                let first = project_module(&root).unwrap();
                let second = project_module(&root).unwrap();
                prop_assert_eq!(first, second);
            }

            #[test]
            fn component_projection_defaults(
                name in "[a-z]{1,8}",
                title in proptest::option::of("[a-zA-Z ]{0,8}"),
                description in proptest::option::of("[a-z ]{0,12}"),
            ) {
                let mut c = Component::new(name.clone());
                if let Some(t) = &title {
                    c = c.with_title(t.clone());
                }
                if let Some(d) = &description {
                    c = c.with_description(d.clone());
                }
                let s = project(&c);
                prop_assert_eq!(s.title, title.unwrap_or(name));
                prop_assert_eq!(s.description, description.unwrap_or_default());
            }
        }
    }
}
