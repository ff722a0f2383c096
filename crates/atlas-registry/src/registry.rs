//! The registry service.
//!
//! [`Registry`] is what command handlers see; [`ModuleRegistry`] is the
//! in-memory tree that backs it. Loading runs in three stages: fetch and
//! compile happen without any lock held, then the bind stage takes the
//! registry-wide bind lock, checks that the declared path is free, and
//! grafts the module in. A load that fails at any stage leaves the tree
//! untouched.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use url::Url;

use atlas_net::Fetcher;
use atlas_types::error::{AtlasError, LoadError, Result};

use crate::descriptor::ModuleDescriptor;
use crate::module::Module;
use crate::path::ModulePath;

/// Where a descriptor comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSource {
    pub url: Url,
}

impl LoadSource {
    pub fn new(url: Url) -> Self {
        Self { url }
    }
}

/// Process-wide module store, resolvable by dotted path.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Fetch, compile, and bind the descriptor at `source`.
    ///
    /// Returns the newly bound module. Any failure is a
    /// [`AtlasError::Load`] and leaves the registry unchanged.
    async fn load(&self, source: &LoadSource) -> Result<Arc<Module>>;

    /// Resolve one module. Unknown or malformed paths are
    /// [`AtlasError::NotFound`].
    fn get_module(&self, path: &str) -> Result<Arc<Module>>;

    /// Top-level modules (`None`) or the children of the module at `path`.
    fn get_modules(&self, path: Option<&str>) -> Result<Vec<Arc<Module>>>;
}

/// In-memory registry tree fed by a [`Fetcher`].
pub struct ModuleRegistry {
    root: Arc<Module>,
    fetcher: Arc<dyn Fetcher>,
    bind_lock: Mutex<()>,
}

impl ModuleRegistry {
    /// Create an empty registry.
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            root: Arc::new(Module::namespace(ModulePath::root())),
            fetcher,
            bind_lock: Mutex::new(()),
        }
    }

    /// Bind an already built module at its own path.
    ///
    /// Intermediate namespace modules are created as needed. Fails with
    /// [`LoadError::Collision`] when the path is taken.
    pub fn insert(&self, module: Arc<Module>) -> Result<()> {
        let _guard = self.bind_lock.lock();
        let path = module.path().clone();
        let Some((_, parents)) = path.segments().split_last() else {
            return Err(LoadError::Invalid("cannot bind a module at the registry root".into()).into());
        };

        // Check before creating any namespace so a collision leaves no trace.
        if self.resolve(&path).is_some() {
            return Err(LoadError::Collision(path.to_string()).into());
        }

        let mut parent = Arc::clone(&self.root);
        for segment in parents {
            parent = parent.child_or_namespace(segment);
        }
        parent.add_module(module)?;
        log::debug!("Bound module {path}");
        Ok(())
    }

    fn resolve(&self, path: &ModulePath) -> Option<Arc<Module>> {
        let mut current = Arc::clone(&self.root);
        for segment in path.segments() {
            current = current.child(segment)?;
        }
        Some(current)
    }

    fn resolve_str(&self, path: &str) -> Result<Arc<Module>> {
        ModulePath::parse(path)
            .and_then(|p| self.resolve(&p))
            .ok_or_else(|| AtlasError::NotFound(path.to_string()))
    }
}

#[async_trait]
impl Registry for ModuleRegistry {
    async fn load(&self, source: &LoadSource) -> Result<Arc<Module>> {
        log::debug!("Loading module descriptor from {}", source.url);
        let text = self.fetcher.fetch(&source.url).await?;
        let module = ModuleDescriptor::from_json(&text)?.compile()?;
        self.insert(Arc::clone(&module))?;
        log::info!("Loaded module {} from {}", module.path(), source.url);
        Ok(module)
    }

    fn get_module(&self, path: &str) -> Result<Arc<Module>> {
        self.resolve_str(path)
    }

    fn get_modules(&self, path: Option<&str>) -> Result<Vec<Arc<Module>>> {
        match path {
            None => Ok(self.root.modules()),
            Some(path) => Ok(self.resolve_str(path)?.modules()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Component, ComponentKind};
    use atlas_net::MemoryFetcher;

    const ORIGIN: &str = "http://localhost:8080";

    fn registry_with(docs: &[(&str, &str)]) -> (ModuleRegistry, Arc<MemoryFetcher>) {
        let fetcher = Arc::new(MemoryFetcher::new());
        for (file, body) in docs {
            fetcher.insert(&format!("{ORIGIN}/{file}"), body);
        }
        let fetcher_dyn: Arc<dyn Fetcher> = Arc::clone(&fetcher) as Arc<dyn Fetcher>;
        (ModuleRegistry::new(fetcher_dyn), fetcher)
    }

    fn source(file: &str) -> LoadSource {
        LoadSource::new(Url::parse(&format!("{ORIGIN}/{file}")).unwrap())
    }

    #[tokio::test]
    async fn load_binds_module() {
        let (reg, fetcher) = registry_with(&[(
            "excalibur.json",
            r#"{ "name": "excalibur", "types": { "sword": {} } }"#,
        )]);
        let module = reg.load(&source("excalibur.json")).await.unwrap();
        assert_eq!(module.path().to_string(), "excalibur");
        assert_eq!(fetcher.requests().len(), 1);

        let resolved = reg.get_module("excalibur").unwrap();
        assert!(Arc::ptr_eq(&module, &resolved));
        assert_eq!(resolved.types()[0].name(), "sword");
    }

    #[tokio::test]
    async fn dotted_load_creates_namespaces() {
        let (reg, _) = registry_with(&[("tools.json", r#"{ "name": "io.example.tools" }"#)]);
        reg.load(&source("tools.json")).await.unwrap();

        let io = reg.get_module("io").unwrap();
        assert_eq!(io.title(), None);
        assert_eq!(reg.get_modules(Some("io")).unwrap()[0].name(), "example");
        assert_eq!(
            reg.get_module("io.example.tools").unwrap().path().to_string(),
            "io.example.tools"
        );
    }

    #[tokio::test]
    async fn sibling_loads_share_namespace() {
        let (reg, _) = registry_with(&[
            ("a.json", r#"{ "name": "io.a" }"#),
            ("b.json", r#"{ "name": "io.b" }"#),
        ]);
        reg.load(&source("a.json")).await.unwrap();
        reg.load(&source("b.json")).await.unwrap();
        let names: Vec<String> = reg
            .get_modules(Some("io"))
            .unwrap()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(reg.get_modules(None).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_registry_unchanged() {
        let (reg, _) = registry_with(&[]);
        let err = reg.load(&source("missing.json")).await.unwrap_err();
        assert!(matches!(err, AtlasError::Load(LoadError::Fetch { .. })));
        assert!(reg.get_modules(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn malformed_descriptor_leaves_registry_unchanged() {
        let (reg, _) = registry_with(&[("bad.json", "{ nope")]);
        let err = reg.load(&source("bad.json")).await.unwrap_err();
        assert!(matches!(err, AtlasError::Load(LoadError::Malformed(_))));
        assert!(reg.get_modules(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_descriptor_creates_no_namespaces() {
        let (reg, _) = registry_with(&[(
            "dup.json",
            r#"{ "name": "io.dup", "types": [ { "name": "t" }, { "name": "t" } ] }"#,
        )]);
        reg.load(&source("dup.json")).await.unwrap_err();
        assert!(reg.get_module("io").is_err());
    }

    #[tokio::test]
    async fn second_load_of_same_path_collides() {
        let (reg, _) = registry_with(&[("x.json", r#"{ "name": "x" }"#)]);
        let first = reg.load(&source("x.json")).await.unwrap();
        let err = reg.load(&source("x.json")).await.unwrap_err();
        match err {
            AtlasError::Load(LoadError::Collision(path)) => assert_eq!(path, "x"),
            other => panic!("expected collision, got {other:?}"),
        }
        assert!(Arc::ptr_eq(&first, &reg.get_module("x").unwrap()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_loads_of_same_path_bind_once() {
        let (reg, _) = registry_with(&[
            ("one.json", r#"{ "name": "shared.mod", "title": "one" }"#),
            ("two.json", r#"{ "name": "shared.mod", "title": "two" }"#),
        ]);
        let reg = Arc::new(reg);
        let a = tokio::spawn({
            let reg = Arc::clone(&reg);
            async move { reg.load(&source("one.json")).await }
        });
        let b = tokio::spawn({
            let reg = Arc::clone(&reg);
            async move { reg.load(&source("two.json")).await }
        });
        let results = [a.await.unwrap(), b.await.unwrap()];

        let winners: Vec<&Arc<Module>> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        assert_eq!(winners.len(), 1);
        let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
        assert!(matches!(loser, AtlasError::Load(LoadError::Collision(_))));

        let bound = reg.get_module("shared.mod").unwrap();
        assert!(Arc::ptr_eq(winners[0], &bound));
        assert_eq!(reg.get_modules(Some("shared")).unwrap().len(), 1);
    }

    #[test]
    fn insert_rejects_root_path() {
        let (reg, _) = registry_with(&[]);
        let err = reg
            .insert(Arc::new(Module::namespace(ModulePath::root())))
            .unwrap_err();
        assert!(matches!(err, AtlasError::Load(LoadError::Invalid(_))));
    }

    #[test]
    fn insert_prebuilt_module() {
        let (reg, _) = registry_with(&[]);
        let path = ModulePath::parse("atlas.components").unwrap();
        let module = Arc::new(Module::new(path, Component::new("components")));
        module
            .add_component(ComponentKind::Command, Component::new("load"))
            .unwrap();
        reg.insert(module).unwrap();
        let resolved = reg.get_module("atlas.components").unwrap();
        assert_eq!(resolved.commands()[0].name(), "load");
    }

    #[test]
    fn unknown_path_is_not_found() {
        let (reg, _) = registry_with(&[]);
        match reg.get_module("a.b") {
            Err(AtlasError::NotFound(p)) => assert_eq!(p, "a.b"),
            other => panic!("expected NotFound, got {other:?}"),
        }
        assert!(matches!(
            reg.get_modules(Some("a.b")),
            Err(AtlasError::NotFound(_))
        ));
        assert!(matches!(reg.get_module(""), Err(AtlasError::NotFound(_))));
    }
}
