//! Process-wide table of solver backends by name.
//!
//! The built-in backends are registered the first time the table is
//! touched. Further backends can be added at startup with
//! [`register_backend`]; the table is read on every solver construction.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::{BackendConstructor, LinsolBackend};
use crate::backends;
use crate::error::{LinsolError, LinsolResult};
use crate::settings::LinsolSettings;

type Registry = HashMap<String, BackendConstructor>;

fn registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let mut map: Registry = HashMap::new();
        map.insert("lu".to_string(), backends::dense::DenseLu::boxed);
        map.insert("qr".to_string(), backends::dense::DenseQr::boxed);
        map.insert("ldl".to_string(), backends::sparse_ldl::SparseLdl::boxed_ldl);
        map.insert("cholesky".to_string(), backends::sparse_ldl::SparseLdl::boxed_cholesky);
        RwLock::new(map)
    })
}

fn read() -> RwLockReadGuard<'static, Registry> {
    registry().read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write() -> RwLockWriteGuard<'static, Registry> {
    registry().write().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Register `constructor` under `name`, replacing any previous entry.
///
/// Returns `true` if an entry was replaced.
pub fn register_backend(name: &str, constructor: BackendConstructor) -> bool {
    let replaced = write().insert(name.to_string(), constructor).is_some();
    log::debug!("registered linear solver backend {:?} (replaced: {})", name, replaced);
    replaced
}

/// Whether a backend is registered under `name`.
pub fn has_backend(name: &str) -> bool {
    read().contains_key(name)
}

/// Registered backend names, sorted.
pub fn backend_names() -> Vec<String> {
    let mut names: Vec<String> = read().keys().cloned().collect();
    names.sort();
    names
}

/// Instantiate the backend registered under `name`.
pub fn create_backend(name: &str, settings: &LinsolSettings) -> LinsolResult<Box<dyn LinsolBackend>> {
    let constructor = read()
        .get(name)
        .copied()
        .ok_or_else(|| LinsolError::UnknownBackend(name.to_string()))?;
    Ok(constructor(settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered() {
        for name in ["lu", "qr", "ldl", "cholesky"] {
            assert!(has_backend(name), "{}", name);
        }
        let names = backend_names();
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
        assert!(!has_backend("klu"));
    }

    #[test]
    fn test_create_unknown_backend() {
        let err = create_backend("no-such-solver", &LinsolSettings::default());
        assert!(matches!(err, Err(LinsolError::UnknownBackend(name)) if name == "no-such-solver"));
    }

    #[test]
    fn test_register_alias() {
        fn make(settings: &LinsolSettings) -> Box<dyn LinsolBackend> {
            backends::dense::DenseLu::boxed(settings)
        }
        register_backend("lu-alias", make);
        assert!(has_backend("lu-alias"));
        let backend = create_backend("lu-alias", &LinsolSettings::default()).unwrap();
        assert_eq!(backend.name(), "lu");
        assert!(register_backend("lu-alias", make));
    }
}
