//! Process-wide cache of category enumerations, keyed by API base URL.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

type CategoryMap = HashMap<String, Arc<[String]>>;

static CATEGORIES: OnceLock<Mutex<CategoryMap>> = OnceLock::new();

fn map() -> &'static Mutex<CategoryMap> {
    CATEGORIES.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Cached categories for a base URL.
pub fn cached(base_url: &str) -> Option<Arc<[String]>> {
    let guard = map().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.get(base_url).cloned()
}

/// Remember the categories served by a base URL.
pub fn store(base_url: &str, categories: Vec<String>) -> Arc<[String]> {
    let categories: Arc<[String]> = categories.into();
    let mut guard = map().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.insert(base_url.to_string(), Arc::clone(&categories));
    categories
}

/// Forget the categories of one base URL; the next lookup refetches them.
pub fn invalidate(base_url: &str) {
    let mut guard = map().lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.remove(base_url);
}
