use lasso::{Spur, ThreadedRodeo};
use std::fmt;
use std::sync::LazyLock;

/// Scene keys are compared far more often than they are printed, so they
/// are interned once and passed around as a 4-byte `Spur`.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for entities in the scene graph.
///
/// Product-bound nodes, annotations and groups live in separate namespaces
/// (`product:<id>`, `custom:<id>`, `group:<n>`) so a product whose id
/// happens to be `"root"` can never collide with the scene root.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(Spur);

impl NodeId {
    pub fn intern(s: &str) -> Self {
        NodeId(INTERNER.get_or_intern(s))
    }

    /// The scene root.
    pub fn root() -> Self {
        Self::intern("root")
    }

    /// Scene ID of the node bound to `product_id`.
    pub fn product(product_id: &str) -> Self {
        Self::intern(&format!("product:{product_id}"))
    }

    /// Scene ID of the annotation with the given `customId`.
    pub fn custom(custom_id: &str) -> Self {
        Self::intern(&format!("custom:{custom_id}"))
    }

    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Fresh key in namespace `prefix`, e.g. `group:3`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self::intern(&format!("{prefix}:{}", next_sequence()))
    }
}

/// Process-wide monotonically increasing counter for generated IDs.
pub fn next_sequence() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NodeId").field(&self.as_str()).finish()
    }
}

/// Prints the namespaced key, e.g. `product:42`.
impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
