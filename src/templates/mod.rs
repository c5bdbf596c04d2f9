//! Template catalogue: prototypes, hashed lookup, loading and instantiation

pub mod instantiate;
pub mod loader;
pub mod store;

pub use instantiate::singularity;
pub use loader::{load_templates, load_templates_sized, LoadError, LootTables};
pub use store::{LookupStats, StoreError, Template, TemplateRegistry};
