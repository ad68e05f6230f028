// Public modules
pub mod collector;
pub mod defaults;
pub mod deobfuscate;
pub mod error;
pub mod indexer;
pub mod map;
pub mod mapfile;
pub mod names;
pub mod protect;
pub mod resolver;
pub mod rewrite;
pub mod symbols;
pub mod topology;
pub mod workspace;

// Info.plist helpers
pub mod plist;

// Re-export common types for convenience
pub use collector::{CancelToken, DiscoveryStrategy};
pub use error::{Error, ErrorCode, Result};
pub use map::ObfuscationMap;
pub use protect::{protect, ProtectOptions, ProtectReport};
pub use symbols::{FileRef, Module, Occurrence, Symbol, SymbolKind};
