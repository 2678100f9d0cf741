/// PackView Core: reference tree, scheduling and listfile enumeration.
///
/// This crate contains the enumeration engine with zero UI dependencies.
/// A frontend drives it through [`engine::Engine`] and drains newly
/// discovered references from its results buffer.
///
/// # Modules
///
/// - [`model`]: Arena-allocated reference tree and supporting types.
/// - [`package`]: Package groups, listfiles and the on-disk package source.
/// - [`engine`]: Work/wait scheduler, enumerator and reload.
/// - [`config`]: Engine configuration and configured root directories.
/// - [`error`]: Error types shared by the modules above.
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod package;
