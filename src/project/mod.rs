//! Workspace management: file scanning, module lookup and the product and
//! module definition files.

pub mod def_file;
pub mod module_def;
mod workspace_loader;

pub use def_file::{PRODUCT_DEF, is_def_file, read_def_file};
pub use module_def::{MODULE_DEF, module_name_for};
pub use workspace_loader::{MAGIK_EXTENSION, WorkspaceLoader, is_magik_file};
