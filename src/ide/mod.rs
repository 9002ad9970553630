//! IDE features — High-level APIs for editor integrations.
//!
//! This module provides the interface between the semantic model (HIR)
//! and a language server. Each query corresponds to an editor request.
//!
//! ## Design Principles
//!
//! 1. **Pure functions**: Take data in, return data out
//! 2. **No LSP types**: Uses our own types, converted at the server boundary
//! 3. **Composable**: Built on top of HIR queries
//!
//! ## Usage
//!
//! ```ignore
//! use magik::ide::AnalysisHost;
//! use magik::LineCol;
//!
//! let host = AnalysisHost::new();
//! let outcome = host.set_file_content("/ws/rope.magik", "_block _local a << 1 _endblock");
//!
//! let analysis = host.analysis();
//! let hover = analysis.hover(outcome.file, LineCol::new(0, 14));
//! ```

mod analysis;
mod hover;
mod inlay_hints;
mod rename;
mod symbols;

pub use analysis::{Analysis, AnalysisHost};
pub use hover::HoverResult;
pub use inlay_hints::{InlayHint, InlayHintKind};
pub use rename::Resolution;
pub use symbols::{SymbolInfo, workspace_symbols};
