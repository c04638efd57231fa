//! Static site rendering from a tree of Jinja templates.
//!
//! Renders every template under a search path into an output directory,
//! copies static assets verbatim, and can keep re-rendering as the source
//! tree changes.

mod assets;
pub mod context;
pub mod site;
pub mod templates;
pub mod watcher;

pub use context::{Context, ContextProvider, ContextRule};
pub use site::{RenderSummary, Site, SiteConfig, SiteError};
pub use templates::{TemplateEngine, TemplateKind};
pub use watcher::{FileWatcher, WatchEvent};
