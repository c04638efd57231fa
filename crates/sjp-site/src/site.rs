//! Site rendering.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;

use crate::assets;
use crate::context::{Context, ContextRule, ContextRules};
use crate::templates::{self, TemplateEngine, TemplateKind};
use crate::watcher::{FileWatcher, WatchEvent};

/// Configuration for rendering a site.
#[derive(Debug, Clone)]
pub struct SiteConfig {
    /// Directory templates are loaded from
    pub searchpath: PathBuf,

    /// Directory rendered files are written to
    pub outpath: PathBuf,

    /// Directories whose files are copied instead of rendered, either
    /// relative to `searchpath` or starting with it
    pub staticpaths: Vec<PathBuf>,

    /// Ordered (pattern, provider) rules supplying template contexts
    pub contexts: Vec<ContextRule>,

    /// Merge the contexts of every matching rule instead of using the first
    pub merge_contexts: bool,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            searchpath: PathBuf::from("templates"),
            outpath: PathBuf::from("build"),
            staticpaths: vec![],
            contexts: vec![],
            merge_contexts: false,
        }
    }
}

/// Result of a render pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RenderSummary {
    /// Number of templates rendered
    pub rendered: usize,

    /// Number of static files copied
    pub copied: usize,

    /// Time taken in milliseconds
    pub duration_ms: u64,
}

/// Errors that can occur while rendering a site.
#[derive(Debug, thiserror::Error)]
pub enum SiteError {
    #[error("Invalid context pattern {pattern:?}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to list templates")]
    Walk(#[from] walkdir::Error),

    #[error("I/O error on {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to render template {name}")]
    Template {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    #[error("Failed to watch for changes")]
    Watch(#[source] std::io::Error),
}

impl SiteError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        SiteError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The message followed by each underlying cause, `: `-separated.
    pub fn chain(&self) -> String {
        let mut message = self.to_string();
        let mut cause = std::error::Error::source(self);
        while let Some(err) = cause {
            message.push_str(": ");
            message.push_str(&err.to_string());
            cause = std::error::Error::source(err);
        }
        message
    }
}

/// A tree of templates rendered into an output directory.
pub struct Site {
    config: SiteConfig,
    static_prefixes: Vec<String>,
    rules: ContextRules,
}

impl Site {
    /// Create a site from `config`, compiling its context rules.
    pub fn new(config: SiteConfig) -> Result<Self, SiteError> {
        let rules = ContextRules::compile(&config.contexts, config.merge_contexts)?;

        let static_prefixes = config
            .staticpaths
            .iter()
            .filter_map(|path| {
                let prefix = templates::static_prefix(&config.searchpath, path);
                if prefix.is_none() {
                    tracing::warn!(
                        "Static path {} is outside {}, ignoring",
                        path.display(),
                        config.searchpath.display()
                    );
                }
                prefix
            })
            .collect();

        Ok(Self {
            config,
            static_prefixes,
            rules,
        })
    }

    /// The configuration this site was built from.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Every file under the search path, as sorted template names.
    pub fn templates(&self) -> Result<Vec<String>, SiteError> {
        Ok(templates::discover(&self.config.searchpath)?)
    }

    /// How the template `name` is treated.
    pub fn kind(&self, name: &str) -> TemplateKind {
        templates::classify(name, &self.static_prefixes)
    }

    /// Context the template `name` is rendered with.
    pub fn context_for(&self, name: &str) -> Context {
        self.rules.context_for(name)
    }

    /// Render the renderable templates among `names`, returning how many were written.
    ///
    /// Templates are loaded fresh, so edits since the last pass are picked up.
    pub fn render_templates(&self, names: &[String]) -> Result<usize, SiteError> {
        let engine = TemplateEngine::new(&self.config.searchpath);

        let rendered = names
            .par_iter()
            .filter(|name| self.kind(name) == TemplateKind::Renderable)
            .map(|name| self.render_template(&engine, name))
            .collect::<Result<Vec<_>, SiteError>>()?;

        Ok(rendered.len())
    }

    /// Copy the static files among `names`, returning how many were copied.
    pub fn copy_static(&self, names: &[String]) -> Result<usize, SiteError> {
        let mut copied = 0;
        for name in names {
            if self.kind(name) == TemplateKind::Static {
                assets::copy_static(&self.config.searchpath, &self.config.outpath, name)?;
                copied += 1;
            }
        }
        Ok(copied)
    }

    /// Render every template and copy every static file once.
    pub fn build(&self) -> Result<RenderSummary, SiteError> {
        let start = Instant::now();

        fs::create_dir_all(&self.config.outpath)
            .map_err(|e| SiteError::io(&self.config.outpath, e))?;

        let names = self.templates()?;
        let rendered = self.render_templates(&names)?;
        let copied = self.copy_static(&names)?;

        Ok(RenderSummary {
            rendered,
            copied,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Render the site. With `watch` set, keep re-rendering on changes to
    /// the search path until interrupted with Ctrl+C.
    pub async fn render(&self, watch: bool) -> Result<RenderSummary, SiteError> {
        let summary = self.build()?;

        tracing::info!(
            "Rendered {} templates and copied {} static files in {}ms",
            summary.rendered,
            summary.copied,
            summary.duration_ms
        );

        if watch {
            self.watch().await?;
        }

        Ok(summary)
    }

    fn render_template(&self, engine: &TemplateEngine, name: &str) -> Result<(), SiteError> {
        tracing::info!("Rendering {}...", name);

        let html = engine
            .render_page(name, self.context_for(name))
            .map_err(|source| SiteError::Template {
                name: name.to_string(),
                source,
            })?;

        let dest = self.config.outpath.join(name);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| SiteError::io(parent, e))?;
        }
        fs::write(&dest, html).map_err(|e| SiteError::io(&dest, e))?;

        Ok(())
    }

    async fn watch(&self) -> Result<(), SiteError> {
        // notify reports absolute paths
        let root = fs::canonicalize(&self.config.searchpath)
            .map_err(|e| SiteError::io(&self.config.searchpath, e))?;

        let (_watcher, mut events) =
            FileWatcher::new(std::slice::from_ref(&root)).map_err(SiteError::Watch)?;

        tracing::info!(
            "Watching '{}' for changes...",
            self.config.searchpath.display()
        );
        tracing::info!("Press Ctrl+C to stop.");

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(event) => self.handle_event(&root, event),
                    None => break,
                },
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Stopped watching");
                    break;
                }
            }
        }

        Ok(())
    }

    fn handle_event(&self, root: &Path, event: WatchEvent) {
        tracing::debug!("{:?}", event);

        let path = match event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => path,
            WatchEvent::Deleted(path) => {
                tracing::debug!("Ignoring removal of {}", path.display());
                return;
            }
        };

        if !path.is_file() {
            return;
        }
        let Some(name) = templates::template_name(root, &path) else {
            return;
        };

        let result = match self.kind(&name) {
            TemplateKind::Ignored => return,
            TemplateKind::Static => self.copy_static(std::slice::from_ref(&name)).map(|_| ()),
            TemplateKind::Partial | TemplateKind::Renderable => self
                .templates()
                .and_then(|names| self.render_templates(&names))
                .map(|count| {
                    tracing::info!("Re-rendered {} templates after change to {}", count, name)
                }),
        };

        if let Err(e) = result {
            tracing::error!("{}", e.chain());
        }
    }
}
