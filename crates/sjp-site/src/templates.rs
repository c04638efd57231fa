//! Template discovery and the minijinja environment templates render in.

use std::path::{Component, Path, PathBuf};

use minijinja::{AutoEscape, Environment};
use walkdir::WalkDir;

/// How a file under the search path is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Hidden file or inside a hidden directory; never touched
    Ignored,

    /// Under a static path; copied verbatim
    Static,

    /// File name starts with `_`; only used by other templates
    Partial,

    /// Rendered to the output directory
    Renderable,
}

/// Classify `name` given the normalised static prefixes.
pub(crate) fn classify(name: &str, static_prefixes: &[String]) -> TemplateKind {
    if name.split('/').any(|part| part.starts_with('.')) {
        return TemplateKind::Ignored;
    }

    let is_static = static_prefixes.iter().any(|prefix| {
        name == prefix
            || name
                .strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    });
    if is_static {
        return TemplateKind::Static;
    }

    let file_name = name.rsplit('/').next().unwrap_or(name);
    if file_name.starts_with('_') {
        TemplateKind::Partial
    } else {
        TemplateKind::Renderable
    }
}

/// Turn `path` into a `/`-separated template name relative to `root`.
///
/// Returns `None` for paths outside `root`, the root itself, or names that
/// are not valid UTF-8.
pub(crate) fn template_name(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts = relative
        .components()
        .map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Express a static path as a name prefix relative to `searchpath`.
///
/// Static paths may be given relative to the search path (`assets`) or
/// including it (`templates/assets`).
pub(crate) fn static_prefix(searchpath: &Path, static_path: &Path) -> Option<String> {
    let root = without_cur_dir(searchpath);
    let path = without_cur_dir(static_path);

    let relative = match path.strip_prefix(&root) {
        Ok(rest) => rest.to_path_buf(),
        Err(_) if path.is_relative() => path,
        Err(_) => return None,
    };

    template_name(Path::new(""), &relative)
}

fn without_cur_dir(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// List every file under `root` as a sorted template name.
///
/// Hidden directories are not descended into.
pub(crate) fn discover(root: &Path) -> Result<Vec<String>, walkdir::Error> {
    let mut names = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.')
        });

    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        match template_name(root, entry.path()) {
            Some(name) => names.push(name),
            None => tracing::warn!("Skipping non UTF-8 path {}", entry.path().display()),
        }
    }

    names.sort();
    Ok(names)
}

/// Template engine using minijinja, loading templates from the search path.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create an engine loading templates from `searchpath`.
    ///
    /// Output is not auto-escaped, whatever the template extension.
    pub fn new(searchpath: &Path) -> Self {
        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(searchpath));
        env.set_auto_escape_callback(|_| AutoEscape::None);

        Self { env }
    }

    /// Render the template `name` with `context`.
    pub fn render_page<S: serde::Serialize>(
        &self,
        name: &str,
        context: S,
    ) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template(name)?;
        tmpl.render(context)
    }
}
