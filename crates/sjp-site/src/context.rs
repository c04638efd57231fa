//! Per-template context selection.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use minijinja::Value;
use regex::Regex;

use crate::site::SiteError;

/// Variables a template is rendered with.
pub type Context = BTreeMap<String, Value>;

/// Supplies the context for a template, given its name.
///
/// Providers are called once per template per render pass, possibly from
/// several threads at once.
pub trait ContextProvider: Send + Sync {
    /// Build the context for the template called `template`.
    fn context(&self, template: &str) -> Context;
}

impl<F> ContextProvider for F
where
    F: Fn(&str) -> Context + Send + Sync,
{
    fn context(&self, template: &str) -> Context {
        self(template)
    }
}

/// A template name pattern and the provider used for templates matching it.
///
/// The pattern is a regular expression matched from the start of the
/// template name, but not required to reach its end: `.*.html` matches
/// `index.html` and `blog/post.html`.
#[derive(Clone)]
pub struct ContextRule {
    /// Regular expression over `/`-separated template names
    pub pattern: String,

    /// Provider invoked for matching templates
    pub provider: Arc<dyn ContextProvider>,
}

impl ContextRule {
    /// Create a rule routing templates matching `pattern` to `provider`.
    pub fn new(pattern: impl Into<String>, provider: impl ContextProvider + 'static) -> Self {
        Self {
            pattern: pattern.into(),
            provider: Arc::new(provider),
        }
    }
}

impl fmt::Debug for ContextRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRule")
            .field("pattern", &self.pattern)
            .finish_non_exhaustive()
    }
}

/// Context rules with their patterns compiled.
pub(crate) struct ContextRules {
    rules: Vec<(Regex, Arc<dyn ContextProvider>)>,
    merge: bool,
}

impl ContextRules {
    /// Compile `rules` in order. With `merge` set, every matching rule
    /// contributes to the context instead of only the first.
    pub(crate) fn compile(rules: &[ContextRule], merge: bool) -> Result<Self, SiteError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let regex = Regex::new(&format!("^(?:{})", rule.pattern)).map_err(|source| {
                    SiteError::InvalidPattern {
                        pattern: rule.pattern.clone(),
                        source,
                    }
                })?;
                Ok((regex, Arc::clone(&rule.provider)))
            })
            .collect::<Result<Vec<_>, SiteError>>()?;

        Ok(Self { rules, merge })
    }

    /// Resolve the context for `template`.
    pub(crate) fn context_for(&self, template: &str) -> Context {
        let mut matching = self
            .rules
            .iter()
            .filter(|(regex, _)| regex.is_match(template))
            .map(|(_, provider)| provider.context(template));

        if !self.merge {
            return matching.next().unwrap_or_default();
        }

        matching.fold(Context::new(), |mut merged, context| {
            merged.extend(context);
            merged
        })
    }
}
