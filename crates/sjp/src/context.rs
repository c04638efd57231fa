//! Template context derived from `SJP_*` environment variables.

use std::collections::BTreeMap;
use std::ffi::OsString;

use minijinja::Value;
use sjp_site::Context;

/// Prefix marking environment variables exposed to templates.
pub const ENV_PREFIX: &str = "SJP_";

/// Build the context mapping from `vars`.
///
/// `SJP_SITE_TITLE=Docs` becomes `site_title => "Docs"`. Variables without
/// the prefix, or whose name or value is not valid Unicode, are skipped.
/// If two variables normalise to the same key, the later one wins.
pub fn env_context<I>(vars: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(name, value)| {
            let name = name.into_string().ok()?;
            let key = name.strip_prefix(ENV_PREFIX)?.to_lowercase();
            let value = value.into_string().ok()?;
            Some((key, value))
        })
        .collect()
}

/// Context provider reading the process environment on every call.
pub fn env_provider(_template: &str) -> Context {
    env_context(std::env::vars_os())
        .into_iter()
        .map(|(key, value)| (key, Value::from(value)))
        .collect()
}
