//! Render command: validate the source directory, then hand over to the site renderer.

use std::future::Future;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use sjp_site::{ContextRule, Site, SiteConfig};

use crate::context::env_provider;
use crate::preflight;

/// Subdirectory of the source directory holding static assets.
pub const ASSETS_DIR: &str = "assets";

/// Pattern routing templates to the environment context.
pub const HTML_PATTERN: &str = ".*.html";

/// Arguments of a render run.
#[derive(Debug, Clone, Args)]
pub struct RenderArgs {
    /// Render the site, and re-render on changes to <SRCPATH>
    #[arg(short, long)]
    pub watch: bool,

    /// The directory to look in for templates
    #[arg(long, default_value = "./templates")]
    pub srcpath: PathBuf,

    /// The directory to place rendered files in
    #[arg(long, default_value = "./build")]
    pub outpath: PathBuf,
}

/// Site configuration for a run with `args`.
pub fn site_config(args: &RenderArgs) -> SiteConfig {
    SiteConfig {
        searchpath: args.srcpath.clone(),
        outpath: args.outpath.clone(),
        staticpaths: vec![args.srcpath.join(ASSETS_DIR)],
        contexts: vec![ContextRule::new(HTML_PATTERN, env_provider)],
        merge_contexts: false,
    }
}

/// Run the render command.
pub async fn run(args: RenderArgs) -> Result<()> {
    dispatch(args, render_site).await
}

async fn render_site(config: SiteConfig, watch: bool) -> Result<()> {
    let site = Site::new(config)?;
    site.render(watch).await?;
    Ok(())
}

/// Check the source directory and, if it passes, call `render` exactly once.
async fn dispatch<F, Fut>(args: RenderArgs, render: F) -> Result<()>
where
    F: FnOnce(SiteConfig, bool) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let sources = preflight::check_source_dir(&args.srcpath)?;

    tracing::info!(
        "Rendering {} into {} ({} html sources)",
        args.srcpath.display(),
        args.outpath.display(),
        sources.len()
    );

    render(site_config(&args), args.watch).await
}
