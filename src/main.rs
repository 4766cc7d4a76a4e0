use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nexa::app::AppContext;
use nexa::cli::{commands, Cli, Commands};
use nexa::config::Config;
use nexa::daemon::{Daemon, DaemonConfig};
use nexa::domain::ItemFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nexa=info")))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;
    if let Some(workers) = cli.workers {
        config.scheduler.workers = workers.max(1);
    }

    let ctx = AppContext::new(config, cli.database)?;

    match cli.command {
        Commands::Serve => {
            let daemon_config = DaemonConfig::from(&ctx.config);
            let daemon = Daemon::new(Arc::new(ctx), daemon_config);
            daemon.run().await?;
        }
        Commands::Add {
            url,
            schedule,
            tags,
            description,
            suspended,
        } => {
            let service = ctx.service(None);
            commands::add_feed(&service, &url, schedule, tags, description, suspended).await?;
        }
        Commands::Edit(args) => {
            commands::edit_feed(&ctx.service(None), args).await?;
        }
        Commands::Remove { id } => {
            commands::remove_feed(&ctx.service(None), &id)?;
        }
        Commands::Fetch { id } => {
            commands::fetch_feed(&ctx.service(None), &id).await?;
        }
        Commands::Feeds { tags, json } => {
            commands::list_feeds(&ctx.service(None), &tags, json)?;
        }
        Commands::Tags => {
            commands::list_tags(&ctx.service(None))?;
        }
        Commands::Items {
            feeds,
            unread,
            starred,
            limit,
            json,
        } => {
            let filter = ItemFilter {
                feed_ids: feeds,
                unread: unread.then_some(true),
                starred: starred.then_some(true),
                limit: Some(limit),
                ..Default::default()
            };
            commands::list_items(&ctx.service(None), &filter, json)?;
        }
        Commands::Mark(args) => {
            commands::mark_item(&ctx.service(None), args)?;
        }
    }

    Ok(())
}
