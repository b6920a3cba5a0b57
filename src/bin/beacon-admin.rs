use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use beacon::analytics::{AnalyticsAggregator, ReportWindow};
use beacon::config::{Config, DatabaseBackend};
use beacon::models::NewBanner;
use beacon::storage::{PostgresStorage, SqliteStorage, Storage};

#[derive(Parser)]
#[command(name = "beacon-admin")]
#[command(about = "Beacon banner management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a banner
    CreateBanner {
        /// Display name
        name: String,
        /// Raw banner HTML (will be rewritten for tracking at assignment time)
        html: String,
        /// Destination URL for clicks
        #[arg(long)]
        click_url: Option<String>,
        /// Owning campaign id
        #[arg(long)]
        campaign_id: Option<i64>,
        /// Click cap; unset means uncapped
        #[arg(long)]
        max_clicks: Option<i64>,
        /// Placement priority (lower wins)
        #[arg(long, default_value_t = 0)]
        priority: i64,
        /// Validity window start (unix seconds)
        #[arg(long)]
        start_date: Option<i64>,
        /// Validity window end (unix seconds)
        #[arg(long)]
        end_date: Option<i64>,
    },
    /// List all banners
    ListBanners,
    /// Deactivate a banner
    Deactivate {
        /// Banner id
        id: i64,
    },
    /// Reactivate a banner
    Reactivate {
        /// Banner id
        id: i64,
    },
    /// Create a campaign
    CreateCampaign {
        /// Campaign name
        name: String,
    },
    /// List all campaigns
    ListCampaigns,
    /// Print an analytics summary
    Summary {
        /// Reporting window: 24h, 7d, 30d or 90d
        #[arg(default_value = "7d")]
        window: String,
    },
    /// Print the top banners by lifetime clicks
    Top {
        /// How many banners to show
        #[arg(default_value_t = 10)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn Storage> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(PostgresStorage::new(&config.database.url).await?),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::CreateBanner {
            name,
            html,
            click_url,
            campaign_id,
            max_clicks,
            priority,
            start_date,
            end_date,
        } => {
            let banner = storage
                .create_banner(&NewBanner {
                    campaign_id,
                    name,
                    html,
                    click_url,
                    start_date,
                    end_date,
                    max_clicks,
                    priority,
                    ..Default::default()
                })
                .await?;
            println!("✓ Created banner {} ('{}')", banner.id, banner.name);
        }
        Commands::ListBanners => {
            let banners = storage.list_banners().await?;
            if banners.is_empty() {
                println!("No banners found.");
            } else {
                println!(
                    "{:<6} {:<30} {:<8} {:<10} {:<10} {}",
                    "ID", "Name", "Active", "Clicks", "Cap", "Destination"
                );
                println!("{}", "-".repeat(90));
                for b in banners {
                    println!(
                        "{:<6} {:<30} {:<8} {:<10} {:<10} {}",
                        b.id,
                        b.name,
                        if b.is_active { "yes" } else { "no" },
                        b.current_clicks,
                        b.max_clicks
                            .map(|c| c.to_string())
                            .unwrap_or_else(|| "-".to_string()),
                        b.click_url.as_deref().unwrap_or("-"),
                    );
                }
            }
        }
        Commands::Deactivate { id } => {
            if storage.set_banner_active(id, false).await? {
                println!("✓ Deactivated banner {}", id);
            } else {
                println!("⚠ Banner {} not found", id);
            }
        }
        Commands::Reactivate { id } => {
            if storage.set_banner_active(id, true).await? {
                println!("✓ Reactivated banner {}", id);
            } else {
                println!("⚠ Banner {} not found", id);
            }
        }
        Commands::CreateCampaign { name } => {
            let campaign = storage.create_campaign(&name, None, None).await?;
            println!("✓ Created campaign {} ('{}')", campaign.id, campaign.name);
        }
        Commands::ListCampaigns => {
            let campaigns = storage.list_campaigns().await?;
            if campaigns.is_empty() {
                println!("No campaigns found.");
            } else {
                for c in campaigns {
                    println!(
                        "{:<6} {:<30} {}",
                        c.id,
                        c.name,
                        if c.is_active { "active" } else { "inactive" }
                    );
                }
            }
        }
        Commands::Summary { window } => {
            let Some(window) = ReportWindow::parse(&window) else {
                anyhow::bail!("unknown window '{window}', expected 24h, 7d, 30d or 90d");
            };
            let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));
            let summary = aggregator
                .summary(window, chrono::Utc::now().timestamp())
                .await?;
            println!("Window:      {}", summary.window);
            println!("Views:       {}", summary.total_views);
            println!("Clicks:      {}", summary.total_clicks);
            println!("CTR:         {:.2}%", summary.click_through_rate);
        }
        Commands::Top { limit } => {
            let aggregator = AnalyticsAggregator::new(Arc::clone(&storage));
            let rankings = aggregator.top_banners(limit).await?;
            if rankings.is_empty() {
                println!("No banners with clicks yet.");
            } else {
                for (i, r) in rankings.iter().enumerate() {
                    println!("{:>3}. {:<30} {} clicks", i + 1, r.name, r.current_clicks);
                }
            }
        }
    }

    Ok(())
}
