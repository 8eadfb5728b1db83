use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;

use standup::consts::{AUTHOR, DEFAULT_BIND, DEFAULT_SLACK_API_URL, HOMEPAGE, default_db_path};
use standup::engine::Engine;
use standup::server::{self, AppState};
use standup::setting::sqlite::SqliteSettingStore;
use standup::setting::{Setting, SettingStore};
use standup::slack::client::SlackClient;
use standup::store::StandupStore;
use standup::store::sqlite::SqliteStandupStore;

#[derive(Parser)]
#[command(
    name = "standup",
    version,
    author = AUTHOR,
    about = "Daily stand-ups over Slack direct messages.",
    after_help = HOMEPAGE
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database path for settings and stand-ups (use :memory: for ephemeral)
    #[arg(short, long, env = "STANDUP_DB")]
    db: Option<String>,

    /// Log at debug level
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the Slack webhook endpoints
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "STANDUP_BIND", default_value = DEFAULT_BIND)]
        bind: SocketAddr,

        #[command(flatten)]
        slack: SlackArgs,
    },
    /// Kick off today's stand-up for a channel (what the scheduler calls)
    Start {
        /// Channel whose setting to run
        channel: String,

        #[command(flatten)]
        slack: SlackArgs,
    },
    /// Show or change a channel's setting
    Setting {
        #[command(subcommand)]
        action: SettingAction,
    },
    /// Print a member's stand-up record as JSON
    Status {
        /// Member user id
        user: String,

        /// Day in the member's timezone (YYYY-MM-DD)
        #[arg(long)]
        date: String,
    },
}

#[derive(Subcommand)]
enum SettingAction {
    /// Print the setting as JSON
    Show { channel: String },
    /// Create or replace the setting
    Set {
        channel: String,

        /// A question to ask (repeat for each, in order)
        #[arg(short, long = "question", required = true)]
        questions: Vec<String>,

        /// A member user id (repeat for each)
        #[arg(short, long = "member", required = true)]
        members: Vec<String>,

        /// Where summaries go (defaults to the channel itself)
        #[arg(short, long)]
        summary_channel: Option<String>,
    },
}

#[derive(Args)]
struct SlackArgs {
    /// Bot token used to send messages
    #[arg(long, env = "SLACK_BOT_TOKEN", hide_env_values = true)]
    bot_token: String,

    /// User token for profile lookups (falls back to the bot token)
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    user_token: Option<String>,

    /// Signing secret for verifying webhook requests
    #[arg(long, env = "SLACK_SIGNING_SECRET", hide_env_values = true)]
    signing_secret: Option<String>,

    /// Slack Web API base URL
    #[arg(long, env = "SLACK_API_BASE_URL", default_value = DEFAULT_SLACK_API_URL)]
    api_url: String,
}

struct Stores {
    settings: Arc<SqliteSettingStore>,
    standups: Arc<SqliteStandupStore>,
}

fn open_stores(db: &str) -> anyhow::Result<Stores> {
    if db != ":memory:"
        && let Some(parent) = Path::new(db).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(Stores {
        settings: Arc::new(SqliteSettingStore::open(db)?),
        standups: Arc::new(SqliteStandupStore::open(db)?),
    })
}

fn build_engine(stores: &Stores, slack: Arc<SlackClient>) -> Engine {
    Engine::new(
        stores.settings.clone(),
        stores.standups.clone(),
        slack.clone(),
        slack,
    )
}

fn slack_client(args: &SlackArgs) -> Arc<SlackClient> {
    Arc::new(SlackClient::new(&args.bot_token, args.user_token.clone()).with_base_url(&args.api_url))
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let db = cli
        .db
        .unwrap_or_else(|| default_db_path().to_string_lossy().into_owned());
    let stores = open_stores(&db)?;
    info!(db = %db, "opened database");

    match cli.command {
        Command::Serve { bind, slack } => {
            let client = slack_client(&slack);
            let state = AppState {
                engine: Arc::new(build_engine(&stores, client.clone())),
                settings: stores.settings.clone(),
                messenger: client.clone(),
                directory: client,
                signing_secret: slack.signing_secret.filter(|s| !s.is_empty()),
            };
            if state.signing_secret.is_none() {
                tracing::warn!("SLACK_SIGNING_SECRET is not set; webhook requests are not verified");
            }
            server::serve(bind, state).await?;
        }
        Command::Start { channel, slack } => {
            let engine = build_engine(&stores, slack_client(&slack));
            let report = engine.start(&channel).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.failed.is_empty() {
                bail!("{} member(s) failed to start", report.failed.len());
            }
        }
        Command::Setting { action } => match action {
            SettingAction::Show { channel } => match stores.settings.get(&channel).await? {
                Some(setting) => println!("{}", serde_json::to_string_pretty(&setting)?),
                None => bail!("no setting for channel {channel}"),
            },
            SettingAction::Set {
                channel,
                questions,
                members,
                summary_channel,
            } => {
                let summary_channel = summary_channel.unwrap_or_else(|| channel.clone());
                let setting = Setting::new(channel, questions, members, summary_channel)?;
                stores.settings.put(&setting).await?;
                println!("✓ Saved setting for {}", setting.channel_id);
            }
        },
        Command::Status { user, date } => match stores.standups.get(&user, &date).await? {
            Some(standup) => println!("{}", serde_json::to_string_pretty(&standup)?),
            None => bail!("no stand-up for {user} on {date}"),
        },
    }

    Ok(())
}
