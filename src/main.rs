#![forbid(unsafe_code)]

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::task::LocalSet;
use tracing::{Level as TraceLevel, info};
use tracing_subscriber::FmtSubscriber;

use kibana_clicker::config::{
    JsonFileStore, SettingKey, Settings, SettingsStore, SharedSettings, load_settings,
    spawn_settings_sync,
};
use kibana_clicker::constants::marker::LINK_CLASS;
use kibana_clicker::constants::rows::GRID_LABEL_TAG;
use kibana_clicker::dashboard_url::{DashboardUrl, FieldFilterRequest};
use kibana_clicker::detector::{Detector, DetectorState};
use kibana_clicker::dom::snapshot::NodeSnapshot;
use kibana_clicker::dom::{Document, Element, Selector};
use kibana_clicker::hash_state::{self, HashState};
use kibana_clicker::scanner::ViewerScanner;

#[derive(Debug, Parser)]
#[command(name = "kibana-clicker", version, about = "Filter links for Kibana and OpenSearch Dashboards")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the Discover URL that filters on one field value
    Link {
        /// Current dashboard page URL
        #[arg(long)]
        url: String,
        #[arg(long)]
        field: String,
        #[arg(long)]
        value: String,
        /// Override the stored setting for this link only
        #[arg(long)]
        preserve_filters: Option<bool>,
        #[arg(long)]
        preserve_date_range: Option<bool>,
        #[arg(long)]
        preserve_columns: Option<bool>,
        #[arg(long)]
        preserve_query: Option<bool>,
    },
    /// Decode a hash query (the part after `#/...?`) into JSON
    Decode { raw: String },
    /// Encode a JSON object into a hash query
    Encode { json: String },
    /// Show or change stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Load a page snapshot, inject links and print them
    Scan {
        #[arg(long)]
        url: String,
        /// JSON snapshot of the page body
        #[arg(long)]
        page: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsAction {
    Show,
    Set {
        key: SettingKey,
        #[arg(action = clap::ArgAction::Set)]
        value: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse log level from environment variable
    let log_level = match std::env::var("LOG_LEVEL")
        .unwrap_or_else(|_| "info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("Failed to build async runtime")?;
    LocalSet::new().block_on(&runtime, run(args.command))?;
    Ok(())
}

async fn run(command: Command) -> Result<()> {
    let store = JsonFileStore::open_default();

    match command {
        Command::Link {
            url,
            field,
            value,
            preserve_filters,
            preserve_date_range,
            preserve_columns,
            preserve_query,
        } => {
            let settings = load_settings(&store, Settings::default()).await;
            let mut request = FieldFilterRequest::from_settings(field, value, &settings);
            request.preserve_filters = preserve_filters.unwrap_or(request.preserve_filters);
            request.preserve_date_range = preserve_date_range.unwrap_or(request.preserve_date_range);
            request.preserve_columns = preserve_columns.unwrap_or(request.preserve_columns);
            request.preserve_query = preserve_query.unwrap_or(request.preserve_query);

            let page = DashboardUrl::parse_lenient(&url)
                .with_context(|| format!("Invalid page URL {url:?}"))?;
            println!("{}", page.build_filter_url(&request));
        }
        Command::Decode { raw } => {
            let state = hash_state::decode(&raw)?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Encode { json } => {
            let state: HashState =
                serde_json::from_str(&json).context("Hash state must be a JSON object")?;
            println!("{}", hash_state::encode(&state));
        }
        Command::Settings { action } => match action {
            SettingsAction::Show => {
                let settings = load_settings(&store, Settings::default()).await;
                for key in SettingKey::ALL {
                    println!("{key} = {}", settings.get(key));
                }
                info!(path = ?store.path(), "Settings file");
            }
            SettingsAction::Set { key, value } => {
                store.set_value(key, value).await?;
                println!("{key} = {value}");
            }
        },
        Command::Scan { url, page } => scan(&store, &url, &page).await?,
    }
    Ok(())
}

/// Run the detector over a static page: identify, scan, wait for polls
async fn scan(store: &JsonFileStore, url: &str, page: &Path) -> Result<()> {
    let settings = SharedSettings::new(load_settings(store, Settings::default()).await);
    spawn_settings_sync(store.subscribe(), settings.clone());
    let snapshot = NodeSnapshot::load(page)?;

    let document = Document::new(url);
    let mut detector = Detector::new(document.clone(), settings);
    document.body().append_child(&snapshot.build(&document));

    detector.handle_mutations();
    let DetectorState::Identified(variant) = detector.state() else {
        bail!("No supported dashboard found in {:?}", page);
    };
    info!(variant = variant.name(), "Scanning page");

    detector.handle_mutations();
    detector.settle().await;

    let links = document.query_selector_all(&Selector::class(LINK_CLASS));
    for link in &links {
        println!(
            "{}\t{}\t{}",
            field_of(link).unwrap_or_default(),
            link.text_content(),
            link.get_attribute("href").unwrap_or_default()
        );
    }
    info!(links = links.len(), "Scan finished");
    Ok(())
}

/// Field an injected link belongs to: the flyout row's test subject, or the
/// `dt` label before a grid cell
fn field_of(link: &Element) -> Option<String> {
    let cell = link.parent()?;
    if let Some(name) = ViewerScanner::field_name(&cell) {
        return Some(name);
    }
    let siblings = cell.parent()?.element_children();
    let index = siblings.iter().position(|sibling| *sibling == cell)?;
    siblings[..index]
        .iter()
        .rev()
        .find(|sibling| sibling.tag_name() == Some(GRID_LABEL_TAG))
        .map(|label| label.text_content().trim().to_string())
}
