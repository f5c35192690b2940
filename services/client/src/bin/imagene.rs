//! services/client/src/bin/imagene.rs

use std::sync::Arc;

use clap::{ArgGroup, Parser, Subcommand};
use client_lib::{
    adapters::{prefs, HttpCatalogAdapter},
    config::Config,
    error::ClientError,
};
use imagene_core::{
    domain::{FilterPatch, GroupRef, Keyword, SortField},
    genetics,
    ports::GenerationService,
    store::FilterStore,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "imagene", about = "Gallery client for the imagene catalog backend")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List images matching the given filter flags.
    Images {
        /// Group scope; empty means ungrouped images.
        #[arg(long, value_delimiter = ',')]
        groups: Vec<i64>,
        /// Comma-delimited search tokens.
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        /// created_at, score, steps, cfg, height, width or random.
        #[arg(long)]
        sort: Option<String>,
    },
    /// Show the group previews and the keyword index.
    Groups,
    /// Delete images by id.
    Delete {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<i64>,
    },
    /// Assign images to a group, addressed by id or by name.
    #[command(group(ArgGroup::new("target").required(true).args(["group_id", "group_name"])))]
    Assign {
        #[arg(long)]
        group_id: Option<i64>,
        #[arg(long)]
        group_name: Option<String>,
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<i64>,
    },
    /// Remove images from the given groups.
    Unassign {
        #[arg(long, required = true, value_delimiter = ',')]
        groups: Vec<i64>,
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<i64>,
    },
    /// Delete keywords from the catalog by id.
    DeleteKeywords {
        #[arg(required = true, value_delimiter = ',')]
        ids: Vec<i64>,
    },
    /// Breed a generation batch from the current pool and submit it.
    Generate {
        /// Groups whose images form the breeding pool and receive the output.
        #[arg(long, value_delimiter = ',')]
        groups: Vec<i64>,
        /// Batch size; overrides and persists the cached preference.
        #[arg(long)]
        count: Option<usize>,
        /// Mutation count; overrides and persists the cached preference.
        #[arg(long)]
        mutation: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!(api = %config.api_base_url, "configuration loaded");

    // --- 2. Build the Adapter and the Store ---
    let adapter = Arc::new(HttpCatalogAdapter::new(config.api_base_url.clone()));
    let mut store = FilterStore::new(adapter.clone());

    // --- 3. Run the Requested Operation ---
    match cli.command {
        Command::Images {
            groups,
            search,
            limit,
            offset,
            sort,
        } => {
            let sort_by = match sort {
                Some(spec) => Some(Some(parse_sort(&spec)?)),
                None => None,
            };
            store
                .set_criteria(FilterPatch {
                    group_ids: Some(groups),
                    search_value: Some(search),
                    limit: Some(limit.unwrap_or(config.fetch_limit)),
                    offset: Some(offset.unwrap_or(0)),
                    sort_by,
                    ..FilterPatch::default()
                })
                .await;
            for image in store.images() {
                let title = image.title.as_deref().unwrap_or("-");
                println!("{:>8}  {:<48}  {}", image.id, image.url, title);
            }
        }
        Command::Groups => {
            store.refresh_group_previews().await;
            for group in store.group_previews() {
                println!("{:>6}  {:<24}  {} images", group.id, group.name, group.item_count);
            }
            for (key, keywords) in store.keyword_index() {
                let values: Vec<&str> =
                    keywords.values().map(|kw| kw.value.as_str()).collect();
                println!("  {key}: {}", values.join(", "));
            }
        }
        Command::Delete { ids } => {
            let count = ids.len();
            for id in ids {
                store.toggle_selection(id);
            }
            store.bulk_delete().await;
            if store.last_error().is_none() {
                println!("deleted {count} images");
            }
        }
        Command::Assign {
            group_id,
            group_name,
            ids,
        } => {
            let group = match (group_id, group_name) {
                (Some(id), _) => GroupRef::ById(id),
                (None, Some(name)) => GroupRef::ByName(name),
                // clap's arg group guarantees one of the two.
                (None, None) => unreachable!(),
            };
            for id in ids {
                store.toggle_selection(id);
            }
            store.bulk_assign_group(group).await;
        }
        Command::Unassign { groups, ids } => {
            store
                .set_criteria(FilterPatch {
                    group_ids: Some(groups),
                    ..FilterPatch::default()
                })
                .await;
            for id in ids {
                store.toggle_selection(id);
            }
            store.bulk_unassign_group().await;
        }
        Command::DeleteKeywords { ids } => {
            store.refresh_group_previews().await;
            let known: Vec<Keyword> = store
                .keyword_index()
                .values()
                .flat_map(|by_id| by_id.values())
                .filter(|keyword| ids.contains(&keyword.id))
                .cloned()
                .collect();
            for id in &ids {
                if !known.iter().any(|keyword| keyword.id == *id) {
                    eprintln!("warning: no keyword with id {id} in the current scope");
                }
            }
            for keyword in known {
                store.toggle_keyword(keyword);
            }
            store.bulk_delete_keywords().await;
        }
        Command::Generate {
            groups,
            count,
            mutation,
        } => {
            let mut profile = prefs::load(&config.prefs_path);
            let overridden = count.is_some() || mutation.is_some();
            if let Some(count) = count {
                profile.n_gen = count;
            }
            if let Some(mutation) = mutation {
                profile.mutation = mutation;
            }
            if overridden {
                prefs::save(&config.prefs_path, &profile)?;
            }

            store
                .set_criteria(FilterPatch {
                    group_ids: Some(groups.clone()),
                    ..FilterPatch::default()
                })
                .await;
            store.refresh_group_previews().await;
            if let Some(message) = store.last_error() {
                eprintln!("error: {message}");
                std::process::exit(1);
            }

            let pool = genetics::dna_pool(store.images());
            let batch = genetics::build_generation_batch(
                &profile,
                &pool,
                store.keyword_index(),
                &groups,
                &mut rand::rng(),
            );
            info!(batch = batch.len(), "submitting generation batch");
            let created = adapter.create_images(&batch).await?;
            println!("generated {} images", created.len());
            store.refresh(None).await;
        }
    }

    // --- 4. Surface any Recorded Store Error ---
    if let Some(message) = store.last_error() {
        eprintln!("error: {message}");
        std::process::exit(1);
    }
    Ok(())
}

fn parse_sort(spec: &str) -> Result<SortField, ClientError> {
    match spec {
        "created_at" => Ok(SortField::CreatedAt),
        "score" => Ok(SortField::Score),
        "steps" => Ok(SortField::Steps),
        "cfg" => Ok(SortField::Cfg),
        "height" => Ok(SortField::Height),
        "width" => Ok(SortField::Width),
        "random" => Ok(SortField::Random),
        other => Err(ClientError::Internal(format!(
            "unknown sort key '{other}'"
        ))),
    }
}
