use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediavault::cli::{resolve_content_type, Cli, Command};
use mediavault::{Config, Database, MediaService, UploadHeader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays parseable JSON
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mediavault=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let db = Database::new(&config.database.path).await?;
    db.run_migrations().await?;
    tracing::info!("Database initialized");

    let service = MediaService::from_config(db, &config);
    service.ensure_upload_directories().await?;

    if let Err(e) = run(&service, cli.command).await {
        tracing::error!(kind = ?e.kind(), "{}", e);
        return Err(e.into());
    }

    Ok(())
}

async fn run(service: &MediaService, command: Command) -> mediavault::Result<()> {
    match command {
        Command::Init => {
            println!("{}", service.storage().root().display());
        }
        Command::Upload {
            file,
            content_type,
            name,
        } => {
            let metadata = tokio::fs::metadata(&file)
                .await
                .map_err(|e| mediavault::AppError::fs(format!("stat {}", file.display()), e))?;
            let original_name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            let content_type = resolve_content_type(&file, content_type);

            let reader = tokio::fs::File::open(&file)
                .await
                .map_err(|e| mediavault::AppError::fs(format!("open {}", file.display()), e))?;
            let header = UploadHeader::new(original_name, metadata.len(), content_type);

            let record = service.upload_file(reader, header).await?;
            print_json(&record);
        }
        Command::List { limit, offset } => {
            let page = service.list_files(limit, offset).await?;
            print_json(&page);
        }
        Command::Show { uuid } => {
            let record = service.get_file_by_uuid(&uuid).await?;
            print_json(&record);
        }
        Command::Path { uuid, thumbnail } => {
            let path = if thumbnail {
                service.get_thumbnail_path(&uuid).await?
            } else {
                service.get_file_path(&uuid).await?
            };
            println!("{}", path.display());
        }
        Command::Delete { uuid } => {
            service.delete_file(&uuid).await?;
            println!("deleted {}", uuid);
        }
        Command::AltText { uuid, text } => {
            let record = service.set_alt_text(&uuid, text.as_deref()).await?;
            print_json(&record);
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => tracing::error!("Failed to serialize output: {}", e),
    }
}
