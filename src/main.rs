//! tunefs command-line entry point

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use tunefs::auth;
use tunefs::cli::{self, Mode};
use tunefs::config::{Credentials, ProviderKind};
use tunefs::pipeline::{read_chain, write_file};
use tunefs::provider::{PlaylistProvider, SpotifyProvider, YouTubeProvider};
use tunefs::vault;

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    cli::banner();

    let kind = cli::prompt_platform()?;
    let mode = cli::prompt_mode()?;
    let password = cli::prompt("Password")?;

    let config = kind.config();
    let credentials = Credentials::from_env(kind)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, cancelling");
                cancel.cancel();
            }
        });
    }

    let token = auth::authorize(&config, &credentials).await?;

    let provider: Arc<dyn PlaylistProvider> = match kind {
        ProviderKind::Spotify => Arc::new(SpotifyProvider::new(config, token)?),
        ProviderKind::YouTube => Arc::new(YouTubeProvider::new(config, token)?),
    };

    let account = provider.identify(&cancel).await?;
    info!(account = %account, "authenticated");

    match mode {
        Mode::Write => {
            let input = PathBuf::from(cli::prompt("Input file path")?);
            let base_name = cli::prompt("Base playlist name")?;
            let vault_file = vault::vault_path(&base_name);

            let head =
                write_file(provider, &input, &password, &base_name, &vault_file, &cancel).await?;

            match head {
                Some(head) => {
                    println!("Head playlist id: {}", head);
                    println!(
                        "Decoder vault: {} (keep it; reads without it depend on search stability)",
                        vault_file.display()
                    );
                }
                None => println!("Input was empty; nothing was stored."),
            }
        }
        Mode::Read => {
            let head_id = cli::prompt("Head playlist id")?;
            let output = PathBuf::from(cli::prompt("Output file path")?);
            let vault_answer = cli::prompt("Vault file path (empty to rebuild online)")?;
            let vault_file = if vault_answer.is_empty() {
                None
            } else {
                Some(PathBuf::from(vault_answer))
            };

            read_chain(
                provider,
                &head_id,
                &output,
                &password,
                vault_file.as_deref(),
                &cancel,
            )
            .await?;

            println!("File reconstructed at {}", output.display());
        }
    }

    Ok(())
}
