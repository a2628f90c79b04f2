mod args;

use std::sync::Arc;
use std::time::Duration;

pub use args::{Args, Commands, CreateSuperuserArgs, GenerateCollectionsArgs, LikeArgs};
use clap::Parser;
use client::{LikeSession, LikeSigner, MarketApi, Target, TargetKind, UiEvent};
use common::{AdminUser, Collection, Database, ROLE_SUPERUSER};
use solana_sdk::{signature::Keypair, signer::Signer};

/// Runs the CLI command parser and executes the selected command.
/// Returns true if a CLI command was handled, false otherwise.
pub async fn run_cli() -> bool {
    let args = Args::parse();
    match &args.command {
        Some(Commands::CreateSuperuser(superuser_args)) => {
            if let Err(e) = create_superuser(
                &superuser_args.username,
                &superuser_args.email,
                &superuser_args.password,
            )
            .await
            {
                eprintln!("Failed to create superuser: {e}");
            }
            true
        }
        Some(Commands::CreateWallet) => {
            match get_rpc_url() {
                Ok(rpc_url) => match generate_wallet(&rpc_url).await {
                    Ok((wallet_pubkey, wallet_str)) => println!(
                        "Wallet successfully generated!\n Pubkey: {} Base58 Keypair: {}",
                        wallet_pubkey, wallet_str
                    ),
                    Err(e) => eprintln!("Failed to generate wallet: {e}"),
                },
                Err(e) => eprintln!("{e}"),
            }
            true
        }
        Some(Commands::GenerateCollections(generate_args)) => {
            match Collection::generate_test_collections_csv_async(
                &generate_args.out,
                generate_args.count,
            )
            .await
            {
                Ok(_) => println!(
                    "Successfully generated collections to: {}",
                    generate_args.out
                ),
                Err(e) => eprintln!("Failed to generate collections: {e}"),
            }
            true
        }
        Some(Commands::Like(like_args)) => {
            if let Err(e) = toggle_like(like_args).await {
                eprintln!("Failed to toggle like: {e}");
            }
            true
        }
        None => false,
    }
}

/// Creates a superuser: validates input, hashes password, checks for
/// duplicates, and saves to DB.
async fn create_superuser(username: &str, email: &str, password: &str) -> anyhow::Result<()> {
    // Validate and hash
    let user = AdminUser::new(username, email, password, ROLE_SUPERUSER)
        .map_err(|e| anyhow::anyhow!("Validation error: {e}"))?;

    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| anyhow::anyhow!("DATABASE_URL not set"))?;
    let db = Database::new(&database_url).await?;

    // Check if user already exists
    if db.get_admin_user(username).await?.is_some() {
        return Err(anyhow::anyhow!(
            "A user with username '{}' already exists.",
            username
        ));
    }

    db.save_admin_user(&user)
        .await
        .map_err(|e| anyhow::anyhow!("Database error: {e}"))?;

    println!("Superuser '{}' created successfully.", username);
    Ok(())
}

/// Helper to fetch RPC_URL from environment.
fn get_rpc_url() -> Result<String, String> {
    std::env::var("RPC_URL")
        .map_err(|e| format!("Error: RPC_URL environment variable not set: {e}"))
}

/// Generates a new funded Solana wallet and returns its pubkey and
/// Base58 keypair string.
async fn generate_wallet(rpc_url: &str) -> anyhow::Result<(String, String)> {
    let rpc = common::connect_rpc(rpc_url);
    let wallet = common::generate_funded_wallet(&rpc).await?;
    Ok((wallet.pubkey().to_string(), wallet.to_base58_string()))
}

struct WalletSigner(Keypair);

impl LikeSigner for WalletSigner {
    fn wallet_address(&self) -> String {
        self.0.pubkey().to_string()
    }

    fn sign(&self, message: &str) -> String {
        self.0.sign_message(message.as_bytes()).to_string()
    }
}

/// Toggles a like through the optimistic reconciler and waits for the
/// round trip to settle.
async fn toggle_like(like_args: &LikeArgs) -> anyhow::Result<()> {
    let kind = match like_args.target_type.as_str() {
        "nft" => TargetKind::Nft,
        "collection" => TargetKind::Collection,
        other => {
            return Err(anyhow::anyhow!(
                "Target type must be 'nft' or 'collection', got '{other}'"
            ));
        }
    };
    let target = Target {
        kind,
        id: like_args.target_id,
    };

    let api = MarketApi::new(like_args.server.clone())
        .map_err(|e| anyhow::anyhow!("Failed to create API client: {e}"))?;
    let wallet = Keypair::from_base58_string(&like_args.wallet);

    // Seed with the wallet's confirmed likes so the toggle direction
    // matches the server's state.
    let confirmed = api
        .wallet_likes(&wallet.pubkey().to_string())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to fetch existing likes: {e}"))?;

    let (session, mut events) = LikeSession::new(api, Arc::new(WalletSigner(wallet)));
    session.seed_confirmed(confirmed.iter().filter_map(|like| {
        match like.target_type.as_str() {
            "nft" => Some(Target {
                kind: TargetKind::Nft,
                id: like.target_id,
            }),
            "collection" => Some(Target {
                kind: TargetKind::Collection,
                id: like.target_id,
            }),
            _ => None,
        }
    }));

    let runner = tokio::spawn(session.clone().run());

    session.toggle(&target);

    // Wait for the debounced send and the server's answer (or the
    // watchdog) to settle the toggle.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(6);
    while session.has_pending(&target) && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    runner.abort();

    while let Ok(event) = events.try_recv() {
        match event {
            UiEvent::CountDelta { delta, .. } => println!("Like count change: {delta:+}"),
            UiEvent::Toast { message } => println!("Warning: {message}"),
        }
    }

    println!(
        "{} {} is now {}",
        like_args.target_type,
        like_args.target_id,
        if session.is_liked(&target) {
            "liked"
        } else {
            "not liked"
        }
    );
    Ok(())
}
