use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "NFT Marketplace CLI - manage admin users and more")]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a superuser (admin) account
    CreateSuperuser(CreateSuperuserArgs),

    /// Create a new Solana wallet (for testing only)
    ///
    /// This command generates a new Solana wallet, funds it with an
    /// airdrop and prints the keypair. For testing purposes only.
    CreateWallet,

    /// Generate test collections and save to CSV (for testing only)
    ///
    /// This command generates random collections with fresh treasury
    /// wallets and saves them to a CSV file. For testing purposes only.
    GenerateCollections(GenerateCollectionsArgs),

    /// Toggle a like against a running marketplace service
    ///
    /// Drives the optimistic reconciler end to end: the toggle is
    /// applied locally, debounced, sent, and reconciled with the
    /// server's response.
    Like(LikeArgs),
}

#[derive(ClapArgs, Debug)]
pub struct CreateSuperuserArgs {
    /// Username for the superuser
    #[arg(short, long, help = "Username for the superuser")]
    pub username: String,

    /// Email address for the superuser
    #[arg(short, long, help = "Email address for the superuser")]
    pub email: String,

    /// Password for the superuser
    #[arg(short, long, help = "Password for the superuser")]
    pub password: String,
}

#[derive(ClapArgs, Debug)]
pub struct GenerateCollectionsArgs {
    /// Number of collections to generate (for testing only)
    #[arg(short, long, help = "Number of collections to generate")]
    pub count: i64,

    /// Output CSV file path (for testing only)
    #[arg(short, long, help = "Output CSV file path")]
    pub out: String,
}

#[derive(ClapArgs, Debug)]
pub struct LikeArgs {
    /// Base URL of the marketplace service
    #[arg(short, long, default_value = "http://127.0.0.1:8080")]
    pub server: String,

    /// Base58-encoded wallet keypair used to sign the like
    #[arg(short, long, help = "Base58-encoded wallet keypair")]
    pub wallet: String,

    /// Target type: nft or collection
    #[arg(short = 't', long, help = "Target type: nft or collection")]
    pub target_type: String,

    /// Target id
    #[arg(short = 'i', long, help = "Target id")]
    pub target_id: i64,
}
