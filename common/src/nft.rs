use anyhow::{Context, Result};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::{
    native_token::LAMPORTS_PER_SOL, pubkey::Pubkey, signature::Keypair, signer::Signer,
    system_instruction::create_account, transaction::Transaction,
};
use spl_associated_token_account::{
    get_associated_token_address_with_program_id, instruction::create_associated_token_account,
};
use spl_token_2022::{
    extension::{ExtensionType, metadata_pointer},
    id as token_2022_program_id,
    instruction::{initialize_mint, mint_to},
    state::Mint,
};
use spl_token_metadata_interface::state::TokenMetadata;

/// On-chain metadata for one NFT to be minted.
#[derive(Debug, Clone)]
pub struct NftSpec {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

/// Seam between the mint worker and the chain so queue logic can be
/// tested without an RPC node.
#[async_trait]
pub trait Minter: Send + Sync {
    /// Mint a single NFT to `owner` and return the new mint address.
    async fn mint_one(&self, spec: &NftSpec, owner: &Pubkey) -> Result<String>;
}

/// Mints token-2022 NFTs (0-decimals mint with a metadata extension)
/// paid for and authorized by the platform wallet.
pub struct NftMinter {
    client: RpcClient,
    payer: Keypair,
}

impl NftMinter {
    pub fn new(rpc_url: &str, payer: Keypair) -> Self {
        Self {
            client: RpcClient::new(rpc_url.to_string()),
            payer,
        }
    }

    pub fn payer_pubkey(&self) -> Pubkey {
        self.payer.pubkey()
    }

    async fn create_nft_mint(&self, spec: &NftSpec) -> Result<Keypair> {
        let recent_blockhash = self.client.get_latest_blockhash().await?;
        let mint = Keypair::new();

        let metadata = TokenMetadata {
            update_authority: Some(self.payer.pubkey()).try_into()?,
            mint: mint.pubkey(),
            name: spec.name.clone(),
            symbol: spec.symbol.clone(),
            uri: spec.uri.clone(),
            additional_metadata: vec![],
        };

        let metadata_len = metadata.tlv_size_of()?;
        let space =
            ExtensionType::try_calculate_account_len::<Mint>(&[ExtensionType::MetadataPointer])?;
        let rent = self
            .client
            .get_minimum_balance_for_rent_exemption(space + 4 + metadata_len)
            .await?;

        let create_account_instruction = create_account(
            &self.payer.pubkey(),
            &mint.pubkey(),
            rent,
            space as u64,
            &token_2022_program_id(),
        );

        let metadata_pointer_instruction = metadata_pointer::instruction::initialize(
            &token_2022_program_id(),
            &mint.pubkey(),
            Some(self.payer.pubkey()),
            Some(mint.pubkey()),
        )?;

        // 0 decimals: one indivisible token per mint.
        let initialize_mint_instruction = initialize_mint(
            &token_2022_program_id(),
            &mint.pubkey(),
            &self.payer.pubkey(),
            Some(&self.payer.pubkey()),
            0,
        )?;

        let metadata_instruction = spl_token_metadata_interface::instruction::initialize(
            &token_2022_program_id(),
            &mint.pubkey(),
            &self.payer.pubkey(),
            &mint.pubkey(),
            &self.payer.pubkey(),
            metadata.name,
            metadata.symbol,
            metadata.uri,
        );

        let transaction = Transaction::new_signed_with_payer(
            &[
                create_account_instruction,
                metadata_pointer_instruction,
                initialize_mint_instruction,
                metadata_instruction,
            ],
            Some(&self.payer.pubkey()),
            &[&self.payer, &mint],
            recent_blockhash,
        );

        self.client
            .send_and_confirm_transaction(&transaction)
            .await
            .context("Failed to create NFT mint account")?;
        Ok(mint)
    }
}

#[async_trait]
impl Minter for NftMinter {
    async fn mint_one(&self, spec: &NftSpec, owner: &Pubkey) -> Result<String> {
        let mint = self.create_nft_mint(spec).await?;

        let token_account = get_or_create_associated_token_account(
            &self.client,
            owner,
            &self.payer,
            &mint.pubkey(),
        )
        .await?;

        let recent_blockhash = self.client.get_latest_blockhash().await?;
        let mint_to_instruction = mint_to(
            &token_2022_program_id(),
            &mint.pubkey(),
            &token_account,
            &self.payer.pubkey(),
            &[&self.payer.pubkey()],
            1,
        )?;

        let transaction = Transaction::new_signed_with_payer(
            &[mint_to_instruction],
            Some(&self.payer.pubkey()),
            &[&self.payer],
            recent_blockhash,
        );

        self.client
            .send_and_confirm_transaction(&transaction)
            .await
            .context("Failed to mint NFT to owner")?;

        Ok(mint.pubkey().to_string())
    }
}

pub async fn get_or_create_associated_token_account(
    client: &RpcClient,
    wallet: &Pubkey,
    fee_payer: &Keypair,
    mint_pubkey: &Pubkey,
) -> Result<Pubkey> {
    let associated_token_address =
        get_associated_token_address_with_program_id(wallet, mint_pubkey, &token_2022_program_id());

    // Already exists, nothing to do.
    if client.get_account(&associated_token_address).await.is_ok() {
        return Ok(associated_token_address);
    }

    let recent_blockhash = client.get_latest_blockhash().await?;
    let create_ata_instruction = create_associated_token_account(
        &fee_payer.pubkey(),
        wallet,
        mint_pubkey,
        &token_2022_program_id(),
    );

    let transaction = Transaction::new_signed_with_payer(
        &[create_ata_instruction],
        Some(&fee_payer.pubkey()),
        &[fee_payer],
        recent_blockhash,
    );

    client.send_and_confirm_transaction(&transaction).await?;

    Ok(associated_token_address)
}

pub fn connect_rpc(rpc_url: &str) -> RpcClient {
    RpcClient::new(rpc_url.to_string())
}

/// Generate a wallet and fund it with one airdropped SOL. Devnet/test
/// only.
pub async fn generate_funded_wallet(client: &RpcClient) -> Result<Keypair> {
    let wallet = Keypair::new();

    let airdrop_signature = client
        .request_airdrop(&wallet.pubkey(), LAMPORTS_PER_SOL)
        .await?;

    loop {
        let confirmed = client.confirm_transaction(&airdrop_signature).await?;
        if confirmed {
            break;
        }
    }

    Ok(wallet)
}
