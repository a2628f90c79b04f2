use solana_sdk::native_token::LAMPORTS_PER_SOL;

/// Canonical message a wallet signs to authenticate a like toggle. The
/// server verifies the ed25519 signature of exactly this string.
pub fn like_message(action: &str, target_type: &str, target_id: i64) -> String {
    format!("like:{}:{}:{}", action, target_type, target_id)
}

pub fn sol_to_lamports(sol: f64) -> i64 {
    (sol * LAMPORTS_PER_SOL as f64).round() as i64
}

pub fn lamports_to_sol(lamports: i64) -> f64 {
    lamports as f64 / LAMPORTS_PER_SOL as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sol_lamport_conversions() {
        assert_eq!(sol_to_lamports(1.0), 1_000_000_000);
        assert_eq!(sol_to_lamports(0.01), 10_000_000);
        assert_eq!(lamports_to_sol(1_500_000_000), 1.5);
    }

    #[test]
    fn like_message_is_stable() {
        assert_eq!(like_message("like", "nft", 42), "like:nft:42");
    }
}
