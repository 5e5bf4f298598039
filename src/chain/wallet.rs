//! Wallet construction from a secret recovery phrase

use crate::error::{HarvesterError, HarvesterResult};

use ethers::signers::coins_bip39::English;
use ethers::signers::{LocalWallet, MnemonicBuilder};

/// Derive the first account (`m/44'/60'/0'/0/0`) of a BIP-39 mnemonic
pub fn wallet_from_mnemonic(phrase: &str) -> HarvesterResult<LocalWallet> {
    let words = phrase.split_whitespace().collect::<Vec<_>>().join(" ");
    MnemonicBuilder::<English>::default()
        .phrase(words.as_str())
        .build()
        .map_err(|e| HarvesterError::Wallet(format!("Invalid mnemonic: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::signers::Signer;
    use ethers::types::Address;

    #[test]
    fn derives_default_account() {
        let wallet = wallet_from_mnemonic(
            "  test test test test test test test test test test test junk\n",
        )
        .unwrap();
        let expected: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(wallet.address(), expected);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            wallet_from_mnemonic("not a real phrase"),
            Err(HarvesterError::Wallet(_))
        ));
    }
}
