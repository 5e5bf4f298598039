//! Deciding what happens to the claimed rewards

use crate::error::{HarvesterError, HarvesterResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

const PROMPT: &str = "How to proceed with the claimed FLOCK?\n\
(a) Exchange for gmFLOCK and delegate\n\
(b) Sell for ETH\n\
(c) Stop\n\
Your choice: ";

/// What to do with the collected FLOCK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Procedure {
    /// Exchange for gmFLOCK and delegate it
    Delegate,
    /// Swap for WETH and unwrap to ETH
    Sell,
    Stop,
}

impl Procedure {
    /// Interpret an interactive answer; anything unrecognised stops.
    pub fn from_choice(input: &str) -> Self {
        match input.trim().to_lowercase().as_str() {
            "a" => Procedure::Delegate,
            "b" => Procedure::Sell,
            _ => Procedure::Stop,
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Delegate => write!(f, "exchange and delegate"),
            Procedure::Sell => write!(f, "sell"),
            Procedure::Stop => write!(f, "stop"),
        }
    }
}

/// Asset the FLOCK rate is measured in when deciding by threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteAsset {
    Weth,
    Usdc,
    Eurc,
}

/// An explicit choice wins. Without a rate there is nothing to decide on, so
/// the run stops; otherwise a rate at or above `threshold` sells.
pub fn choose_procedure(rate: Option<f64>, threshold: f64, explicit: Option<Procedure>) -> Procedure {
    if let Some(procedure) = explicit {
        return procedure;
    }

    match rate {
        None => Procedure::Stop,
        Some(rate) if rate >= threshold => Procedure::Sell,
        Some(_) => Procedure::Delegate,
    }
}

/// Ask the operator on the terminal
pub async fn prompt_procedure() -> HarvesterResult<Procedure> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    read_procedure(&mut stdin, &mut stdout).await
}

async fn read_procedure<R, W>(reader: &mut R, writer: &mut W) -> HarvesterResult<Procedure>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(PROMPT.as_bytes())
        .await
        .map_err(|e| HarvesterError::Internal(format!("Failed to write prompt: {}", e)))?;
    writer
        .flush()
        .await
        .map_err(|e| HarvesterError::Internal(format!("Failed to write prompt: {}", e)))?;

    let mut line = String::new();
    reader
        .read_line(&mut line)
        .await
        .map_err(|e| HarvesterError::Internal(format!("Failed to read choice: {}", e)))?;

    Ok(Procedure::from_choice(&line))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    #[test]
    fn explicit_choice_wins() {
        assert_eq!(choose_procedure(None, 1.0, Some(Procedure::Sell)), Procedure::Sell);
        assert_eq!(
            choose_procedure(Some(10.0), 1.0, Some(Procedure::Delegate)),
            Procedure::Delegate
        );
    }

    #[test]
    fn threshold_decides_without_explicit_choice() {
        assert_eq!(choose_procedure(None, 0.2, None), Procedure::Stop);
        assert_eq!(choose_procedure(Some(0.25), 0.2, None), Procedure::Sell);
        assert_eq!(choose_procedure(Some(0.2), 0.2, None), Procedure::Sell);
        assert_eq!(choose_procedure(Some(0.19), 0.2, None), Procedure::Delegate);
    }

    #[test]
    fn choices_parse_leniently() {
        assert_eq!(Procedure::from_choice("a"), Procedure::Delegate);
        assert_eq!(Procedure::from_choice(" B \n"), Procedure::Sell);
        assert_eq!(Procedure::from_choice("c"), Procedure::Stop);
        assert_eq!(Procedure::from_choice("sell"), Procedure::Stop);
        assert_eq!(Procedure::from_choice(""), Procedure::Stop);
    }

    #[tokio::test]
    async fn prompt_reads_one_line() {
        let mut writer = Builder::new().write(PROMPT.as_bytes()).build();
        let mut reader = BufReader::new(Builder::new().read(b"b\n").build());

        let procedure = read_procedure(&mut reader, &mut writer).await.unwrap();
        assert_eq!(procedure, Procedure::Sell);
    }

    #[tokio::test]
    async fn unknown_answer_stops() {
        let mut writer = Builder::new().write(PROMPT.as_bytes()).build();
        let mut reader = BufReader::new(Builder::new().read(b"maybe\n").build());

        let procedure = read_procedure(&mut reader, &mut writer).await.unwrap();
        assert_eq!(procedure, Procedure::Stop);
    }
}
