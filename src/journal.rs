use crate::models::AccountId;
use anyhow::Result;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;

/// A successful balance-changing operation, as recorded on disk.
#[derive(Debug, Clone)]
pub enum JournalOp {
    Create {
        account: AccountId,
        initial: Decimal,
    },
    Credit {
        account: AccountId,
        amount: Decimal,
        reference: Option<String>,
    },
    Debit {
        account: AccountId,
        amount: Decimal,
        reference: Option<String>,
    },
}

/// Append-only op journal using CSV lines. Only operations that succeeded
/// are written, so replay never has to re-validate them.
pub struct Journal {
    path: PathBuf,
    writer: Mutex<File>,
}

impl Journal {
    pub async fn new(path: PathBuf) -> Result<Self> {
        // Create file if doesn't exist, append if exists
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    /// Append one op to the journal.
    pub async fn append(&self, op: &JournalOp) -> Result<()> {
        let mut writer = self.writer.lock().await;

        let line = match op {
            JournalOp::Create { account, initial } => {
                format!("create,{},{},\n", account, initial)
            }
            JournalOp::Credit {
                account,
                amount,
                reference,
            } => format!(
                "credit,{},{},{}\n",
                account,
                amount,
                reference.as_deref().unwrap_or_default()
            ),
            JournalOp::Debit {
                account,
                amount,
                reference,
            } => format!(
                "debit,{},{},{}\n",
                account,
                amount,
                reference.as_deref().unwrap_or_default()
            ),
        };

        // TODO: add batched flushes for performance
        writer.write_all(line.as_bytes()).await?;

        Ok(())
    }

    /// Replay all ops from the journal, skipping unparseable lines.
    pub async fn replay(&self) -> Result<Vec<JournalOp>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        let mut ops = Vec::new();

        while let Some(line) = lines.next_line().await? {
            if let Ok(op) = parse_journal_line(&line) {
                ops.push(op);
            }
        }

        Ok(ops)
    }
}

fn parse_journal_line(line: &str) -> Result<JournalOp> {
    let parts: Vec<&str> = line.split(',').map(|s| s.trim()).collect();

    if parts.len() < 3 {
        anyhow::bail!("Invalid journal line");
    }

    let account = parts[1].to_string();
    let amount: Decimal = parts[2].parse()?;
    let reference = if parts.len() > 3 && !parts[3].is_empty() {
        Some(parts[3].to_string())
    } else {
        None
    };

    match parts[0] {
        "create" => Ok(JournalOp::Create {
            account,
            initial: amount,
        }),
        "credit" => Ok(JournalOp::Credit {
            account,
            amount,
            reference,
        }),
        "debit" => Ok(JournalOp::Debit {
            account,
            amount,
            reference,
        }),
        other => anyhow::bail!("Unknown journal op: {}", other),
    }
}
