use crate::catalog::InMemoryCatalog;
use crate::config::EngineConfig;
use crate::csv_io::{stream_ops, write_balances};
use crate::engine::FundingEngine;
use crate::models::{FundingPolicy, HackathonMeta, OpKind, OpRow, ProjectMeta};
use anyhow::{Context, Result};
use futures::StreamExt;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs::File;
use tokio::io::BufReader;

fn field<T>(value: Option<T>, name: &str) -> Result<T> {
    value.with_context(|| format!("missing {} column", name))
}

/// Apply one op row against the engine. Catalog ops (hackathon, project) go
/// to the in-memory catalog; everything else hits the engine directly.
pub async fn apply_op(
    engine: &FundingEngine,
    catalog: &InMemoryCatalog,
    row: OpRow,
) -> Result<()> {
    match row.op {
        OpKind::Create => {
            let account = field(row.account, "account")?;
            engine
                .create_account(&account, row.amount.unwrap_or(Decimal::ZERO))
                .await?;
        }
        OpKind::Credit => {
            let account = field(row.account, "account")?;
            let amount = field(row.amount, "amount")?;
            engine.credit(&account, amount).await?;
        }
        OpKind::Debit => {
            let account = field(row.account, "account")?;
            let amount = field(row.amount, "amount")?;
            engine.debit(&account, amount).await?;
        }
        OpKind::Hackathon => {
            let id = field(row.hackathon, "hackathon")?;
            let pool_account = field(row.account, "account")?;
            let amount = field(row.amount, "amount")?;
            catalog
                .register_hackathon(HackathonMeta {
                    id,
                    pool_account,
                    funding: FundingPolicy::FixedPerProject(amount),
                })
                .await;
        }
        OpKind::Project => {
            let id = field(row.project, "project")?;
            let hackathon = field(row.hackathon, "hackathon")?;
            let contributor_account = field(row.contributor, "contributor")?;
            let maintainer_account = field(row.maintainer, "maintainer")?;
            catalog
                .register_project(ProjectMeta {
                    id,
                    hackathon,
                    contributor_account,
                    maintainer_account,
                    created_at: SystemTime::now(),
                })
                .await;
        }
        OpKind::Vote => {
            let project = field(row.project, "project")?;
            let voter = field(row.voter, "voter")?;
            let role = field(row.role, "role")?;
            let kind = field(row.vote, "vote")?;
            engine.cast_vote(&project, &voter, role, kind).await?;
        }
        OpKind::Compute => {
            let hackathon = field(row.hackathon, "hackathon")?;
            engine.compute_results(&hackathon).await?;
        }
        OpKind::Settle => {
            let hackathon = field(row.hackathon, "hackathon")?;
            let project = field(row.project, "project")?;
            engine.settle(&hackathon, &project).await?;
        }
    }

    Ok(())
}

pub async fn run(input_path: PathBuf, config: EngineConfig) -> Result<()> {
    // Clean up all old temp journals from previous runs as they persist across runs
    let temp_dir = PathBuf::from("/tmp");
    if let Ok(mut entries) = tokio::fs::read_dir(&temp_dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with("funding-engine-cli-") && name.ends_with(".journal") {
                    let _ = tokio::fs::remove_file(entry.path()).await;
                }
            }
        }
    }

    // Unique temporary journal to avoid race conditions between runs
    let temp_journal = PathBuf::from(format!(
        "/tmp/funding-engine-cli-{}.journal",
        std::process::id()
    ));

    let catalog = Arc::new(InMemoryCatalog::new());
    let engine = FundingEngine::new(config, catalog.clone(), temp_journal.clone()).await?;

    // Open and process input file
    let file = File::open(&input_path).await?;
    let reader = BufReader::new(file);
    let mut stream = stream_ops(reader);

    while let Some(result) = stream.next().await {
        match result {
            Ok(row) => {
                // Op failures (insufficient funds, unapproved settle, ...)
                // don't abort the run
                let _ = apply_op(&engine, &catalog, row).await;
            }
            Err(_) => {
                // Ignore parse errors
            }
        }
    }

    let mut balances = engine.all_balances().await;
    balances.sort_by(|a, b| a.0.cmp(&b.0));

    write_balances(tokio::io::stdout(), balances).await?;

    let _ = tokio::fs::remove_file(&temp_journal).await;

    Ok(())
}
