use crate::catalog::InMemoryCatalog;
use crate::cli::apply_op;
use crate::config::EngineConfig;
use crate::csv_io::{stream_ops, write_balances};
use crate::engine::FundingEngine;
use anyhow::Result;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

pub async fn run(bind: String, max_connections: usize, config: EngineConfig) -> Result<()> {
    tracing::info!("Server mode: binding to {}", bind);

    let catalog = Arc::new(InMemoryCatalog::new());
    let journal_path = PathBuf::from("funding-engine.journal");
    let engine = Arc::new(FundingEngine::new(config, catalog.clone(), journal_path).await?);

    // Rebuild ledger state from previous runs
    engine.rebuild_from_journal().await?;

    let listener = TcpListener::bind(&bind).await?;
    let semaphore = Arc::new(Semaphore::new(max_connections));

    tracing::info!("Listening on {}, max {} connections", bind, max_connections);

    loop {
        let permit = semaphore.clone().acquire_owned().await?;
        let (socket, addr) = listener.accept().await?;
        tracing::info!("Accepted connection from {}", addr);

        let engine = engine.clone();
        let catalog = catalog.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, engine, catalog).await {
                tracing::error!("Connection {} error: {}", addr, e);
            }
            drop(permit);
        });
    }
}

async fn handle_connection(
    socket: TcpStream,
    engine: Arc<FundingEngine>,
    catalog: Arc<InMemoryCatalog>,
) -> Result<()> {
    let (reader, writer) = socket.into_split();
    let reader = BufReader::new(reader);

    // Stream op CSV from socket
    let mut stream = stream_ops(reader);

    while let Some(result) = stream.next().await {
        match result {
            Ok(row) => {
                if let Err(e) = apply_op(&engine, &catalog, row).await {
                    tracing::warn!("Op failed: {}", e);
                }
            }
            Err(e) => {
                tracing::warn!("CSV parse error: {}", e);
            }
        }
    }

    // Read final balances and return to client
    let mut balances = engine.all_balances().await;
    balances.sort_by(|a, b| a.0.cmp(&b.0));

    let writer = BufWriter::new(writer);
    write_balances(writer, balances).await?;

    Ok(())
}
