use crate::models::{AccountId, OpRow};
use csv_async::AsyncReaderBuilder;
use futures::stream::Stream;
use rust_decimal::Decimal;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio_util::compat::TokioAsyncReadCompatExt;

/// Stream op rows from an async reader
pub fn stream_ops<R: AsyncRead + Unpin + Send + 'static>(
    reader: R,
) -> impl Stream<Item = Result<OpRow, csv_async::Error>> {
    let compat_reader = reader.compat();
    let csv_reader = AsyncReaderBuilder::new()
        .trim(csv_async::Trim::All)
        .flexible(true)
        .create_deserializer(compat_reader);

    csv_reader.into_deserialize::<OpRow>()
}

pub async fn write_balances<W: AsyncWrite + Unpin>(
    mut writer: W,
    balances: Vec<(AccountId, Decimal)>,
) -> Result<(), anyhow::Error> {
    writer.write_all(b"account,balance\n").await?;

    for (account, balance) in balances {
        let line = format!("{},{}\n", account, balance);
        writer.write_all(line.as_bytes()).await?;
    }

    writer.flush().await?;
    Ok(())
}
