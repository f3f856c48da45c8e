//! Chunked, single-transaction bulk writes
//!
//! Every chunk of one call goes through the same transaction on one
//! connection: either all chunks commit together or none of them do.

use super::cancel::CancelToken;
use super::chunk::{chunk_count, chunks, effective_batch_size, ChunkSpan};
use super::copy::{copy_rows, CopyRecord};
use crate::models::{self, Entity};
use crate::{Error, Result, Stage};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgConnection;
use sqlx::PgPool;
use std::time::Instant;

/// Which kind of chunked write is running; decides the per-chunk [`Stage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Insert,
    Update,
}

impl WriteKind {
    pub fn stage(self, span: ChunkSpan) -> Stage {
        match self {
            WriteKind::Insert => Stage::ChunkInsert {
                chunk: span.index,
                offset: span.offset,
            },
            WriteKind::Update => Stage::ChunkUpdate {
                chunk: span.index,
                offset: span.offset,
            },
        }
    }

    fn label(self) -> &'static str {
        match self {
            WriteKind::Insert => "insert",
            WriteKind::Update => "update",
        }
    }
}

/// Writes one chunk inside an already open transaction.
#[async_trait]
pub trait ChunkWriter<E: Entity>: Send + Sync {
    async fn write_chunk(&self, conn: &mut PgConnection, chunk: &[E], stage: Stage)
        -> Result<u64>;
}

/// Inserts a chunk with `COPY ... FROM STDIN`.
pub struct CopyInsert;

#[async_trait]
impl<E> ChunkWriter<E> for CopyInsert
where
    E: Entity + CopyRecord,
{
    async fn write_chunk(
        &self,
        conn: &mut PgConnection,
        chunk: &[E],
        stage: Stage,
    ) -> Result<u64> {
        copy_rows(conn, chunk, stage).await
    }
}

/// Assign missing identifiers and stamp one shared `created_at` on the whole batch.
pub fn prepare_insert<E: Entity>(items: &mut [E]) -> DateTime<Utc> {
    let now = models::now();
    for item in items.iter_mut() {
        item.assign_id();
        item.stamp_created(now);
    }
    now
}

/// A row about to be updated must have an identifier and a complete update audit pair.
pub fn check_update_target<E: Entity>(item: &E) -> Result<()> {
    if !item.has_id() {
        return Err(Error::InvalidInput(format!(
            "{} update requires an identifier",
            E::KIND
        )));
    }
    match item.audit_pair() {
        (Some(_), Some(_)) => Ok(()),
        _ => Err(Error::InvalidInput(format!(
            "{} {} must carry both updated_by and updated_at",
            E::KIND,
            item.id()
        ))),
    }
}

/// Check a batch for update and sort it ascending by identifier.
///
/// Every concurrent bulk update then takes row locks in the same order.
pub fn prepare_update<E: Entity>(items: &mut [E]) -> Result<()> {
    for (position, item) in items.iter().enumerate() {
        check_update_target(item).map_err(|err| match err {
            Error::InvalidInput(msg) => Error::InvalidInput(format!("item {position}: {msg}")),
            other => other,
        })?;
    }

    items.sort_by_key(|item| item.id());

    if let Some(pair) = items.windows(2).find(|pair| pair[0].id() == pair[1].id()) {
        return Err(Error::InvalidInput(format!(
            "duplicate {} identifier {} in bulk update",
            E::KIND,
            pair[0].id()
        )));
    }

    Ok(())
}

/// Run `writer` over `items` chunk by chunk inside one transaction.
///
/// Any chunk failure or cancellation rolls the transaction back before
/// returning; no partial total is ever reported.
pub async fn write_in_chunks<E, W>(
    pool: &PgPool,
    writer: &W,
    items: &[E],
    batch_size: usize,
    kind: WriteKind,
    cancel: &CancelToken,
) -> Result<u64>
where
    E: Entity,
    W: ChunkWriter<E>,
{
    if items.is_empty() {
        return Ok(0);
    }

    let started = Instant::now();
    let batch_size = effective_batch_size(batch_size);
    let chunk_total = chunk_count(items.len(), batch_size);

    let mut tx = cancel
        .guard(Stage::BeginTransaction, async {
            pool.begin()
                .await
                .map_err(|e| Error::store(Stage::BeginTransaction, e))
        })
        .await?;

    let mut total = 0u64;
    for (span, chunk) in chunks(items, batch_size) {
        let stage = kind.stage(span);
        let written = cancel
            .guard(stage, writer.write_chunk(&mut *tx, chunk, stage))
            .await;
        match written {
            Ok(rows) => {
                total += rows;
                tracing::debug!(
                    entity = E::KIND,
                    operation = kind.label(),
                    chunk = span.index,
                    chunks = chunk_total,
                    rows,
                    "Bulk chunk written"
                );
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        entity = E::KIND,
                        error = %rollback_err,
                        "Bulk write rollback failed; the connection drops the transaction"
                    );
                }
                tracing::warn!(
                    entity = E::KIND,
                    operation = kind.label(),
                    chunk = span.index,
                    offset = span.offset,
                    error = %err,
                    "Bulk write rolled back"
                );
                return Err(err);
            }
        }
    }

    // A commit cannot be abandoned half way, so cancellation is checked before it starts.
    if cancel.is_cancelled() {
        if let Err(rollback_err) = tx.rollback().await {
            tracing::warn!(
                entity = E::KIND,
                error = %rollback_err,
                "Bulk write rollback failed after cancellation"
            );
        }
        return Err(Error::Cancelled {
            stage: Stage::Commit,
        });
    }
    tx.commit()
        .await
        .map_err(|e| Error::store(Stage::Commit, e))?;

    tracing::info!(
        entity = E::KIND,
        operation = kind.label(),
        items = items.len(),
        chunks = chunk_total,
        rows = total,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Bulk write committed"
    );

    Ok(total)
}
