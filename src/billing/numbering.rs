use crate::error::AppResult;

/// key: billing-numbering -> atomic per-year invoice sequence
///
/// Both the single-contract and consolidated paths share the format
/// `INV-<year>-<6-digit sequence>`. The sequence row is claimed with a single
/// upsert, so concurrent generations in the same year are handed distinct
/// values; the unique constraint on `invoices.invoice_number` remains the
/// final guard and surfaces any residual collision as a conflict.
pub async fn next_invoice_number<'e, E>(executor: E, year: i32) -> AppResult<String>
where
    E: sqlx::Executor<'e, Database = sqlx::Postgres>,
{
    let sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO invoice_sequences (year, next_value) VALUES ($1, 1)
        ON CONFLICT (year)
        DO UPDATE SET next_value = invoice_sequences.next_value + 1
        RETURNING next_value
        "#,
    )
    .bind(year)
    .fetch_one(executor)
    .await?;

    Ok(format!("INV-{year}-{sequence:06}"))
}
