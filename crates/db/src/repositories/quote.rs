use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, Transaction};
use tracing::debug;

use lynco_core::audit::{ActorType, QuoteEvent, QuoteEventType};
use lynco_core::domain::acceptance::CustomerAcceptance;
use lynco_core::domain::approval::{ApprovalDecision, Decision};
use lynco_core::domain::quote::{LineItem, Quote, QuoteId, QuoteStatus, QuoteSummary};
use lynco_core::flows::{StatusGuard, TimestampField};
use lynco_core::store::{
    AuditRecord, NewQuoteRecord, QuoteLookup, QuoteStore, StoreError, TransitionWrite,
    WriteOutcome,
};

use super::RepositoryError;
use crate::DbPool;

const QUOTE_COLUMNS: &str = "id, customer_company, customer_name, customer_email, currency,
    valid_until, subtotal_cents, discount_cents, tax_cents, total_cents, status,
    approval_token, customer_view_token, created_at, updated_at, decided_at,
    customer_approved_at, sent_at";

const VALID_UNTIL_FORMAT: &str = "%Y-%m-%d";

/// SQLite-backed [`QuoteStore`]. Transitions run as one transaction each.
pub struct SqlQuoteStore {
    pool: DbPool,
}

impl SqlQuoteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: NewQuoteRecord) -> Result<(), RepositoryError> {
        let NewQuoteRecord { quote, items, event } = record;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO quotes (
                id, customer_company, customer_name, customer_email, currency, valid_until,
                subtotal_cents, discount_cents, tax_cents, total_cents, status,
                approval_token, customer_view_token, created_at, updated_at, decided_at,
                customer_approved_at, sent_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(quote.id.as_str())
        .bind(&quote.customer_company)
        .bind(&quote.customer_name)
        .bind(&quote.customer_email)
        .bind(&quote.currency)
        .bind(quote.valid_until.map(|date| date.format(VALID_UNTIL_FORMAT).to_string()))
        .bind(quote.subtotal_cents)
        .bind(quote.discount_cents)
        .bind(quote.tax_cents)
        .bind(quote.total_cents)
        .bind(quote.status.as_str())
        .bind(&quote.approval_token)
        .bind(&quote.customer_view_token)
        .bind(encode_timestamp(&quote.created_at))
        .bind(encode_timestamp(&quote.updated_at))
        .bind(quote.decided_at.as_ref().map(encode_timestamp))
        .bind(quote.customer_approved_at.as_ref().map(encode_timestamp))
        .bind(quote.sent_at.as_ref().map(encode_timestamp))
        .execute(&mut *tx)
        .await?;

        for item in &items {
            sqlx::query(
                "INSERT INTO quote_line_items (
                    id, quote_id, description, quantity, unit_price_cents,
                    discount_percent, line_total_cents, sort_order
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&item.id)
            .bind(item.quote_id.as_str())
            .bind(&item.description)
            .bind(item.quantity.to_string())
            .bind(item.unit_price_cents)
            .bind(item.discount_percent.to_string())
            .bind(item.line_total_cents)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await?;
        }

        insert_event(&mut tx, &event).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn transition(&self, write: TransitionWrite) -> Result<WriteOutcome, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let (guard_sql, guard_values) = guard_clause(&write.guard);
        let stamp_sql = write
            .stamp
            .map(|field| format!(", {} = ?", field.column()))
            .unwrap_or_default();
        let sql =
            format!("UPDATE quotes SET status = ?, updated_at = ?{stamp_sql} WHERE id = ? AND {guard_sql}");

        let at = encode_timestamp(&write.at);
        let mut update = sqlx::query(&sql).bind(write.to.as_str()).bind(&at);
        if write.stamp.is_some() {
            update = update.bind(&at);
        }
        update = update.bind(write.quote_id.as_str());
        for status in guard_values {
            update = update.bind(status.as_str());
        }

        let updated = update.execute(&mut *tx).await?.rows_affected();
        if updated == 0 {
            let current = sqlx::query("SELECT status FROM quotes WHERE id = ?")
                .bind(write.quote_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
            tx.rollback().await?;

            debug!(
                event_name = "db.quote.guard_miss",
                quote_id = %write.quote_id,
                target = %write.to,
                "conditional status update matched no row"
            );
            return match current {
                None => Ok(WriteOutcome::NotFound),
                Some(row) => {
                    Ok(WriteOutcome::GuardRejected { current: parse_status(&row, "status")? })
                }
            };
        }

        match &write.record {
            Some(AuditRecord::Approval(record)) => insert_approval(&mut tx, record).await?,
            Some(AuditRecord::Acceptance(record)) => insert_acceptance(&mut tx, record).await?,
            None => {}
        }
        insert_event(&mut tx, &write.event).await?;
        tx.commit().await?;

        Ok(WriteOutcome::Applied)
    }
}

#[async_trait]
impl QuoteStore for SqlQuoteStore {
    async fn insert_quote(&self, record: NewQuoteRecord) -> Result<(), StoreError> {
        if record.quote.approval_token == record.quote.customer_view_token {
            return Err(StoreError::Constraint("quote tokens must differ".to_string()));
        }
        Ok(self.insert(record).await?)
    }

    async fn list_quotes(&self, limit: u32) -> Result<Vec<QuoteSummary>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {QUOTE_COLUMNS} FROM quotes ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        let quotes = rows.iter().map(quote_from_row).collect::<Result<Vec<_>, _>>()?;
        Ok(quotes.iter().map(Quote::summary).collect())
    }

    async fn find_quote(&self, lookup: QuoteLookup<'_>) -> Result<Option<Quote>, StoreError> {
        let (column, key) = match lookup {
            QuoteLookup::Id(id) => ("id", id.as_str()),
            QuoteLookup::ApprovalToken(token) => ("approval_token", token),
            QuoteLookup::CustomerViewToken(token) => ("customer_view_token", token),
        };

        let row = sqlx::query(&format!("SELECT {QUOTE_COLUMNS} FROM quotes WHERE {column} = ?"))
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::from)?;

        Ok(row.as_ref().map(quote_from_row).transpose()?)
    }

    async fn line_items(&self, quote_id: &QuoteId) -> Result<Vec<LineItem>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, quote_id, description, quantity, unit_price_cents,
                    discount_percent, line_total_cents, sort_order
             FROM quote_line_items
             WHERE quote_id = ?
             ORDER BY sort_order ASC, rowid ASC",
        )
        .bind(quote_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(line_item_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn recent_events(
        &self,
        quote_id: &QuoteId,
        limit: u32,
    ) -> Result<Vec<QuoteEvent>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, quote_id, type, actor_type, actor_name, actor_email,
                    metadata_json, created_at
             FROM quote_events
             WHERE quote_id = ?
             ORDER BY created_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(quote_id.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(event_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn approval_records(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<ApprovalDecision>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, quote_id, decision, comment, actor_name, actor_email, created_at
             FROM quote_approvals
             WHERE quote_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(quote_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(approval_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn acceptance_records(
        &self,
        quote_id: &QuoteId,
    ) -> Result<Vec<CustomerAcceptance>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, quote_id, signer_name, signer_company, po_number, comment,
                    ip, user_agent, created_at
             FROM customer_acceptances
             WHERE quote_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(quote_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(rows.iter().map(acceptance_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn apply_transition(&self, write: TransitionWrite) -> Result<WriteOutcome, StoreError> {
        Ok(self.transition(write).await?)
    }
}

/// SQL predicate for the guard plus the statuses to bind, in order.
fn guard_clause(guard: &StatusGuard) -> (String, Vec<QuoteStatus>) {
    let placeholders = |count: usize| vec!["?"; count].join(", ");
    match guard {
        StatusGuard::Exactly(status) => ("status = ?".to_string(), vec![*status]),
        StatusGuard::AnyOf(allowed) if allowed.is_empty() => ("0".to_string(), Vec::new()),
        StatusGuard::AnyOf(allowed) => {
            (format!("status IN ({})", placeholders(allowed.len())), allowed.clone())
        }
        StatusGuard::NoneOf(excluded) if excluded.is_empty() => ("1".to_string(), Vec::new()),
        StatusGuard::NoneOf(excluded) => {
            (format!("status NOT IN ({})", placeholders(excluded.len())), excluded.clone())
        }
    }
}

async fn insert_event(
    tx: &mut Transaction<'_, Sqlite>,
    event: &QuoteEvent,
) -> Result<(), RepositoryError> {
    let metadata = serde_json::to_string(&event.metadata)
        .map_err(|error| RepositoryError::Decode(format!("event metadata: {error}")))?;

    sqlx::query(
        "INSERT INTO quote_events (
            id, quote_id, type, actor_type, actor_name, actor_email, metadata_json, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.id)
    .bind(event.quote_id.as_str())
    .bind(event.event_type.as_str())
    .bind(event.actor_type.as_str())
    .bind(&event.actor_name)
    .bind(&event.actor_email)
    .bind(metadata)
    .bind(encode_timestamp(&event.created_at))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_approval(
    tx: &mut Transaction<'_, Sqlite>,
    record: &ApprovalDecision,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO quote_approvals (
            id, quote_id, decision, comment, actor_name, actor_email, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(record.quote_id.as_str())
    .bind(record.decision.as_str())
    .bind(&record.comment)
    .bind(&record.actor_name)
    .bind(&record.actor_email)
    .bind(encode_timestamp(&record.created_at))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

async fn insert_acceptance(
    tx: &mut Transaction<'_, Sqlite>,
    record: &CustomerAcceptance,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO customer_acceptances (
            id, quote_id, signer_name, signer_company, po_number, comment,
            ip, user_agent, created_at
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&record.id)
    .bind(record.quote_id.as_str())
    .bind(&record.signer_name)
    .bind(&record.signer_company)
    .bind(&record.po_number)
    .bind(&record.comment)
    .bind(&record.ip)
    .bind(&record.user_agent)
    .bind(encode_timestamp(&record.created_at))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

fn quote_from_row(row: &SqliteRow) -> Result<Quote, RepositoryError> {
    let valid_until = row
        .try_get::<Option<String>, _>("valid_until")?
        .map(|value| {
            NaiveDate::parse_from_str(&value, VALID_UNTIL_FORMAT).map_err(|error| {
                RepositoryError::Decode(format!("invalid date in `valid_until`: `{value}` ({error})"))
            })
        })
        .transpose()?;

    Ok(Quote {
        id: QuoteId(row.try_get("id")?),
        customer_company: row.try_get("customer_company")?,
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        currency: row.try_get("currency")?,
        valid_until,
        subtotal_cents: row.try_get("subtotal_cents")?,
        discount_cents: row.try_get("discount_cents")?,
        tax_cents: row.try_get("tax_cents")?,
        total_cents: row.try_get("total_cents")?,
        status: parse_status(row, "status")?,
        approval_token: row.try_get("approval_token")?,
        customer_view_token: row.try_get("customer_view_token")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
        updated_at: parse_timestamp("updated_at", row.try_get("updated_at")?)?,
        decided_at: parse_optional_timestamp("decided_at", row.try_get("decided_at")?)?,
        customer_approved_at: parse_optional_timestamp(
            "customer_approved_at",
            row.try_get("customer_approved_at")?,
        )?,
        sent_at: parse_optional_timestamp("sent_at", row.try_get("sent_at")?)?,
    })
}

fn line_item_from_row(row: &SqliteRow) -> Result<LineItem, RepositoryError> {
    Ok(LineItem {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        description: row.try_get("description")?,
        quantity: parse_decimal("quantity", row.try_get("quantity")?)?,
        unit_price_cents: row.try_get("unit_price_cents")?,
        discount_percent: parse_decimal("discount_percent", row.try_get("discount_percent")?)?,
        line_total_cents: row.try_get("line_total_cents")?,
        sort_order: row.try_get("sort_order")?,
    })
}

fn event_from_row(row: &SqliteRow) -> Result<QuoteEvent, RepositoryError> {
    let type_raw = row.try_get::<String, _>("type")?;
    let event_type = QuoteEventType::parse(&type_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown event type `{type_raw}`")))?;
    let actor_raw = row.try_get::<String, _>("actor_type")?;
    let actor_type = ActorType::parse(&actor_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown actor type `{actor_raw}`")))?;
    let metadata_raw = row.try_get::<String, _>("metadata_json")?;
    let metadata = serde_json::from_str::<Map<String, Value>>(&metadata_raw)
        .map_err(|error| RepositoryError::Decode(format!("invalid event metadata: {error}")))?;

    Ok(QuoteEvent {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        event_type,
        actor_type,
        actor_name: row.try_get("actor_name")?,
        actor_email: row.try_get("actor_email")?,
        metadata,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn approval_from_row(row: &SqliteRow) -> Result<ApprovalDecision, RepositoryError> {
    let decision = match row.try_get::<String, _>("decision")?.as_str() {
        "approved" => Decision::Approved,
        "rejected" => Decision::Rejected,
        other => return Err(RepositoryError::Decode(format!("unknown decision `{other}`"))),
    };

    Ok(ApprovalDecision {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        decision,
        comment: row.try_get("comment")?,
        actor_name: row.try_get("actor_name")?,
        actor_email: row.try_get("actor_email")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn acceptance_from_row(row: &SqliteRow) -> Result<CustomerAcceptance, RepositoryError> {
    Ok(CustomerAcceptance {
        id: row.try_get("id")?,
        quote_id: QuoteId(row.try_get("quote_id")?),
        signer_name: row.try_get("signer_name")?,
        signer_company: row.try_get("signer_company")?,
        po_number: row.try_get("po_number")?,
        comment: row.try_get("comment")?,
        ip: row.try_get("ip")?,
        user_agent: row.try_get("user_agent")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}

fn parse_status(row: &SqliteRow, column: &str) -> Result<QuoteStatus, RepositoryError> {
    let raw = row.try_get::<String, _>(column)?;
    raw.parse().map_err(|_| RepositoryError::Decode(format!("unknown quote status `{raw}`")))
}

fn parse_decimal(column: &str, value: String) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(&value).map_err(|error| {
        RepositoryError::Decode(format!("invalid decimal in `{column}`: `{value}` ({error})"))
    })
}

fn encode_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(column: &str, value: String) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(&value).map(|timestamp| timestamp.with_timezone(&Utc)).map_err(
        |error| {
            RepositoryError::Decode(format!("invalid timestamp in `{column}`: `{value}` ({error})"))
        },
    )
}

fn parse_optional_timestamp(
    column: &str,
    value: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|timestamp| parse_timestamp(column, timestamp)).transpose()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, NaiveDate, Utc};
    use rust_decimal::Decimal;

    use lynco_core::audit::{ActorType, QuoteEvent, QuoteEventType};
    use lynco_core::domain::acceptance::ClientOrigin;
    use lynco_core::domain::quote::{LineItem, Quote, QuoteId, QuoteStatus};
    use lynco_core::errors::ApplicationError;
    use lynco_core::flows::{StatusGuard, TimestampField};
    use lynco_core::lifecycle::{
        AcceptanceInput, CreateQuoteInput, DecisionInput, LifecycleSettings, LineItemInput,
        QuoteLifecycle, StatusUpdateInput,
    };
    use lynco_core::store::{
        NewQuoteRecord, QuoteLookup, QuoteStore, StoreError, TransitionWrite, WriteOutcome,
    };

    use super::{guard_clause, SqlQuoteStore};
    use crate::{connect_with_settings, migrations, DbPool};

    async fn setup() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_record(id: &str, approval: &str, customer: &str) -> NewQuoteRecord {
        let now = Utc::now();
        let quote_id = QuoteId(id.to_string());
        let quote = Quote {
            id: quote_id.clone(),
            customer_company: "Acme Corp".to_string(),
            customer_name: "Dana Reyes".to_string(),
            customer_email: "dana@acme.test".to_string(),
            currency: "USD".to_string(),
            valid_until: NaiveDate::from_ymd_opt(2026, 12, 31),
            subtotal_cents: 1800,
            discount_cents: 200,
            tax_cents: 150,
            total_cents: 1950,
            status: QuoteStatus::Draft,
            approval_token: approval.to_string(),
            customer_view_token: customer.to_string(),
            created_at: now,
            updated_at: now,
            decided_at: None,
            customer_approved_at: None,
            sent_at: None,
        };
        let line = |suffix: &str, sort_order: i32| LineItem {
            id: format!("{id}-{suffix}"),
            quote_id: quote_id.clone(),
            description: format!("Workshop {suffix}"),
            quantity: Decimal::new(15, 1),
            unit_price_cents: 600,
            discount_percent: Decimal::new(125, 1),
            line_total_cents: 900,
            sort_order,
        };
        let event = QuoteEvent::new(quote_id.clone(), QuoteEventType::Created, ActorType::System)
            .with_metadata("source", "api");

        NewQuoteRecord { quote, items: vec![line("b", 2), line("a", 1), line("c", 2)], event }
    }

    fn status_write(id: &QuoteId, guard: StatusGuard, to: QuoteStatus) -> TransitionWrite {
        TransitionWrite {
            quote_id: id.clone(),
            guard,
            to,
            stamp: (to == QuoteStatus::Sent).then_some(TimestampField::SentAt),
            at: Utc::now(),
            record: None,
            event: QuoteEvent::new(id.clone(), QuoteEventType::StatusChanged, ActorType::System),
        }
    }

    #[test]
    fn guard_clause_binds_one_placeholder_per_status() {
        let (sql, values) = guard_clause(&StatusGuard::NoneOf(vec![
            QuoteStatus::Approved,
            QuoteStatus::Rejected,
        ]));
        assert_eq!(sql, "status NOT IN (?, ?)");
        assert_eq!(values.len(), 2);

        let (sql, values) = guard_clause(&StatusGuard::AnyOf(Vec::new()));
        assert_eq!(sql, "0");
        assert!(values.is_empty());
    }

    #[tokio::test]
    async fn insert_and_find_round_trips_columns() {
        let store = SqlQuoteStore::new(setup().await);
        let record = sample_record("Q-1", "appr-1", "cust-1");
        let expected = record.quote.clone();
        store.insert_quote(record).await.expect("insert");

        let id = QuoteId("Q-1".to_string());
        let found = store.find_quote(QuoteLookup::Id(&id)).await.expect("find").expect("quote");
        assert_eq!(found.customer_company, expected.customer_company);
        assert_eq!(found.valid_until, expected.valid_until);
        assert_eq!(found.total_cents, 1950);
        assert_eq!(found.status, QuoteStatus::Draft);
        assert!(found.totals_balanced());

        let by_token = store.find_quote(QuoteLookup::CustomerViewToken("cust-1")).await;
        assert_eq!(by_token.expect("find").map(|quote| quote.id), Some(id.clone()));
        let wrong_kind = store.find_quote(QuoteLookup::CustomerViewToken("appr-1")).await;
        assert!(wrong_kind.expect("find").is_none());

        let items = store.line_items(&id).await.expect("items");
        let ids: Vec<&str> = items.iter().map(|item| item.id.as_str()).collect();
        assert_eq!(ids, vec!["Q-1-a", "Q-1-b", "Q-1-c"]);
        assert_eq!(items[0].quantity, Decimal::new(15, 1));
        assert_eq!(items[0].discount_percent, Decimal::new(125, 1));

        let events = store.recent_events(&id, 50).await.expect("events");
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata.get("source"), Some(&"api".into()));
    }

    #[tokio::test]
    async fn duplicate_tokens_violate_constraints() {
        let store = SqlQuoteStore::new(setup().await);
        store.insert_quote(sample_record("Q-1", "appr-1", "cust-1")).await.expect("insert");

        let error = store
            .insert_quote(sample_record("Q-2", "appr-1", "cust-2"))
            .await
            .expect_err("duplicate approval token");
        assert!(matches!(error, StoreError::Constraint(_)), "got {error:?}");

        let error = store
            .insert_quote(sample_record("Q-3", "same", "same"))
            .await
            .expect_err("equal tokens");
        assert!(matches!(error, StoreError::Constraint(_)));

        assert_eq!(store.list_quotes(50).await.expect("list").len(), 1);
        let orphan_items =
            store.line_items(&QuoteId("Q-2".to_string())).await.expect("items");
        assert!(orphan_items.is_empty(), "failed insert must not leave line items");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let store = SqlQuoteStore::new(setup().await);
        let base = Utc::now();
        for index in 0..3 {
            let mut record =
                sample_record(&format!("Q-{index}"), &format!("a-{index}"), &format!("c-{index}"));
            record.quote.created_at = base + Duration::seconds(index);
            store.insert_quote(record).await.expect("insert");
        }

        let listed = store.list_quotes(2).await.expect("list");
        let ids: Vec<&str> = listed.iter().map(|summary| summary.id.as_str()).collect();
        assert_eq!(ids, vec!["Q-2", "Q-1"]);
    }

    #[tokio::test]
    async fn guarded_update_reports_current_status_on_miss() {
        let store = SqlQuoteStore::new(setup().await);
        store.insert_quote(sample_record("Q-1", "appr-1", "cust-1")).await.expect("insert");
        let id = QuoteId("Q-1".to_string());

        let applied = store
            .apply_transition(status_write(
                &id,
                StatusGuard::Exactly(QuoteStatus::Draft),
                QuoteStatus::Sent,
            ))
            .await
            .expect("apply");
        assert_eq!(applied, WriteOutcome::Applied);

        let missed = store
            .apply_transition(status_write(
                &id,
                StatusGuard::Exactly(QuoteStatus::Draft),
                QuoteStatus::Cancelled,
            ))
            .await
            .expect("apply");
        assert_eq!(missed, WriteOutcome::GuardRejected { current: QuoteStatus::Sent });

        let quote = store.find_quote(QuoteLookup::Id(&id)).await.expect("find").expect("quote");
        assert_eq!(quote.status, QuoteStatus::Sent);
        assert!(quote.sent_at.is_some());
        assert!(quote.decided_at.is_none());
        assert_eq!(store.recent_events(&id, 50).await.expect("events").len(), 2);

        let unknown = QuoteId("missing".to_string());
        let outcome = store
            .apply_transition(status_write(
                &unknown,
                StatusGuard::AnyOf(vec![QuoteStatus::Draft]),
                QuoteStatus::Sent,
            ))
            .await
            .expect("apply");
        assert_eq!(outcome, WriteOutcome::NotFound);
    }

    fn create_input() -> CreateQuoteInput {
        CreateQuoteInput {
            customer_company: "Acme Corp".to_string(),
            customer_name: "Dana Reyes".to_string(),
            customer_email: "dana@acme.test".to_string(),
            currency: Some("EUR".to_string()),
            valid_until: Some("2026-11-30".to_string()),
            tax_cents: 250.0,
            line_items: vec![LineItemInput {
                description: "Implementation".to_string(),
                quantity: 3.0,
                unit_price_cents: 333.0,
                discount_percent: 10.0,
                sort_order: 0.0,
            }],
        }
    }

    #[tokio::test]
    async fn lifecycle_runs_end_to_end_over_sqlite() {
        let store = Arc::new(SqlQuoteStore::new(setup().await));
        let lifecycle = QuoteLifecycle::new(store.clone(), LifecycleSettings::default());

        let created = lifecycle.create(&create_input()).await.expect("create");
        let approval_token =
            created.approval_url.trim_start_matches("/approve/").to_string();
        let customer_token = created.customer_url.trim_start_matches("/q/").to_string();

        let detail = lifecycle.fetch_internal(&created.id).await.expect("detail");
        assert_eq!(detail.quote.subtotal_cents, 899);
        assert_eq!(detail.quote.total_cents, 1149);

        let decision = DecisionInput {
            decision: "approved".to_string(),
            name: "Priya".to_string(),
            email: None,
            comment: Some("ship it".to_string()),
        };
        let first = lifecycle.decide(&approval_token, &decision).await.expect("decide");
        assert!(first.applied);
        let replay = lifecycle.decide(&approval_token, &decision).await.expect("replay");
        assert!(!replay.applied);
        assert_eq!(replay.status, QuoteStatus::Approved);

        let acceptance = AcceptanceInput {
            signer_name: "Dana Reyes".to_string(),
            po_number: Some("PO-77".to_string()),
            ..AcceptanceInput::default()
        };
        let origin = ClientOrigin {
            ip: Some("203.0.113.9".to_string()),
            user_agent: Some("curl/8".to_string()),
        };
        let accepted =
            lifecycle.accept(&customer_token, &acceptance, origin.clone()).await.expect("accept");
        assert_eq!(accepted.status, QuoteStatus::CustomerApproved);
        let again = lifecycle.accept(&customer_token, &acceptance, origin).await.expect("again");
        assert!(!again.applied);

        let detail = lifecycle.fetch_internal(&created.id).await.expect("detail");
        assert_eq!(detail.approvals.len(), 1);
        assert_eq!(detail.acceptances.len(), 1);
        assert_eq!(detail.acceptances[0].ip.as_deref(), Some("203.0.113.9"));
        assert!(detail.quote.decided_at.is_some());
        assert!(detail.quote.customer_approved_at.is_some());
        assert_eq!(detail.events.len(), 3);
        assert_eq!(detail.events[0].event_type, QuoteEventType::CustomerAccepted);
    }

    #[tokio::test]
    async fn strict_policy_is_enforced_over_sqlite() {
        let store = Arc::new(SqlQuoteStore::new(setup().await));
        let settings = LifecycleSettings {
            policy: lynco_core::flows::StatusPolicy::Strict,
            ..LifecycleSettings::default()
        };
        let lifecycle = QuoteLifecycle::new(store, settings);
        let created = lifecycle.create(&create_input()).await.expect("create");

        let error = lifecycle
            .update_status(&created.id, &StatusUpdateInput::to("sent"))
            .await
            .expect_err("draft cannot be sent");
        assert!(matches!(error, ApplicationError::Domain(_)));

        lifecycle
            .update_status(
                &created.id,
                &StatusUpdateInput::to("pending_approval"),
            )
            .await
            .expect("submit for approval");
        let detail = lifecycle.fetch_internal(&created.id).await.expect("detail");
        assert_eq!(detail.quote.status, QuoteStatus::PendingApproval);
        assert!(detail.quote.sent_at.is_none());
    }
}
