//! List, clear and update handlers for stored transactions.

use crate::commands::{plural, Out};
use crate::db::Store;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{Amount, Transaction, TransactionField};
use crate::{Config, Result};
use tracing::debug;

/// Returns every transaction, ordered by date descending.
///
/// The message holds one line per transaction with its amount formatted for display. The ordering
/// compares the stored date text, so it is only chronological for dates that sort lexically.
pub async fn list(config: Config) -> Result<Out<Vec<Transaction>>> {
    let transactions = config
        .db()
        .list_transactions()
        .await
        .pub_result(ErrorType::Database)?;
    let count = transactions.len();
    let mut message = format!("Found {count} transaction{}", plural(count));
    for t in &transactions {
        message.push_str(&format!(
            "\n  {}  {}  {} {}  {}",
            t.date(),
            t.id(),
            Amount::from(t.amount()),
            t.currency(),
            t.description()
        ));
    }
    Ok(Out::new(message, transactions))
}

/// Deletes every transaction unconditionally. Returns the number of rows deleted.
pub async fn clear(config: Config) -> Result<Out<u64>> {
    let deleted = config
        .db()
        .clear_transactions()
        .await
        .pub_result(ErrorType::Database)?;
    Ok(Out::new("All transactions successfully deleted", deleted))
}

/// Sets a single field of the transaction `id`.
///
/// A `value` of `None` means the caller did not supply one:
/// - `currency` falls back to the configured default currency
/// - `account` and `memo` fall back to an empty string
/// - `category` has no fallback and is rejected
///
/// # Errors
/// - `Request` if the value is missing for `category`, or if a currency is empty.
/// - `NotFound` if there is no transaction with `id`. Nothing is written in that case.
/// - `Database` if the update itself fails.
pub async fn update(
    config: Config,
    id: &str,
    field: TransactionField,
    value: Option<&str>,
) -> Result<Out<Transaction>> {
    let value = match (field, value) {
        (TransactionField::Currency, Some(v)) if v.trim().is_empty() => {
            return Err(Error::msg(ErrorType::Request, "Currency cannot be empty"))
        }
        (TransactionField::Currency, Some(v)) => v.trim().to_string(),
        (TransactionField::Currency, None) => config.default_currency().to_string(),
        (TransactionField::Category, Some(v)) => v.to_string(),
        (TransactionField::Category, None) => {
            return Err(Error::msg(
                ErrorType::Request,
                format!("Missing '{}' in request", field.body_key()),
            ))
        }
        (TransactionField::Account | TransactionField::Memo, v) => {
            v.unwrap_or_default().to_string()
        }
    };

    let affected = config
        .db()
        .update_field(id, field, &value)
        .await
        .pub_result(ErrorType::Database)?;
    if affected == 0 {
        return Err(Error::msg(ErrorType::NotFound, "Transaction not found"));
    }
    debug!("Set {field} of transaction '{id}' to '{value}'");

    let transaction = config
        .db()
        .get_transaction(id)
        .await
        .pub_result(ErrorType::Database)?
        .ok_or_else(|| Error::msg(ErrorType::NotFound, "Transaction not found"))?;
    Ok(Out::new(
        format!("{} updated successfully", capitalized(field)),
        transaction,
    ))
}

fn capitalized(field: TransactionField) -> &'static str {
    match field {
        TransactionField::Category => "Category",
        TransactionField::Currency => "Currency",
        TransactionField::Account => "Account",
        TransactionField::Memo => "Memo",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;
    use rust_decimal::Decimal;

    #[tokio::test]
    async fn test_list_empty() {
        let env = TestEnv::new().await;
        let out = list(env.config()).await.unwrap();
        assert_eq!(out.message(), "Found 0 transactions");
        assert!(out.structure().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_formats_amounts() {
        let env = TestEnv::new().await;
        env.insert_transaction("2024-01-02", "Rent", Decimal::new(-150000, 2))
            .await;
        let out = list(env.config()).await.unwrap();
        assert!(out.message().starts_with("Found 1 transaction\n"));
        assert!(out.message().contains("-1,500.00 USD  Rent"));
    }

    #[tokio::test]
    async fn test_clear() {
        let env = TestEnv::new().await;
        env.insert_transaction("2024-01-02", "A", Decimal::ONE).await;
        env.insert_transaction("2024-01-03", "B", Decimal::ONE).await;
        let out = clear(env.config()).await.unwrap();
        assert_eq!(out.structure(), Some(&2));
        assert_eq!(env.config().db().count_transactions().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_category_sets_custom_category() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-02", "Coffee", Decimal::ONE).await;
        let out = update(env.config(), &id, TransactionField::Category, Some("Treats"))
            .await
            .unwrap();
        assert_eq!(out.message(), "Category updated successfully");
        let t = out.structure().unwrap();
        assert_eq!(t.custom_category(), Some("Treats"));
        assert_eq!(t.category(), "");
    }

    #[tokio::test]
    async fn test_update_category_requires_value() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-02", "Coffee", Decimal::ONE).await;
        let err = update(env.config(), &id, TransactionField::Category, None)
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
    }

    #[tokio::test]
    async fn test_update_empty_currency_is_rejected() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-02", "Coffee", Decimal::ONE).await;
        let err = update(env.config(), &id, TransactionField::Currency, Some(""))
            .await
            .unwrap_err();
        assert_eq!(err.error_type(), ErrorType::Request);
        assert_eq!(err.to_string(), "Currency cannot be empty");

        let t = env.config().db().get_transaction(&id).await.unwrap().unwrap();
        assert_eq!(t.currency(), "USD");
    }

    #[tokio::test]
    async fn test_update_missing_currency_uses_default() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-02", "Coffee", Decimal::ONE).await;
        update(env.config(), &id, TransactionField::Currency, Some("EUR"))
            .await
            .unwrap();
        let out = update(env.config(), &id, TransactionField::Currency, None)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().currency(), "USD");
    }

    #[tokio::test]
    async fn test_update_missing_memo_is_empty() {
        let env = TestEnv::new().await;
        let id = env.insert_transaction("2024-01-02", "Coffee", Decimal::ONE).await;
        update(env.config(), &id, TransactionField::Memo, Some("note"))
            .await
            .unwrap();
        let out = update(env.config(), &id, TransactionField::Memo, None)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().memo(), Some(""));
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let env = TestEnv::new().await;
        env.insert_transaction("2024-01-02", "Coffee", Decimal::ONE).await;
        for field in [
            TransactionField::Category,
            TransactionField::Currency,
            TransactionField::Account,
            TransactionField::Memo,
        ] {
            let err = update(env.config(), "missing", field, Some("x"))
                .await
                .unwrap_err();
            assert_eq!(err.error_type(), ErrorType::NotFound);
        }
        let t = &env.config().db().list_transactions().await.unwrap()[0];
        assert_eq!(t.memo(), Some(""));
        assert_eq!(t.account(), Some(""));
    }
}
