use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The canonical shape of an imported transaction.
///
/// `amount` follows a single sign convention: money leaving the account is negative and money
/// entering it is positive. `date` is kept exactly as it was found in the source file.
#[derive(Default, Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Transaction {
    pub(crate) id: String,
    pub(crate) date: String,
    pub(crate) description: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub(crate) amount: Decimal,
    pub(crate) category: String,
    pub(crate) custom_category: Option<String>,
    pub(crate) currency: String,
    pub(crate) account: Option<String>,
    pub(crate) memo: Option<String>,
}

impl Transaction {
    /// Creates a transaction with a freshly generated id. Category, account and memo start empty.
    pub fn new(
        date: impl Into<String>,
        description: impl Into<String>,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            date: date.into(),
            description: description.into(),
            // -0 can come out of negating a zero debit
            amount: if amount.is_zero() { Decimal::ZERO } else { amount },
            category: String::new(),
            custom_category: None,
            currency: currency.into(),
            account: Some(String::new()),
            memo: Some(String::new()),
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn custom_category(&self) -> Option<&str> {
        self.custom_category.as_deref()
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn account(&self) -> Option<&str> {
        self.account.as_deref()
    }

    pub fn memo(&self) -> Option<&str> {
        self.memo.as_deref()
    }
}

/// The fields of a transaction that can be changed after import.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionField {
    /// The user's category override. Stored in `custom_category`, never in `category`.
    Category,
    Currency,
    Account,
    Memo,
}

serde_plain::derive_display_from_serialize!(TransactionField);
serde_plain::derive_fromstr_from_deserialize!(TransactionField);

impl TransactionField {
    /// The column in the `transactions` table that holds this field.
    pub(crate) fn column(&self) -> &'static str {
        match self {
            TransactionField::Category => "custom_category",
            TransactionField::Currency => "currency",
            TransactionField::Account => "account",
            TransactionField::Memo => "memo",
        }
    }

    /// The key that carries the new value in an update request body.
    pub fn body_key(&self) -> &'static str {
        self.column()
    }
}
