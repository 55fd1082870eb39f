//! Stream catalog
//!
//! Static description of every stream the tap can extract: resource path,
//! keys, cursor kind, page profile and declared fields.

use super::types::{Field, FieldType as T, JsonSchema, SchemaProperty};
use crate::error::{Error, Result};
use crate::pagination::PageProfile;
use serde::{Deserialize, Serialize};

/// How a stream resumes between runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Replication {
    /// Integer row version in the `Timestamp` field, compared with `gt`
    RowVersion,
    /// Date window on the `Modified` field
    Modified,
    /// Full re-fetch every run
    None,
}

impl Replication {
    /// Field holding the cursor value
    pub fn key(self) -> Option<&'static str> {
        match self {
            Self::RowVersion => Some("Timestamp"),
            Self::Modified => Some("Modified"),
            Self::None => None,
        }
    }
}

/// Static description of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamDefinition {
    /// Stream name used in catalogs, state and output
    pub name: &'static str,
    /// Resource path below `<base>/<division>`
    pub path: &'static str,
    /// Primary key fields
    pub primary_keys: &'static [&'static str],
    /// Cursor kind
    pub replication: Replication,
    /// Page size profile
    pub profile: PageProfile,
    /// Declared fields in `$select` order
    pub fields: &'static [Field],
}

impl StreamDefinition {
    /// Comma-joined field list for `$select`
    pub fn select(&self) -> String {
        self.fields
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Declared field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Request path for one division
    pub fn partition_path(&self, division: &str) -> String {
        format!("/{division}{}", self.path)
    }

    /// Cursor field, if the stream is incremental
    pub fn replication_key(&self) -> Option<&'static str> {
        self.replication.key()
    }

    /// Nullable JSON Schema for discovery
    pub fn json_schema(&self) -> JsonSchema {
        let mut schema = JsonSchema::new();
        for field in self.fields {
            schema.add_property(field.name, SchemaProperty::for_field(field.field_type));
        }
        schema
    }
}

/// Every stream the tap knows
pub fn all_streams() -> &'static [StreamDefinition] {
    STREAMS
}

/// Look a stream up by name
pub fn find_stream(name: &str) -> Result<&'static StreamDefinition> {
    STREAMS
        .iter()
        .find(|s| s.name == name)
        .ok_or_else(|| Error::StreamNotFound {
            stream: name.to_string(),
        })
}

/// Resolve a selection; `None` or an empty list selects everything
pub fn select_streams(names: Option<&[String]>) -> Result<Vec<&'static StreamDefinition>> {
    match names {
        Some(names) if !names.is_empty() => names.iter().map(|n| find_stream(n)).collect(),
        _ => Ok(STREAMS.iter().collect()),
    }
}

static STREAMS: &[StreamDefinition] = &[
    StreamDefinition {
        name: "transaction_lines",
        path: "/sync/Financial/TransactionLines",
        primary_keys: &["ID", "Division"],
        replication: Replication::RowVersion,
        profile: PageProfile::Sync,
        fields: TRANSACTION_LINES_FIELDS,
    },
    StreamDefinition {
        name: "gl_accounts",
        path: "/sync/Financial/GLAccounts",
        primary_keys: &["ID", "Division"],
        replication: Replication::RowVersion,
        profile: PageProfile::Sync,
        fields: GL_ACCOUNTS_FIELDS,
    },
    StreamDefinition {
        name: "gl_classifications",
        path: "/sync/Financial/GLClassifications",
        primary_keys: &["ID", "Division"],
        replication: Replication::RowVersion,
        profile: PageProfile::Sync,
        fields: GL_CLASSIFICATIONS_FIELDS,
    },
    StreamDefinition {
        name: "gl_account_classification_mappings",
        path: "/Financial/GLAccountClassificationMappings",
        primary_keys: &["ID", "Division"],
        replication: Replication::None,
        profile: PageProfile::Regular,
        fields: GL_ACCOUNT_CLASSIFICATION_MAPPINGS_FIELDS,
    },
    StreamDefinition {
        name: "deleted",
        path: "/sync/Deleted",
        primary_keys: &["ID"],
        replication: Replication::RowVersion,
        profile: PageProfile::Sync,
        fields: DELETED_FIELDS,
    },
    StreamDefinition {
        name: "sales_entry_lines",
        path: "/salesentry/SalesEntryLines",
        primary_keys: &["ID"],
        replication: Replication::None,
        profile: PageProfile::Regular,
        fields: SALES_ENTRY_LINES_FIELDS,
    },
    StreamDefinition {
        name: "sales_entries",
        path: "/salesentry/SalesEntries",
        primary_keys: &["EntryID"],
        replication: Replication::None,
        profile: PageProfile::Regular,
        fields: SALES_ENTRIES_FIELDS,
    },
];

const TRANSACTION_LINES_FIELDS: &[Field] = &[
    Field::new("Timestamp", T::Integer),
    Field::new("Account", T::String),
    Field::new("AccountCode", T::String),
    Field::new("AccountName", T::String),
    Field::new("AmountDC", T::Number),
    Field::new("AmountFC", T::Number),
    Field::new("AmountVATBaseFC", T::Number),
    Field::new("AmountVATFC", T::Number),
    Field::new("Asset", T::String),
    Field::new("AssetCode", T::String),
    Field::new("AssetDescription", T::String),
    Field::new("CostCenter", T::String),
    Field::new("CostCenterDescription", T::String),
    Field::new("CostUnit", T::String),
    Field::new("CostUnitDescription", T::String),
    Field::new("Created", T::DateTime),
    Field::new("Creator", T::String),
    Field::new("CreatorFullName", T::String),
    Field::new("Currency", T::String),
    Field::new("CustomField", T::String),
    Field::new("Date", T::DateTime),
    Field::new("Description", T::String),
    Field::new("Division", T::Integer),
    Field::new("Document", T::String),
    Field::new("DocumentNumber", T::Integer),
    Field::new("DocumentSubject", T::String),
    Field::new("DueDate", T::DateTime),
    Field::new("EntryID", T::String),
    Field::new("EntryNumber", T::Integer),
    Field::new("ExchangeRate", T::Number),
    Field::new("ExternalLinkDescription", T::String),
    Field::new("ExternalLinkReference", T::String),
    Field::new("ExtraDutyAmountFC", T::Number),
    Field::new("ExtraDutyPercentage", T::Number),
    Field::new("FinancialPeriod", T::Integer),
    Field::new("FinancialYear", T::Integer),
    Field::new("GLAccount", T::String),
    Field::new("GLAccountCode", T::String),
    Field::new("GLAccountDescription", T::String),
    Field::new("ID", T::String),
    Field::new("InvoiceNumber", T::Integer),
    Field::new("Item", T::String),
    Field::new("ItemCode", T::String),
    Field::new("ItemDescription", T::String),
    Field::new("JournalCode", T::String),
    Field::new("JournalDescription", T::String),
    Field::new("LineNumber", T::Integer),
    Field::new("LineType", T::Integer),
    Field::new("Modified", T::DateTime),
    Field::new("ModifierFullName", T::String),
    Field::new("Notes", T::String),
    Field::new("OffsetID", T::String),
    Field::new("OrderNumber", T::Integer),
    Field::new("PaymentDiscountAmount", T::Number),
    Field::new("PaymentReference", T::String),
    Field::new("Project", T::String),
    Field::new("ProjectCode", T::String),
    Field::new("ProjectDescription", T::String),
    Field::new("Quantity", T::Number),
    Field::new("SerialNumber", T::String),
    Field::new("Status", T::Integer),
    Field::new("Subscription", T::String),
    Field::new("SubscriptionDescription", T::String),
    Field::new("TrackingNumber", T::String),
    Field::new("TrackingNumberDescription", T::String),
    Field::new("Type", T::Integer),
    Field::new("VATCode", T::String),
    Field::new("VATCodeDescription", T::String),
    Field::new("VATPercentage", T::Number),
    Field::new("VATType", T::String),
    Field::new("YourRef", T::String),
];

const GL_ACCOUNTS_FIELDS: &[Field] = &[
    Field::new("Timestamp", T::Integer),
    Field::new("AllowCostsInSales", T::Boolean),
    Field::new("AssimilatedVATBox", T::Integer),
    Field::new("BalanceSide", T::String),
    Field::new("BalanceType", T::String),
    Field::new("BelcotaxType", T::Integer),
    Field::new("Code", T::String),
    Field::new("Compress", T::Boolean),
    Field::new("Costcenter", T::String),
    Field::new("CostcenterDescription", T::String),
    Field::new("Costunit", T::String),
    Field::new("CostunitDescription", T::String),
    Field::new("Created", T::DateTime),
    Field::new("Creator", T::String),
    Field::new("CreatorFullName", T::String),
    Field::new("CustomField", T::String),
    Field::new("Description", T::String),
    Field::new("Division", T::Integer),
    Field::new("ExcludeVATListing", T::Boolean),
    Field::new("ExpenseNonDeductiblePercentage", T::Number),
    Field::new("ID", T::String),
    Field::new("IsBlocked", T::Boolean),
    Field::new("Matching", T::Boolean),
    Field::new("Modified", T::DateTime),
    Field::new("Modifier", T::String),
    Field::new("ModifierFullName", T::String),
    Field::new("PrivateGLAccount", T::String),
    Field::new("PrivatePercentage", T::Number),
    Field::new("ReportingCode", T::Boolean),
    Field::new("RevalueCurrency", T::Boolean),
    Field::new("SearchCode", T::String),
    Field::new("Type", T::Integer),
    Field::new("TypeDescription", T::String),
    Field::new("UseCostcenter", T::Boolean),
    Field::new("UseCostunit", T::Boolean),
    Field::new("VATCode", T::String),
    Field::new("VATDescription", T::String),
    Field::new("VATGLAccountType", T::String),
    Field::new("VATNonDeductibleGLAccount", T::String),
    Field::new("VATNonDeductiblePercentage", T::Number),
    Field::new("VATSystem", T::String),
    Field::new("YearEndCostGLAccount", T::String),
    Field::new("YearEndReflectionGLAccount", T::String),
];

const GL_CLASSIFICATIONS_FIELDS: &[Field] = &[
    Field::new("Timestamp", T::Integer),
    Field::new("Abstract", T::Boolean),
    Field::new("Balance", T::String),
    Field::new("Code", T::String),
    Field::new("Created", T::DateTime),
    Field::new("CreatorFullName", T::String),
    Field::new("Description", T::String),
    Field::new("Division", T::Integer),
    Field::new("ID", T::String),
    Field::new("IsTupleSubElement", T::Boolean),
    Field::new("Modified", T::DateTime),
    Field::new("Modifier", T::String),
    Field::new("ModifierFullName", T::String),
    Field::new("Name", T::String),
    Field::new("Nillable", T::Boolean),
    Field::new("Parent", T::String),
    Field::new("PeriodType", T::String),
    Field::new("SubstitutionGroup", T::String),
    Field::new("TaxonomyNamespace", T::String),
    Field::new("TaxonomyNamespaceDescription", T::String),
    Field::new("Type", T::String),
];

const GL_ACCOUNT_CLASSIFICATION_MAPPINGS_FIELDS: &[Field] = &[
    Field::new("ID", T::String),
    Field::new("Classification", T::String),
    Field::new("ClassificationCode", T::String),
    Field::new("ClassificationDescription", T::String),
    Field::new("Division", T::Integer),
    Field::new("GLAccount", T::String),
    Field::new("GLAccountCode", T::String),
    Field::new("GLAccountDescription", T::String),
    Field::new("GLSchemeCode", T::String),
    Field::new("GLSchemeDescription", T::String),
    Field::new("GLSchemeID", T::String),
];

const DELETED_FIELDS: &[Field] = &[
    Field::new("Timestamp", T::Integer),
    Field::new("DeletedBy", T::String),
    Field::new("DeletedDate", T::DateTime),
    Field::new("Division", T::Integer),
    Field::new("EntityKey", T::String),
    Field::new("EntityType", T::Integer),
    Field::new("ID", T::String),
];

const SALES_ENTRY_LINES_FIELDS: &[Field] = &[
    Field::new("EntryID", T::String),
    Field::new("AmountDC", T::Integer),
    Field::new("AmountFC", T::Integer),
    Field::new("Asset", T::String),
    Field::new("AssetDescription", T::String),
    Field::new("CostCenter", T::String),
    Field::new("CostCenterDescription", T::String),
    Field::new("CostUnit", T::String),
    Field::new("CostUnitDescription", T::String),
    Field::new("Description", T::String),
    Field::new("Division", T::Integer),
    Field::new("ExtraDutyAmountFC", T::Integer),
    Field::new("ExtraDutyPercentage", T::Integer),
    Field::new("From", T::String),
    Field::new("GLAccount", T::String),
    Field::new("GLAccountCode", T::String),
    Field::new("GLAccountDescription", T::String),
    Field::new("ID", T::String),
    Field::new("IntraStatArea", T::String),
    Field::new("IntraStatCountry", T::String),
    Field::new("IntraStatDeliveryTerm", T::String),
    Field::new("IntraStatTransactionA", T::String),
    Field::new("IntraStatTransactionB", T::String),
    Field::new("IntraStatTransportMethod", T::String),
    Field::new("LineNumber", T::Integer),
    Field::new("Notes", T::String),
    Field::new("Project", T::String),
    Field::new("ProjectDescription", T::String),
    Field::new("Quantity", T::Integer),
    Field::new("SerialNumber", T::String),
    Field::new("Subscription", T::String),
    Field::new("StatisticalNumber", T::String),
    Field::new("StatisticalNetWeight", T::Integer),
    Field::new("StatisticalValue", T::Integer),
    Field::new("StatisticalQuantity", T::Integer),
    Field::new("SubscriptionDescription", T::String),
    Field::new("TaxSchedule", T::String),
    Field::new("To", T::String),
    Field::new("TrackingNumber", T::String),
    Field::new("TrackingNumberDescription", T::String),
    Field::new("Type", T::Integer),
    Field::new("VATAmountDC", T::Integer),
    Field::new("VATAmountFC", T::Integer),
    Field::new("VATBaseAmountDC", T::Integer),
    Field::new("VATBaseAmountFC", T::Integer),
    Field::new("VATCode", T::String),
    Field::new("VATCodeDescription", T::String),
    Field::new("CustomField", T::String),
    Field::new("VATPercentage", T::Integer),
];

const SALES_ENTRIES_FIELDS: &[Field] = &[
    Field::new("AmountDC", T::Integer),
    Field::new("AmountFC", T::Integer),
    Field::new("BatchNumber", T::String),
    Field::new("Created", T::DateTime),
    Field::new("Creator", T::String),
    Field::new("CreatorFullName", T::String),
    Field::new("Currency", T::String),
    Field::new("Customer", T::String),
    Field::new("CustomerName", T::String),
    Field::new("Description", T::String),
    Field::new("Division", T::Integer),
    Field::new("Document", T::String),
    Field::new("DocumentNumber", T::String),
    Field::new("DocumentSubject", T::String),
    Field::new("DueDate", T::DateTime),
    Field::new("EntryDate", T::DateTime),
    Field::new("EntryID", T::String),
    Field::new("EntryNumber", T::Integer),
    Field::new("ExternalLinkDescription", T::String),
    Field::new("ExternalLinkReference", T::String),
    Field::new("GAccountAmountFC", T::String),
    Field::new("InvoiceNumber", T::Integer),
    Field::new("IsExtraDuty", T::Boolean),
    Field::new("Journal", T::String),
    Field::new("JournalDescription", T::String),
    Field::new("Modified", T::DateTime),
    Field::new("Modifier", T::String),
    Field::new("ModifierFullName", T::String),
    Field::new("OrderNumber", T::Integer),
    Field::new("PaymentCondition", T::String),
    Field::new("PaymentConditionDescription", T::String),
    Field::new("PaymentConditionPaymentMethod", T::String),
    Field::new("PaymentReference", T::String),
    Field::new("ProcessNumber", T::Integer),
    Field::new("Rate", T::Integer),
    Field::new("ReportingYear", T::Integer),
    Field::new("ReportingPeriod", T::Integer),
    Field::new("Reversal", T::Boolean),
    Field::new("Status", T::Integer),
    Field::new("StatusDescription", T::String),
    Field::new("Type", T::Integer),
    Field::new("TypeDescription", T::String),
    Field::new("VATAmountDC", T::Integer),
    Field::new("VATAmountFC", T::Integer),
    Field::new("WithholdingTaxAmountDC", T::String),
    Field::new("WithholdingTaxBaseAmount", T::String),
    Field::new("WithholdingTaxPercentage", T::String),
    Field::new("YourRef", T::String),
    Field::new("CustomField", T::String),
    Field::new("SalesEntryLines", T::String),
];
