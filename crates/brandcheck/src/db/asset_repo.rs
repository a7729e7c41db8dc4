//! Asset repository: the `creative_assets` and `brands` tables.
//!
//! Structured stage outputs are stored as JSON text. Status transitions
//! that must not race (`pending -> processing`, `failed -> pending`) are
//! single conditional UPDATEs.

use rusqlite::{params, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::{Database, DatabaseError};
use crate::model::{
    AssetStatus, BrandConfig, Classification, ComplianceResult, CreativeAsset, CreativeType,
    DetailedResults, ErrorDetail, SourceProperties, Transcript, Verdict,
};
use crate::report::ComplianceReport;

/// Everything a successful run writes back to the asset row.
#[derive(Debug, Clone)]
pub struct AnalysisRecord {
    pub classification: Classification,
    pub raw_transcript: Option<Transcript>,
    pub vocabulary_compliance_result: Option<ComplianceResult>,
    pub detailed_results: DetailedResults,
    pub report: ComplianceReport,
}

/// Result of a requeue request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueOutcome {
    Requeued,
    NotFound,
    /// The asset exists but is not `failed`.
    WrongStatus(AssetStatus),
}

/// Filter for asset listings.
#[derive(Debug, Default, Clone)]
pub struct AssetFilter {
    pub status: Option<AssetStatus>,
    pub campaign_id: Option<String>,
    pub limit: Option<u64>,
}

pub trait AssetRepository: Send + Sync {
    /// Inserts a new asset. Fails if the id already exists.
    fn insert(&self, asset: &CreativeAsset) -> Result<(), DatabaseError>;

    fn find(&self, asset_id: &str) -> Result<Option<CreativeAsset>, DatabaseError>;

    /// `pending -> processing` compare-and-swap. Returns `false` if the
    /// asset was not pending. Increments `attempts` on success.
    fn try_begin_processing(&self, asset_id: &str) -> Result<bool, DatabaseError>;

    fn record_source_properties(
        &self,
        asset_id: &str,
        properties: &SourceProperties,
    ) -> Result<(), DatabaseError>;

    fn save_completed(&self, asset_id: &str, record: &AnalysisRecord) -> Result<(), DatabaseError>;

    /// Marks the asset failed. `partial` keeps whatever stage output exists.
    fn save_failed(
        &self,
        asset_id: &str,
        error: &ErrorDetail,
        partial: Option<&DetailedResults>,
    ) -> Result<(), DatabaseError>;

    /// `failed -> pending`, clearing `error_detail`.
    fn requeue(&self, asset_id: &str) -> Result<RequeueOutcome, DatabaseError>;

    /// Ids of pending assets, oldest first.
    fn list_pending(&self, limit: usize) -> Result<Vec<String>, DatabaseError>;

    fn list(&self, filter: &AssetFilter) -> Result<Vec<CreativeAsset>, DatabaseError>;

    fn brand_config(&self, brand_id: &str) -> Result<Option<BrandConfig>, DatabaseError>;

    fn upsert_brand(&self, brand: &BrandConfig) -> Result<(), DatabaseError>;
}

/// SQLite-backed [`AssetRepository`].
#[derive(Clone)]
pub struct SqliteAssetRepository {
    db: Database,
}

impl SqliteAssetRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

fn now() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn encode<T: Serialize + ?Sized>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Json { column, source })
}

fn encode_opt<T: Serialize>(
    column: &'static str,
    value: Option<&T>,
) -> Result<Option<String>, DatabaseError> {
    value.map(|v| encode(column, v)).transpose()
}

fn decode<T: DeserializeOwned>(
    column: &'static str,
    value: Option<String>,
) -> Result<Option<T>, DatabaseError> {
    value
        .map(|raw| {
            serde_json::from_str(&raw).map_err(|source| DatabaseError::Json { column, source })
        })
        .transpose()
}

/// A raw row from `creative_assets`, before JSON columns are decoded.
struct AssetRow {
    asset_id: String,
    campaign_id: String,
    brand_id: String,
    organization_id: Option<String>,
    storage_path: String,
    mime_type: String,
    file_size: Option<i64>,
    display_name: String,
    status: String,
    source_properties: Option<String>,
    ugc_detection_data: Option<String>,
    creative_type: Option<String>,
    raw_transcript: Option<String>,
    vocabulary_compliance_result: Option<String>,
    detailed_results: Option<String>,
    frontend_report: Option<String>,
    overall_status: Option<String>,
    compliance_score: Option<i64>,
    error_detail: Option<String>,
    attempts: i64,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl AssetRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            asset_id: row.get("asset_id")?,
            campaign_id: row.get("campaign_id")?,
            brand_id: row.get("brand_id")?,
            organization_id: row.get("organization_id")?,
            storage_path: row.get("storage_path")?,
            mime_type: row.get("mime_type")?,
            file_size: row.get("file_size")?,
            display_name: row.get("display_name")?,
            status: row.get("status")?,
            source_properties: row.get("source_properties")?,
            ugc_detection_data: row.get("ugc_detection_data")?,
            creative_type: row.get("creative_type")?,
            raw_transcript: row.get("raw_transcript")?,
            vocabulary_compliance_result: row.get("vocabulary_compliance_result")?,
            detailed_results: row.get("detailed_results")?,
            frontend_report: row.get("frontend_report")?,
            overall_status: row.get("overall_status")?,
            compliance_score: row.get("compliance_score")?,
            error_detail: row.get("error_detail")?,
            attempts: row.get("attempts")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    fn into_asset(self) -> Result<CreativeAsset, DatabaseError> {
        let status = AssetStatus::parse(&self.status).ok_or(DatabaseError::InvalidValue {
            column: "status",
            value: self.status.clone(),
        })?;
        let creative_type = self
            .creative_type
            .map(|raw| {
                CreativeType::parse(&raw).ok_or(DatabaseError::InvalidValue {
                    column: "creative_type",
                    value: raw,
                })
            })
            .transpose()?;
        let overall_status = self
            .overall_status
            .map(|raw| {
                Verdict::parse(&raw).ok_or(DatabaseError::InvalidValue {
                    column: "overall_status",
                    value: raw,
                })
            })
            .transpose()?;

        Ok(CreativeAsset {
            asset_id: self.asset_id,
            campaign_id: self.campaign_id,
            brand_id: self.brand_id,
            organization_id: self.organization_id,
            storage_path: self.storage_path,
            mime_type: self.mime_type,
            file_size: self.file_size.map(|s| s.max(0) as u64),
            display_name: self.display_name,
            status,
            source_properties: decode("source_properties", self.source_properties)?,
            ugc_detection_data: decode("ugc_detection_data", self.ugc_detection_data)?,
            creative_type,
            raw_transcript: decode("raw_transcript", self.raw_transcript)?,
            vocabulary_compliance_result: decode(
                "vocabulary_compliance_result",
                self.vocabulary_compliance_result,
            )?,
            detailed_results: decode("detailed_results", self.detailed_results)?,
            frontend_report: decode("frontend_report", self.frontend_report)?,
            overall_status,
            compliance_score: self.compliance_score.map(|s| s.clamp(0, 100) as u8),
            error_detail: decode("error_detail", self.error_detail)?,
            attempts: self.attempts.max(0) as u32,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

fn brand_from_row(row: &Row<'_>) -> Result<(BrandConfig, String), rusqlite::Error> {
    Ok((
        BrandConfig {
            brand_id: row.get("brand_id")?,
            brand_name: row.get("brand_name")?,
            phonetic_pronunciation: row.get("phonetic_pronunciation")?,
            banned_terms: Vec::new(),
        },
        row.get("banned_terms")?,
    ))
}

impl AssetRepository for SqliteAssetRepository {
    fn insert(&self, asset: &CreativeAsset) -> Result<(), DatabaseError> {
        let source_properties = encode_opt("source_properties", asset.source_properties.as_ref())?;
        let error_detail = encode_opt("error_detail", asset.error_detail.as_ref())?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO creative_assets (asset_id, campaign_id, brand_id, organization_id,
                 storage_path, mime_type, file_size, display_name, status, source_properties,
                 error_detail, attempts, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    asset.asset_id,
                    asset.campaign_id,
                    asset.brand_id,
                    asset.organization_id,
                    asset.storage_path,
                    asset.mime_type,
                    asset.file_size.map(|s| s as i64),
                    asset.display_name,
                    asset.status.as_str(),
                    source_properties,
                    error_detail,
                    asset.attempts,
                    asset.created_at,
                    asset.updated_at,
                ],
            )?;
            Ok(())
        })
    }

    fn find(&self, asset_id: &str) -> Result<Option<CreativeAsset>, DatabaseError> {
        let row = self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM creative_assets WHERE asset_id = ?1",
                    params![asset_id],
                    AssetRow::from_row,
                )
                .optional()?;
            Ok(row)
        })?;
        row.map(AssetRow::into_asset).transpose()
    }

    fn try_begin_processing(&self, asset_id: &str) -> Result<bool, DatabaseError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE creative_assets SET status = 'processing', attempts = attempts + 1,
                 updated_at = ?2 WHERE asset_id = ?1 AND status = 'pending'",
                params![asset_id, now()],
            )?;
            Ok(changed == 1)
        })
    }

    fn record_source_properties(
        &self,
        asset_id: &str,
        properties: &SourceProperties,
    ) -> Result<(), DatabaseError> {
        let encoded = encode("source_properties", properties)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE creative_assets SET source_properties = ?2, file_size = ?3, updated_at = ?4
                 WHERE asset_id = ?1",
                params![asset_id, encoded, properties.file_size as i64, now()],
            )?;
            Ok(())
        })
    }

    fn save_completed(&self, asset_id: &str, record: &AnalysisRecord) -> Result<(), DatabaseError> {
        let ugc_detection_data = encode("ugc_detection_data", &record.classification)?;
        let raw_transcript = encode_opt("raw_transcript", record.raw_transcript.as_ref())?;
        let compliance = encode_opt(
            "vocabulary_compliance_result",
            record.vocabulary_compliance_result.as_ref(),
        )?;
        let detailed_results = encode("detailed_results", &record.detailed_results)?;
        let frontend_report = encode("frontend_report", &record.report.frontend_report)?;
        let timestamp = now();

        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE creative_assets SET status = 'completed', ugc_detection_data = ?2,
                 creative_type = ?3, raw_transcript = ?4, vocabulary_compliance_result = ?5,
                 detailed_results = ?6, frontend_report = ?7, overall_status = ?8,
                 compliance_score = ?9, error_detail = NULL, updated_at = ?10, completed_at = ?10
                 WHERE asset_id = ?1",
                params![
                    asset_id,
                    ugc_detection_data,
                    record.classification.creative_type.as_str(),
                    raw_transcript,
                    compliance,
                    detailed_results,
                    frontend_report,
                    record.report.overall_status.as_str(),
                    record.report.compliance_score,
                    timestamp,
                ],
            )?;
            Ok(())
        })
    }

    fn save_failed(
        &self,
        asset_id: &str,
        error: &ErrorDetail,
        partial: Option<&DetailedResults>,
    ) -> Result<(), DatabaseError> {
        let error_detail = encode("error_detail", error)?;
        let detailed_results = encode_opt("detailed_results", partial)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE creative_assets SET status = 'failed', error_detail = ?2,
                 detailed_results = COALESCE(?3, detailed_results), updated_at = ?4
                 WHERE asset_id = ?1",
                params![asset_id, error_detail, detailed_results, now()],
            )?;
            Ok(())
        })
    }

    fn requeue(&self, asset_id: &str) -> Result<RequeueOutcome, DatabaseError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE creative_assets SET status = 'pending', error_detail = NULL, updated_at = ?2
                 WHERE asset_id = ?1 AND status = 'failed'",
                params![asset_id, now()],
            )?;
            if changed == 1 {
                return Ok(RequeueOutcome::Requeued);
            }

            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM creative_assets WHERE asset_id = ?1",
                    params![asset_id],
                    |r| r.get(0),
                )
                .optional()?;
            match current {
                None => Ok(RequeueOutcome::NotFound),
                Some(raw) => AssetStatus::parse(&raw)
                    .map(RequeueOutcome::WrongStatus)
                    .ok_or(DatabaseError::InvalidValue {
                        column: "status",
                        value: raw,
                    }),
            }
        })
    }

    fn list_pending(&self, limit: usize) -> Result<Vec<String>, DatabaseError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT asset_id FROM creative_assets WHERE status = 'pending'
                 ORDER BY created_at ASC LIMIT ?1",
            )?;
            let ids = stmt
                .query_map(params![limit as i64], |r| r.get(0))?
                .collect::<Result<Vec<String>, _>>()?;
            Ok(ids)
        })
    }

    fn list(&self, filter: &AssetFilter) -> Result<Vec<CreativeAsset>, DatabaseError> {
        let rows = self.db.with_conn(|conn| {
            let mut conditions = Vec::new();
            let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

            if let Some(status) = filter.status {
                conditions.push(format!("status = ?{}", param_values.len() + 1));
                param_values.push(Box::new(status.as_str()));
            }
            if let Some(ref campaign_id) = filter.campaign_id {
                conditions.push(format!("campaign_id = ?{}", param_values.len() + 1));
                param_values.push(Box::new(campaign_id.clone()));
            }

            let where_clause = if conditions.is_empty() {
                String::new()
            } else {
                format!("WHERE {}", conditions.join(" AND "))
            };

            param_values.push(Box::new(filter.limit.unwrap_or(100) as i64));
            let sql = format!(
                "SELECT * FROM creative_assets {} ORDER BY created_at DESC LIMIT ?{}",
                where_clause,
                param_values.len()
            );

            let params_ref: Vec<&dyn rusqlite::types::ToSql> =
                param_values.iter().map(|p| p.as_ref()).collect();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_ref.as_slice(), AssetRow::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        rows.into_iter().map(AssetRow::into_asset).collect()
    }

    fn brand_config(&self, brand_id: &str) -> Result<Option<BrandConfig>, DatabaseError> {
        let row = self.db.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT * FROM brands WHERE brand_id = ?1",
                    params![brand_id],
                    brand_from_row,
                )
                .optional()?;
            Ok(row)
        })?;

        match row {
            None => Ok(None),
            Some((mut brand, banned_terms)) => {
                brand.banned_terms =
                    decode("banned_terms", Some(banned_terms))?.unwrap_or_default();
                Ok(Some(brand))
            }
        }
    }

    fn upsert_brand(&self, brand: &BrandConfig) -> Result<(), DatabaseError> {
        let banned_terms = encode("banned_terms", &brand.banned_terms)?;
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO brands (brand_id, brand_name, phonetic_pronunciation, banned_terms, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(brand_id) DO UPDATE SET brand_name = excluded.brand_name,
                 phonetic_pronunciation = excluded.phonetic_pronunciation,
                 banned_terms = excluded.banned_terms, updated_at = excluded.updated_at",
                params![
                    brand.brand_id,
                    brand.brand_name,
                    brand.phonetic_pronunciation,
                    banned_terms,
                    now(),
                ],
            )?;
            Ok(())
        })
    }
}
