//! Bulk Ingestion Pipeline (spec.md §4.3): OCR-assisted import of paper
//! custody forms into provisional Property records that require explicit
//! verification before they become authoritative. The OCR vendor call
//! itself lives in [`ocr`]; this module covers the stages that run once a
//! structured OCR result is in hand: line aggregation and field extraction
//! ([`extraction`]), quantity expansion, serial synthesis, verification
//! gating, and provisional insertion.

pub mod extraction;
pub mod ocr;

use {
    catalog::CatalogLookup,
    chrono::Utc,
    model::{
        ids::{PropertyId, UserId},
        ledger::EventDetail,
        property::{Condition, ImportMetadata, SerialSource, SourceType, VerificationReason},
        Error, NewProperty, Property, PropertyPatch, Result,
    },
    ocr::OcrFormResult,
    sqlx::PgPool,
};

fn internal(e: sqlx::Error) -> Error {
    Error::Internal(e.into())
}

/// One physical item produced by field extraction + quantity expansion +
/// serial synthesis, ready for provisional insertion (spec.md §4.3 steps
/// 2-5).
#[derive(Clone, Debug)]
struct ProvisionalItem {
    line: i32,
    quantity_index: i32,
    original_quantity: i32,
    name: String,
    nsn: Option<String>,
    serial_number: String,
    serial_source: SerialSource,
    unit_of_issue: Option<String>,
    category: Option<String>,
    unit_price: Option<sqlx::types::BigDecimal>,
    item_confidence: f64,
    verification_reasons: Vec<VerificationReason>,
}

impl ProvisionalItem {
    fn requires_verification(&self) -> bool {
        !self.verification_reasons.is_empty()
    }
}

fn confidence_band(confidence: f64) -> &'static str {
    if confidence >= 0.9 {
        "high"
    } else if confidence >= 0.7 {
        "medium"
    } else {
        "low"
    }
}

/// Runs steps 1-5 of spec.md §4.3 against a raw OCR result, producing the
/// fully-resolved per-unit candidates step 6 will insert. `catalog` backs
/// both the nsn-or-name lookup and the `CatalogLookupFailed` verification
/// reason.
async fn build_candidates(
    form_id: &str,
    form: &OcrFormResult,
    catalog: &dyn CatalogLookup,
) -> Vec<ProvisionalItem> {
    let lines = extraction::aggregate_lines(form.tokens.clone());
    let mut out = Vec::new();

    for line in &lines {
        let fields = extraction::extract_fields(line);

        let mut reasons = Vec::new();
        if fields.item_confidence < 0.8 {
            reasons.push(VerificationReason::LowConfidence);
        }

        let nsn = match &fields.nsn_candidate {
            None => {
                reasons.push(VerificationReason::NsnMissing);
                None
            }
            Some(candidate) if catalog::is_valid_nsn(candidate) => Some(candidate.clone()),
            Some(_) => {
                reasons.push(VerificationReason::NsnUnparseable);
                None
            }
        };

        let catalog_query = nsn.clone().unwrap_or_else(|| fields.name.clone());
        let catalog_entry = if catalog_query.is_empty() {
            None
        } else {
            catalog.lookup(&catalog_query).await
        };
        if catalog_entry.is_none() {
            reasons.push(VerificationReason::CatalogLookupFailed);
        }

        let name = if fields.name.is_empty() {
            catalog_entry
                .as_ref()
                .map(|e| e.item_name.clone())
                .unwrap_or_else(|| "Unidentified item".to_string())
        } else {
            fields.name.clone()
        };
        let unit_of_issue = fields
            .unit_of_issue
            .clone()
            .or_else(|| catalog_entry.as_ref().and_then(|e| e.unit_of_issue.clone()));
        let category = catalog_entry.as_ref().map(|e| e.fsc.clone());
        let unit_price = catalog_entry.as_ref().and_then(|e| e.unit_price.clone());
        let nsn = nsn.or_else(|| catalog_entry.as_ref().map(|e| e.nsn.clone()));

        // Quantity expansion (spec.md §4.3 step 3): only when no per-unit
        // serial was read — a line reporting one serial for quantity>1 is
        // treated as a single record carrying that quantity, not expanded.
        let quantity_expanded = fields.quantity > 1 && fields.serial_number.is_none();
        if quantity_expanded {
            reasons.push(VerificationReason::QuantityExpanded);
        }
        let unit_count = if quantity_expanded { fields.quantity } else { 1 };

        for idx in 1..=unit_count {
            let (serial_number, serial_source) = match &fields.serial_number {
                Some(serial) if unit_count == 1 => (serial.clone(), SerialSource::Read),
                _ => (
                    format!("GEN-{form_id}-{}-{idx}", line.line),
                    SerialSource::Generated,
                ),
            };

            let mut item_reasons = reasons.clone();
            if serial_source == SerialSource::Generated {
                item_reasons.push(VerificationReason::GeneratedSerial);
            }

            out.push(ProvisionalItem {
                line: line.line,
                quantity_index: idx,
                original_quantity: fields.quantity,
                name: name.clone(),
                nsn: nsn.clone(),
                serial_number,
                serial_source,
                unit_of_issue: unit_of_issue.clone(),
                category: category.clone(),
                unit_price: unit_price.clone(),
                item_confidence: fields.item_confidence,
                verification_reasons: item_reasons,
            });
        }
    }

    out
}

/// One row of the summary returned alongside a completed import (spec.md
/// §4.3 "Output").
#[derive(Clone, Debug, serde::Serialize)]
pub struct ImportedItem {
    pub property_id: PropertyId,
    pub line: i32,
    pub quantity_index: i32,
    pub requires_verification: bool,
    pub verification_reasons: Vec<VerificationReason>,
}

#[derive(Clone, Debug, Default, serde::Serialize)]
pub struct ImportSummary {
    pub form_id: String,
    pub total_items: i64,
    pub by_category: std::collections::HashMap<String, i64>,
    pub by_confidence_band: std::collections::HashMap<String, i64>,
    pub items: Vec<ImportedItem>,
}

/// Processes one already-OCR'd form into provisional Property rows (spec.md
/// §4.3 steps 1-6). Idempotent: a candidate whose `(form_id, line,
/// quantity_index)` key already exists is reported in the summary without
/// a second insert. Duplicate-serial collisions against an existing
/// non-provisional property are skipped with a warning rather than failing
/// the whole batch, since one bad OCR read on one line shouldn't sink the
/// rest of the form.
pub async fn process_form(
    pool: &PgPool,
    actor: UserId,
    catalog: &dyn CatalogLookup,
    form_id: &str,
    image_url: &str,
    ocr: OcrFormResult,
) -> Result<ImportSummary> {
    let candidates = build_candidates(form_id, &ocr, catalog).await;
    let mut items = Vec::new();
    let mut by_category: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
    let mut by_confidence_band: std::collections::HashMap<String, i64> =
        std::collections::HashMap::new();

    for candidate in candidates {
        let mut tx = pool.begin().await.map_err(internal)?;

        if let Some(existing) =
            database::properties::find_by_source_line(&mut tx, form_id, candidate.line, candidate.quantity_index)
                .await
                .map_err(internal)?
        {
            let reasons = existing
                .import_metadata
                .as_ref()
                .map(|m| m.0.verification_reasons.clone())
                .unwrap_or_default();
            items.push(ImportedItem {
                property_id: existing.id,
                line: candidate.line,
                quantity_index: candidate.quantity_index,
                requires_verification: !existing.verified,
                verification_reasons: reasons,
            });
            continue;
        }

        let metadata = ImportMetadata {
            form_id: form_id.to_string(),
            line: candidate.line,
            quantity_index: candidate.quantity_index,
            original_quantity: candidate.original_quantity,
            serial_source: candidate.serial_source,
            scan_confidence: ocr.scan_confidence,
            item_confidence: candidate.item_confidence,
            import_date: Utc::now(),
            requires_verification: candidate.requires_verification(),
            verification_reasons: candidate.verification_reasons.clone(),
        };

        let new = NewProperty {
            serial_number: candidate.serial_number.clone(),
            name: candidate.name.clone(),
            nsn: candidate.nsn.clone(),
            unit_of_issue: candidate.unit_of_issue.clone(),
            unit_price: candidate.unit_price.clone(),
            category: candidate.category.clone(),
            quantity: 1,
            condition: Condition::Serviceable,
            source_type: SourceType::OcrImport,
            source_ref: Some(form_id.to_string()),
            source_document_url: Some(image_url.to_string()),
            import_metadata: Some(metadata),
            verified: false,
            ..Default::default()
        };

        let property = match database::properties::insert(&mut tx, &new).await {
            Ok(property) => property,
            Err(e) if database::properties::is_duplicate_serial_error(&e) => {
                tracing::warn!(
                    serial = %candidate.serial_number,
                    form_id,
                    line = candidate.line,
                    "skipping ingestion candidate: serial already in use"
                );
                continue;
            }
            Err(e) => return Err(internal(e)),
        };

        ledger::append(
            &mut tx,
            actor,
            property.id,
            EventDetail::ImportCreated {
                form_id: form_id.to_string(),
            },
        )
        .await
        .map_err(internal)?;

        tx.commit().await.map_err(internal)?;

        *by_category
            .entry(candidate.category.clone().unwrap_or_else(|| "uncategorized".to_string()))
            .or_default() += 1;
        *by_confidence_band
            .entry(confidence_band(candidate.item_confidence).to_string())
            .or_default() += 1;

        items.push(ImportedItem {
            property_id: property.id,
            line: candidate.line,
            quantity_index: candidate.quantity_index,
            requires_verification: candidate.requires_verification(),
            verification_reasons: candidate.verification_reasons,
        });
    }

    Ok(ImportSummary {
        form_id: form_id.to_string(),
        total_items: items.len() as i64,
        by_category,
        by_confidence_band,
        items,
    })
}

/// Verification protocol (spec.md §4.3): promotes one provisional record,
/// overwriting any reviewer-corrected `serial_number`/`nsn`, and folds a
/// free-text review note into `condition_notes`. Delegates the actual
/// promotion to [`registry::verify`] so the `VERIFIED` ledger event is
/// emitted exactly the same way a non-ingestion verification would be.
pub async fn verify_item(
    pool: &PgPool,
    actor: UserId,
    property_id: PropertyId,
    corrected_serial: Option<&str>,
    corrected_nsn: Option<&str>,
    notes: Option<String>,
) -> Result<Property> {
    let verified = registry::verify(pool, actor, property_id, corrected_serial, corrected_nsn).await?;
    if let Some(notes) = notes {
        return registry::update(
            pool,
            actor,
            property_id,
            PropertyPatch {
                condition_notes: Some(notes),
                ..Default::default()
            },
            verified.version,
        )
        .await;
    }
    Ok(verified)
}

/// Batch rejection path (spec.md §4.3): removes every still-unverified
/// provisional row for `form_id` and emits one `IMPORT_DISCARDED` per
/// removed row. Already-verified rows for the same form (promoted by an
/// earlier reviewer) are left untouched.
pub async fn discard_form(pool: &PgPool, actor: UserId, form_id: &str) -> Result<usize> {
    let mut conn = pool.acquire().await.map_err(internal)?;
    let candidates = database::properties::list_by_source_ref(&mut conn, form_id)
        .await
        .map_err(internal)?;
    drop(conn);

    let mut discarded = 0;
    for property in candidates.into_iter().filter(|p| !p.verified) {
        let mut tx = pool.begin().await.map_err(internal)?;
        database::properties::discard(&mut tx, property.id)
            .await
            .map_err(internal)?;
        ledger::append(&mut tx, actor, property.id, EventDetail::ImportDiscarded)
            .await
            .map_err(internal)?;
        tx.commit().await.map_err(internal)?;
        discarded += 1;
    }
    Ok(discarded)
}

#[cfg(test)]
mod tests {
    use {super::*, async_trait::async_trait, ocr::OcrToken};

    struct FakeCatalog {
        found: bool,
    }

    #[async_trait]
    impl CatalogLookup for FakeCatalog {
        async fn lookup(&self, _query: &str) -> Option<catalog::CatalogEntry> {
            self.found.then(|| catalog::CatalogEntry {
                nsn: "1005-01-234-5678".to_string(),
                inc: "12345".to_string(),
                item_name: "RIFLE,5.56 MM".to_string(),
                fsc: "1005".to_string(),
                niin: "012345678".to_string(),
                unit_of_issue: Some("EA".to_string()),
                unit_price: None,
                demil: None,
                security_code: None,
            })
        }

        fn flush(&self) {}
    }

    fn token(text: &str, confidence: f64, x: f64, y: f64) -> OcrToken {
        OcrToken { text: text.to_string(), confidence, x, y }
    }

    #[tokio::test]
    async fn quantity_expansion_produces_distinct_synthetic_serials() {
        let form = OcrFormResult {
            scan_confidence: 0.95,
            tokens: vec![
                token("1005-01-234-5678", 0.95, 0.0, 0.0),
                token("RIFLE", 0.6, 10.0, 0.0),
                token("3", 0.6, 20.0, 0.0),
            ],
        };
        let catalog = FakeCatalog { found: true };
        let candidates = build_candidates("FORM-1", &form, &catalog).await;

        assert_eq!(candidates.len(), 3);
        let serials: std::collections::HashSet<_> =
            candidates.iter().map(|c| c.serial_number.clone()).collect();
        assert_eq!(serials.len(), 3);
        for candidate in &candidates {
            assert_eq!(candidate.original_quantity, 3);
            assert_eq!(candidate.serial_source, SerialSource::Generated);
            assert!(candidate.verification_reasons.contains(&VerificationReason::QuantityExpanded));
            assert!(candidate.verification_reasons.contains(&VerificationReason::GeneratedSerial));
        }
    }

    #[tokio::test]
    async fn single_unit_with_read_serial_is_not_expanded() {
        let form = OcrFormResult {
            scan_confidence: 0.95,
            tokens: vec![
                token("1005-01-234-5678", 0.95, 0.0, 0.0),
                token("SN-REAL01", 0.95, 10.0, 0.0),
                token("RIFLE", 0.95, 20.0, 0.0),
            ],
        };
        let catalog = FakeCatalog { found: true };
        let candidates = build_candidates("FORM-1", &form, &catalog).await;

        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].serial_number, "SN-REAL01");
        assert_eq!(candidates[0].serial_source, SerialSource::Read);
        assert!(candidates[0].verification_reasons.is_empty());
    }

    #[tokio::test]
    async fn missing_catalog_match_flags_lookup_failed() {
        let form = OcrFormResult {
            scan_confidence: 0.95,
            tokens: vec![token("MYSTERY GEAR", 0.95, 0.0, 0.0)],
        };
        let catalog = FakeCatalog { found: false };
        let candidates = build_candidates("FORM-2", &form, &catalog).await;

        assert_eq!(candidates.len(), 1);
        assert!(candidates[0]
            .verification_reasons
            .contains(&VerificationReason::CatalogLookupFailed));
        assert!(candidates[0]
            .verification_reasons
            .contains(&VerificationReason::NsnMissing));
    }

    #[test]
    fn confidence_band_thresholds() {
        assert_eq!(confidence_band(0.95), "high");
        assert_eq!(confidence_band(0.75), "medium");
        assert_eq!(confidence_band(0.5), "low");
    }
}
