//! Record codec
//!
//! Normalizes raw remote rows into [`BillingRecord`] and encodes outbound rows.
//!
//! Decoding substitutes defaults instead of failing wherever the data model
//! allows it:
//! - missing or malformed `due_date` / `created_at` → `now`
//! - missing `status` → pending, missing `amount` → 0
//! - blank optional text → `None`
//!
//! Only an unusable `id`, a negative or non-numeric `amount`, or an unknown
//! status / payment method reject the row.

use crate::error::CodecError;
use crate::raw::{keys, RawRecord};
use crate::time::{format_timestamp, parse_timestamp};
use crate::types::{BillingRecord, GeoPoint, NewRecord, PaymentMethod, PaymentStatus, RecordId, RecordPatch};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Decode a raw row, defaulting dates to the current time
///
/// # Errors
/// See [`decode_record_at`].
pub fn decode_record(raw: &RawRecord) -> Result<BillingRecord, CodecError> {
    decode_record_at(raw, Utc::now())
}

/// Decode a raw row with an explicit fallback time
///
/// # Errors
/// - `CodecError::MissingId` / `InvalidId` for an unusable identifier
/// - `CodecError::InvalidAmount` / `NegativeAmount` for a bad amount
/// - `CodecError::InvalidStatus` / `InvalidPaymentMethod` for unknown enums
pub fn decode_record_at(raw: &RawRecord, now: DateTime<Utc>) -> Result<BillingRecord, CodecError> {
    let id = raw.id()?;
    let amount = decode_amount(raw.get(keys::AMOUNT))?;
    let status = decode_status(raw.get(keys::STATUS))?;
    let payment_method = decode_payment_method(
        raw.get(keys::PAYMENT_METHOD)
            .or_else(|| raw.get(keys::PAYMENT_METHOD_ALT)),
    )?;

    Ok(BillingRecord {
        name: text(raw.get(keys::NAME)).unwrap_or_default(),
        amount,
        status,
        payment_method,
        due_date: timestamp_or(raw, keys::DUE_DATE, &id, now),
        created_at: timestamp_or(raw, keys::CREATED_AT, &id, now),
        notes: text(raw.get(keys::NOTES)),
        phone_number: text(raw.get(keys::PHONE_NUMBER)),
        address: text(raw.get(keys::ADDRESS)),
        package_name: text(raw.get(keys::PACKAGE_NAME)),
        location: decode_location(raw),
        photo_url: text(raw.get(keys::PHOTO_URL)),
        id,
    })
}

/// Encode a full record as a remote row
#[must_use]
pub fn encode_record(record: &BillingRecord) -> RawRecord {
    let mut raw = RawRecord::new()
        .with(keys::ID, record.id.as_str())
        .with(keys::NAME, record.name.as_str())
        .with(keys::AMOUNT, record.amount)
        .with(keys::STATUS, record.status.as_str())
        .with(keys::PAYMENT_METHOD, optional_enum(record.payment_method.map(|m| m.as_str())))
        .with(keys::DUE_DATE, format_timestamp(&record.due_date))
        .with(keys::CREATED_AT, format_timestamp(&record.created_at));
    write_details(
        &mut raw,
        record.notes.as_deref(),
        record.phone_number.as_deref(),
        record.address.as_deref(),
        record.package_name.as_deref(),
        record.location,
        record.photo_url.as_deref(),
    );
    raw
}

/// Encode a create/import request row
#[must_use]
pub fn encode_new(
    id: &RecordId,
    record: &NewRecord,
    created_at: DateTime<Utc>,
    due_date: DateTime<Utc>,
) -> RawRecord {
    let mut raw = RawRecord::new()
        .with(keys::ID, id.as_str())
        .with(keys::NAME, record.name.trim())
        .with(keys::AMOUNT, record.amount)
        .with(keys::STATUS, record.status.as_str())
        .with(keys::PAYMENT_METHOD, optional_enum(record.payment_method.map(|m| m.as_str())))
        .with(keys::DUE_DATE, format_timestamp(&due_date))
        .with(keys::CREATED_AT, format_timestamp(&created_at));
    write_details(
        &mut raw,
        record.notes.as_deref(),
        record.phone_number.as_deref(),
        record.address.as_deref(),
        record.package_name.as_deref(),
        record.location,
        record.photo_url.as_deref(),
    );
    raw
}

/// Encode a partial update; only set fields are emitted
#[must_use]
pub fn encode_patch(patch: &RecordPatch) -> RawRecord {
    let mut raw = RawRecord::new();
    if let Some(name) = &patch.name {
        raw.insert(keys::NAME, name.trim());
    }
    if let Some(amount) = patch.amount {
        raw.insert(keys::AMOUNT, amount);
    }
    if let Some(status) = patch.status {
        raw.insert(keys::STATUS, status.as_str());
    }
    if let Some(method) = patch.payment_method {
        raw.insert(keys::PAYMENT_METHOD, method.as_str());
    }
    if let Some(due_date) = &patch.due_date {
        raw.insert(keys::DUE_DATE, format_timestamp(due_date));
    }
    let text_fields = [
        (keys::NOTES, &patch.notes),
        (keys::PHONE_NUMBER, &patch.phone_number),
        (keys::ADDRESS, &patch.address),
        (keys::PACKAGE_NAME, &patch.package_name),
        (keys::PHOTO_URL, &patch.photo_url),
    ];
    for (key, value) in text_fields {
        if let Some(value) = value {
            raw.insert(key, value.as_str());
        }
    }
    if let Some(location) = patch.location {
        raw.insert(keys::LATITUDE, location.latitude);
        raw.insert(keys::LONGITUDE, location.longitude);
    }
    raw
}

fn write_details(
    raw: &mut RawRecord,
    notes: Option<&str>,
    phone_number: Option<&str>,
    address: Option<&str>,
    package_name: Option<&str>,
    location: Option<GeoPoint>,
    photo_url: Option<&str>,
) {
    raw.insert(keys::NOTES, optional_text(notes));
    raw.insert(keys::PHONE_NUMBER, optional_text(phone_number));
    raw.insert(keys::ADDRESS, optional_text(address));
    raw.insert(keys::PACKAGE_NAME, optional_text(package_name));
    raw.insert(keys::LATITUDE, location.map_or(Value::Null, |l| Value::from(l.latitude)));
    raw.insert(keys::LONGITUDE, location.map_or(Value::Null, |l| Value::from(l.longitude)));
    raw.insert(keys::PHOTO_URL, optional_text(photo_url));
}

fn optional_text(value: Option<&str>) -> Value {
    match value.map(str::trim) {
        Some(s) if !s.is_empty() => Value::from(s),
        _ => Value::Null,
    }
}

fn optional_enum(value: Option<&'static str>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn decode_amount(value: Option<&Value>) -> Result<u64, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(0),
        Some(Value::Number(n)) => match n.as_u64() {
            Some(amount) => Ok(amount),
            None => n
                .as_f64()
                .ok_or_else(|| CodecError::InvalidAmount(n.to_string()))
                .and_then(|f| amount_from_f64(f, &n.to_string())),
        },
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(0);
            }
            let parsed: f64 = trimmed
                .parse()
                .map_err(|_| CodecError::InvalidAmount(s.clone()))?;
            amount_from_f64(parsed, s)
        }
        Some(other) => Err(CodecError::InvalidAmount(other.to_string())),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn amount_from_f64(value: f64, raw: &str) -> Result<u64, CodecError> {
    if !value.is_finite() || value > u64::MAX as f64 {
        return Err(CodecError::InvalidAmount(raw.to_string()));
    }
    if value < 0.0 {
        return Err(CodecError::NegativeAmount(raw.to_string()));
    }
    Ok(value.round() as u64)
}

fn decode_status(value: Option<&Value>) -> Result<PaymentStatus, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(PaymentStatus::Pending),
        Some(Value::String(s)) => s.parse(),
        Some(other) => Err(CodecError::InvalidStatus(other.to_string())),
    }
}

fn decode_payment_method(value: Option<&Value>) -> Result<Option<PaymentMethod>, CodecError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some),
        Some(other) => Err(CodecError::InvalidPaymentMethod(other.to_string())),
    }
}

fn decode_location(raw: &RawRecord) -> Option<GeoPoint> {
    let latitude = coordinate(raw.get(keys::LATITUDE))?;
    let longitude = coordinate(raw.get(keys::LONGITUDE))?;
    Some(GeoPoint::new(latitude, longitude))
}

fn coordinate(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.filter(|c: &f64| c.is_finite())
}

fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn timestamp_or(raw: &RawRecord, key: &str, id: &RecordId, now: DateTime<Utc>) -> DateTime<Utc> {
    match raw.get(key) {
        None | Some(Value::Null) => now,
        Some(value) => parse_timestamp(value).unwrap_or_else(|| {
            tracing::debug!(record = %id, field = key, value = %value, "unparseable timestamp, using now");
            now
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn raw(value: Value) -> RawRecord {
        RawRecord::try_from(value).unwrap()
    }

    #[test]
    fn decodes_full_row() {
        let row = raw(json!({
            "id": "c-1",
            "name": "  Budi  ",
            "amount": 150000,
            "status": "paid",
            "paymentMethod": "transfer",
            "due_date": "2024-07-01",
            "created_at": "2024-06-01T08:30:00Z",
            "phone_number": "0812",
            "address": "",
            "package_name": "10 Mbps",
            "latitude": -6.9,
            "longitude": "107.6",
        }));

        let record = decode_record_at(&row, now()).unwrap();
        assert_eq!(record.id.as_str(), "c-1");
        assert_eq!(record.name, "Budi");
        assert_eq!(record.amount, 150_000);
        assert_eq!(record.status, PaymentStatus::Paid);
        assert_eq!(record.payment_method, Some(PaymentMethod::Transfer));
        assert_eq!(record.due_date, Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap());
        assert_eq!(record.created_at, Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap());
        assert_eq!(record.phone_number.as_deref(), Some("0812"));
        assert_eq!(record.address, None);
        assert_eq!(record.location, Some(GeoPoint::new(-6.9, 107.6)));
    }

    #[test]
    fn missing_and_malformed_dates_default_to_now() {
        let row = raw(json!({ "id": "c-1", "name": "Budi", "due_date": "besok" }));
        let record = decode_record_at(&row, now()).unwrap();
        assert_eq!(record.due_date, now());
        assert_eq!(record.created_at, now());
    }

    #[test]
    fn defaults_status_and_amount() {
        let row = raw(json!({ "id": 7 }));
        let record = decode_record_at(&row, now()).unwrap();
        assert_eq!(record.id.as_str(), "7");
        assert_eq!(record.status, PaymentStatus::Pending);
        assert_eq!(record.amount, 0);
        assert_eq!(record.name, "");
    }

    #[test]
    fn accepts_numeric_strings_and_snake_case_method() {
        let row = raw(json!({
            "id": "c-1",
            "amount": "99999.6",
            "status": "paid",
            "payment_method": "cash",
        }));
        let record = decode_record_at(&row, now()).unwrap();
        assert_eq!(record.amount, 100_000);
        assert_eq!(record.payment_method, Some(PaymentMethod::Cash));
    }

    #[test]
    fn rejects_bad_amounts() {
        let negative = raw(json!({ "id": "c-1", "amount": -5 }));
        assert!(matches!(
            decode_record_at(&negative, now()),
            Err(CodecError::NegativeAmount(_))
        ));

        let garbage = raw(json!({ "id": "c-1", "amount": "seratus" }));
        assert!(matches!(
            decode_record_at(&garbage, now()),
            Err(CodecError::InvalidAmount(_))
        ));
    }

    #[test]
    fn rejects_unknown_status() {
        let row = raw(json!({ "id": "c-1", "status": "lunas" }));
        assert_eq!(
            decode_record_at(&row, now()),
            Err(CodecError::InvalidStatus("lunas".to_string()))
        );
    }

    #[test]
    fn location_requires_both_coordinates() {
        let row = raw(json!({ "id": "c-1", "latitude": -6.9 }));
        assert_eq!(decode_record_at(&row, now()).unwrap().location, None);
    }

    #[test]
    fn encode_then_decode_preserves_record() {
        let record = BillingRecord::new("c-9", "Siti", 250_000, now())
            .paid_by(PaymentMethod::Transfer)
            .with_package("20 Mbps")
            .with_phone("0813");

        let decoded = decode_record_at(&encode_record(&record), now()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn encode_patch_emits_only_set_fields() {
        let patch = RecordPatch::mark_paid(PaymentMethod::Cash);
        let raw = encode_patch(&patch);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get(keys::STATUS), Some(&json!("paid")));
        assert_eq!(raw.get(keys::PAYMENT_METHOD), Some(&json!("cash")));
    }

    #[test]
    fn encode_new_assigns_dates() {
        let id = RecordId::new("n-1");
        let due = now() + chrono::Duration::days(30);
        let raw = encode_new(&id, &NewRecord::new(" Budi ", 150_000), now(), due);

        let decoded = decode_record_at(&raw, Utc::now()).unwrap();
        assert_eq!(decoded.name, "Budi");
        assert_eq!(decoded.created_at, now());
        assert_eq!(decoded.due_date, due);
        assert_eq!(decoded.status, PaymentStatus::Pending);
    }

    proptest::proptest! {
        #[test]
        fn amount_forms_agree(amount in 0u64..(1 << 53)) {
            let number = decode_amount(Some(&json!(amount))).unwrap();
            let text = decode_amount(Some(&json!(amount.to_string()))).unwrap();
            #[allow(clippy::cast_precision_loss)]
            let float = decode_amount(Some(&json!(amount as f64))).unwrap();
            proptest::prop_assert_eq!(number, amount);
            proptest::prop_assert_eq!(text, amount);
            proptest::prop_assert_eq!(float, amount);
        }

        #[test]
        fn negative_amounts_rejected(amount in i64::MIN..0) {
            let is_negative = matches!(
                decode_amount(Some(&json!(amount))),
                Err(CodecError::NegativeAmount(_))
            );
            proptest::prop_assert!(is_negative);
        }
    }
}
