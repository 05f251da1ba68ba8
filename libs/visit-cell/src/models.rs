// libs/visit-cell/src/models.rs
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;

use shared_models::{AppError, AppResult};
use shared_utils::datetime::normalize_wire;

use crate::services::classifier::classify;

// ==============================================================================
// STATUS
// ==============================================================================

/// Closed set of visit states. Raw server strings are translated once, at
/// deserialization, through [`classify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum LogicalStatus {
    #[default]
    Pending,
    Accepted,
    Refused,
    Completed,
}

impl LogicalStatus {
    pub const ALL: [LogicalStatus; 4] = [
        LogicalStatus::Pending,
        LogicalStatus::Accepted,
        LogicalStatus::Refused,
        LogicalStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalStatus::Pending => "pending",
            LogicalStatus::Accepted => "accepted",
            LogicalStatus::Refused => "refused",
            LogicalStatus::Completed => "completed",
        }
    }

    /// Refused and completed visits accept no further owner decision.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LogicalStatus::Refused | LogicalStatus::Completed)
    }

    pub fn label(&self) -> &'static str {
        match self {
            LogicalStatus::Pending => "En attente",
            LogicalStatus::Accepted => "Acceptée",
            LogicalStatus::Refused => "Refusée",
            LogicalStatus::Completed => "Terminée",
        }
    }
}

impl fmt::Display for LogicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for LogicalStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogicalStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(classify(raw.as_deref()))
    }
}

// ==============================================================================
// CORE VISIT MODEL
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitRequest {
    /// Assigned by the server; missing only while a creation is in flight.
    #[serde(alias = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub logement_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logement_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_username: Option<String>,
    /// Canonical UTC timestamp as sent by the server. Never rewritten for display.
    #[serde(default)]
    pub date_visite: String,
    #[serde(default)]
    pub status: LogicalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_id: Option<String>,
}

impl VisitRequest {
    pub fn has_id(&self, id: &str) -> bool {
        self.id.as_deref() == Some(id)
    }

    pub fn is_chat_available(&self) -> bool {
        self.status == LogicalStatus::Accepted
    }

    pub fn has_review(&self) -> bool {
        self.review_id.is_some()
    }
}

/// A server reply to a status change or an edit. Backends answer with
/// anything from an empty `{"success": true}` to the full record, so every
/// field is optional and only the ones present overwrite the cached copy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitPatch {
    #[serde(alias = "_id", default)]
    pub id: Option<String>,
    #[serde(default)]
    pub logement_id: Option<String>,
    #[serde(default)]
    pub logement_title: Option<String>,
    #[serde(default)]
    pub client_username: Option<String>,
    #[serde(default)]
    pub date_visite: Option<String>,
    #[serde(default)]
    pub status: Option<LogicalStatus>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub review_id: Option<String>,
}

impl VisitPatch {
    /// Whether the reply describes the visit `visit_id`. Replies without an
    /// id are taken to describe the visit the call was made for.
    pub fn concerns(&self, visit_id: &str) -> bool {
        self.id.as_deref().map_or(true, |id| id == visit_id)
    }

    pub fn apply_to(&self, visit: &mut VisitRequest) {
        fn overwrite(target: &mut String, value: &Option<String>) {
            if let Some(value) = value {
                *target = value.clone();
            }
        }
        fn overwrite_opt(target: &mut Option<String>, value: &Option<String>) {
            if value.is_some() {
                *target = value.clone();
            }
        }

        overwrite(&mut visit.logement_id, &self.logement_id);
        overwrite(&mut visit.date_visite, &self.date_visite);
        overwrite_opt(&mut visit.logement_title, &self.logement_title);
        overwrite_opt(&mut visit.client_username, &self.client_username);
        overwrite_opt(&mut visit.notes, &self.notes);
        overwrite_opt(&mut visit.contact_phone, &self.contact_phone);
        overwrite_opt(&mut visit.review_id, &self.review_id);
        if let Some(status) = self.status {
            visit.status = status;
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitRequest {
    pub logement_id: String,
    pub date_visite: String,
    pub notes: Option<String>,
    pub contact_phone: Option<String>,
}

impl CreateVisitRequest {
    /// Validates and returns the JSON body with the date in canonical form.
    pub fn to_body(&self) -> AppResult<Value> {
        if self.logement_id.trim().is_empty() {
            return Err(AppError::ValidationError("Le logement est obligatoire".to_string()));
        }
        let date_visite = required_date(Some(&self.date_visite))?;
        let contact_phone = validate_phone(self.contact_phone.as_deref())?;

        Ok(json!({
            "logementId": self.logement_id.trim(),
            "dateVisite": date_visite,
            "notes": clean_text(self.notes.as_deref()),
            "contactPhone": contact_phone,
        }))
    }
}

/// Fields the requester or owner may edit on an existing visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVisitRequest {
    pub date_visite: Option<String>,
    pub notes: Option<String>,
    pub contact_phone: Option<String>,
}

impl UpdateVisitRequest {
    /// Returns the validated, normalized update. A date is mandatory on edit.
    pub fn validated(&self) -> AppResult<UpdateVisitRequest> {
        let date_visite = required_date(self.date_visite.as_deref())?;
        let contact_phone = validate_phone(self.contact_phone.as_deref())?;

        Ok(UpdateVisitRequest {
            date_visite: Some(date_visite),
            notes: clean_text(self.notes.as_deref()),
            contact_phone,
        })
    }

    /// Only the fields being edited are sent; absent ones keep their server value.
    pub fn to_body(&self) -> Value {
        let mut body = Map::new();
        let fields = [
            ("dateVisite", &self.date_visite),
            ("notes", &self.notes),
            ("contactPhone", &self.contact_phone),
        ];
        for (key, value) in fields {
            if let Some(value) = value {
                body.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        Value::Object(body)
    }
}

fn required_date(raw: Option<&str>) -> AppResult<String> {
    match raw.map(str::trim) {
        Some(date) if !date.is_empty() => normalize_wire(date),
        _ => Err(AppError::ValidationError(
            "La date de visite est obligatoire".to_string(),
        )),
    }
}

fn clean_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn validate_phone(raw: Option<&str>) -> AppResult<Option<String>> {
    let Some(phone) = clean_text(raw) else {
        return Ok(None);
    };

    let pattern = Regex::new(r"^\+?[0-9][0-9 ().-]{5,19}$")
        .map_err(|e| AppError::Internal(format!("Invalid phone pattern: {}", e)))?;
    if !pattern.is_match(&phone) {
        return Err(AppError::ValidationError(format!(
            "Numéro de téléphone invalide: {}",
            phone
        )));
    }
    Ok(Some(phone))
}

// ==============================================================================
// REVIEWS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visite_id: Option<String>,
    pub rating: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitReviewRequest {
    pub rating: u8,
    pub comment: Option<String>,
}

impl SubmitReviewRequest {
    pub fn to_body(&self) -> AppResult<Value> {
        if !(1..=5).contains(&self.rating) {
            return Err(AppError::ValidationError(format!(
                "La note doit être comprise entre 1 et 5 (reçu {})",
                self.rating
            )));
        }
        Ok(json!({
            "rating": self.rating,
            "comment": clean_text(self.comment.as_deref()),
        }))
    }
}

// ==============================================================================
// AFFORDANCES
// ==============================================================================

/// Which actions the UI should offer for one visit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct VisitActions {
    pub accept: bool,
    pub reject: bool,
    pub cancel: bool,
    pub edit: bool,
    pub delete: bool,
    pub chat: bool,
    pub review: bool,
}

impl VisitActions {
    pub fn none() -> Self {
        Self::default()
    }

    /// Accept/reject/cancel buttons, hidden for terminal visits.
    pub fn has_status_actions(&self) -> bool {
        self.accept || self.reject || self.cancel
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_visit_deserialization_classifies_status() {
        let visit: VisitRequest = serde_json::from_value(json!({
            "_id": "1",
            "logementId": "l1",
            "dateVisite": "2030-01-01T10:00:00.000Z",
            "status": "Acceptée"
        }))
        .unwrap();

        assert_eq!(visit.id.as_deref(), Some("1"));
        assert_eq!(visit.status, LogicalStatus::Accepted);
        assert!(visit.is_chat_available());
    }

    #[test]
    fn test_missing_or_null_status_is_pending() {
        let missing: VisitRequest = serde_json::from_value(json!({ "id": "1" })).unwrap();
        let null: VisitRequest = serde_json::from_value(json!({ "id": "2", "status": null })).unwrap();

        assert_eq!(missing.status, LogicalStatus::Pending);
        assert_eq!(null.status, LogicalStatus::Pending);
    }

    #[test]
    fn test_status_serializes_canonical_token() {
        let visit: VisitRequest =
            serde_json::from_value(json!({ "id": "1", "status": "rejetée" })).unwrap();
        let json = serde_json::to_value(&visit).unwrap();
        assert_eq!(json["status"], "refused");
        assert_eq!(json["id"], "1");
    }

    #[test]
    fn test_update_requires_date() {
        let update = UpdateVisitRequest {
            date_visite: None,
            notes: Some("ok".into()),
            contact_phone: None,
        };
        assert_matches!(update.validated(), Err(AppError::ValidationError(_)));

        let blank = UpdateVisitRequest {
            date_visite: Some("   ".into()),
            ..Default::default()
        };
        assert_matches!(blank.validated(), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_update_normalizes_fields() {
        let update = UpdateVisitRequest {
            date_visite: Some("2030-06-01T16:30:00+02:00".into()),
            notes: Some("  ".into()),
            contact_phone: Some(" +33 6 12 34 56 78 ".into()),
        }
        .validated()
        .unwrap();

        assert_eq!(update.date_visite.as_deref(), Some("2030-06-01T14:30:00.000Z"));
        assert_eq!(update.notes, None);
        assert_eq!(update.contact_phone.as_deref(), Some("+33 6 12 34 56 78"));
    }

    #[test]
    fn test_update_body_omits_untouched_fields() {
        let update = UpdateVisitRequest {
            date_visite: Some("2030-06-01T14:30:00.000Z".into()),
            notes: None,
            contact_phone: None,
        }
        .validated()
        .unwrap();

        assert_eq!(update.to_body(), json!({ "dateVisite": "2030-06-01T14:30:00.000Z" }));
    }

    #[test]
    fn test_partial_reply_keeps_cached_fields() {
        let mut visit: VisitRequest = serde_json::from_value(json!({
            "_id": "1",
            "logementId": "l1",
            "dateVisite": "2030-01-01T10:00:00.000Z",
            "status": "pending",
            "notes": "2e étage"
        }))
        .unwrap();
        let reply: VisitPatch =
            serde_json::from_value(json!({ "_id": "1", "status": "Acceptée" })).unwrap();

        assert!(reply.concerns("1"));
        assert!(!reply.concerns("2"));
        reply.apply_to(&mut visit);

        assert_eq!(visit.status, LogicalStatus::Accepted);
        assert_eq!(visit.logement_id, "l1");
        assert_eq!(visit.date_visite, "2030-01-01T10:00:00.000Z");
        assert_eq!(visit.notes.as_deref(), Some("2e étage"));
    }

    #[test]
    fn test_acknowledgement_reply_is_empty_patch() {
        let reply: VisitPatch = serde_json::from_value(json!({ "success": true })).unwrap();
        assert_eq!(reply, VisitPatch::default());
        assert!(reply.concerns("any"));
    }

    #[test]
    fn test_phone_validation() {
        let bad = UpdateVisitRequest {
            date_visite: Some("2030-06-01T14:30:00.000Z".into()),
            contact_phone: Some("call me maybe".into()),
            ..Default::default()
        };
        assert_matches!(bad.validated(), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_create_request_body() {
        let request = CreateVisitRequest {
            logement_id: "l1".into(),
            date_visite: "2030-06-01T14:30:00Z".into(),
            notes: None,
            contact_phone: None,
        };
        let body = request.to_body().unwrap();
        assert_eq!(body["logementId"], "l1");
        assert_eq!(body["dateVisite"], "2030-06-01T14:30:00.000Z");

        let missing_listing = CreateVisitRequest {
            logement_id: " ".into(),
            ..request
        };
        assert_matches!(missing_listing.to_body(), Err(AppError::ValidationError(_)));
    }

    #[test]
    fn test_review_rating_bounds() {
        let zero = SubmitReviewRequest { rating: 0, comment: None };
        let six = SubmitReviewRequest { rating: 6, comment: None };
        let five = SubmitReviewRequest { rating: 5, comment: Some("Top".into()) };

        assert!(zero.to_body().is_err());
        assert!(six.to_body().is_err());
        assert_eq!(five.to_body().unwrap()["rating"], 5);
    }
}
