//! Business profile model: one sender identity per owner.

use super::{lenient_text, present, BrandingUploads};
use crate::totals::parse_number_or_zero;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BusinessProfile {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    #[validate(length(min = 1, message = "businessName is required"))]
    pub business_name: String,
    pub email: String,
    pub address: String,
    pub phone: String,
    pub gst: String,
    pub logo_url: Option<String>,
    pub stamp_url: Option<String>,
    pub signature_url: Option<String>,
    pub signature_owner_name: String,
    pub signature_owner_title: String,
    #[validate(range(min = 0.0, max = 100.0, message = "defaultTaxPercent must be 0-100"))]
    pub default_tax_percent: f64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfileFields {
    #[serde(default, deserialize_with = "lenient_text")]
    pub business_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub gst: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub logo_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub stamp_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub signature_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub signature_owner_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub signature_owner_title: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub default_tax_percent: Option<Value>,
}

impl BusinessProfileFields {
    pub fn from_map(map: Map<String, Value>) -> Result<Self, AppError> {
        serde_json::from_value(Value::Object(map))
            .map_err(|e| AppError::BadRequest(anyhow::anyhow!("Invalid profile payload: {}", e)))
    }
}

fn normalize_email(email: String) -> String {
    email.trim().to_lowercase()
}

impl BusinessProfile {
    pub fn create(
        owner: &str,
        fields: BusinessProfileFields,
        uploads: BrandingUploads,
        default_tax_percent: f64,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let profile = Self {
            id: Uuid::new_v4().to_string(),
            owner: owner.to_string(),
            business_name: fields.business_name.unwrap_or_default().trim().to_string(),
            email: normalize_email(fields.email.unwrap_or_default()),
            address: fields.address.unwrap_or_default(),
            phone: fields.phone.unwrap_or_default(),
            gst: fields.gst.unwrap_or_default(),
            logo_url: uploads.logo.or(fields.logo_url),
            stamp_url: uploads.stamp.or(fields.stamp_url),
            signature_url: uploads.signature.or(fields.signature_url),
            signature_owner_name: fields.signature_owner_name.unwrap_or_default(),
            signature_owner_title: fields.signature_owner_title.unwrap_or_default(),
            default_tax_percent: fields
                .default_tax_percent
                .as_ref()
                .map(parse_number_or_zero)
                .unwrap_or(default_tax_percent),
            created_at: now,
            updated_at: now,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Merge `fields` into the profile.
    ///
    /// Returns the asset URLs that were replaced by new uploads so the caller
    /// can remove the old files.
    pub fn apply_patch(
        &mut self,
        fields: BusinessProfileFields,
        uploads: BrandingUploads,
        now: DateTime<Utc>,
    ) -> Result<Vec<String>, AppError> {
        if let Some(name) = fields.business_name {
            self.business_name = name.trim().to_string();
        }
        if let Some(email) = fields.email {
            self.email = normalize_email(email);
        }
        for (target, value) in [
            (&mut self.address, fields.address),
            (&mut self.phone, fields.phone),
            (&mut self.gst, fields.gst),
            (&mut self.signature_owner_name, fields.signature_owner_name),
            (&mut self.signature_owner_title, fields.signature_owner_title),
        ] {
            if let Some(v) = value {
                *target = v;
            }
        }
        if let Some(tax) = &fields.default_tax_percent {
            self.default_tax_percent = parse_number_or_zero(tax);
        }

        let mut replaced = Vec::new();
        for (slot, upload, supplied) in [
            (&mut self.logo_url, uploads.logo, fields.logo_url),
            (&mut self.stamp_url, uploads.stamp, fields.stamp_url),
            (&mut self.signature_url, uploads.signature, fields.signature_url),
        ] {
            let uploaded = upload.is_some();
            if let Some(url) = upload.or(supplied) {
                if let Some(old) = slot.replace(url) {
                    if uploaded && slot.as_deref() != Some(old.as_str()) {
                        replaced.push(old);
                    }
                }
            }
        }

        self.validate()?;
        self.updated_at = now;
        Ok(replaced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> BusinessProfileFields {
        match value {
            Value::Object(map) => BusinessProfileFields::from_map(map).unwrap(),
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn create_trims_and_lowercases() {
        let profile = BusinessProfile::create(
            "user_1",
            fields(json!({"businessName": "  Acme Studio ", "email": " Billing@Acme.TEST "})),
            BrandingUploads::default(),
            18.0,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(profile.business_name, "Acme Studio");
        assert_eq!(profile.email, "billing@acme.test");
        assert_eq!(profile.default_tax_percent, 18.0);
        assert!(profile.logo_url.is_none());
    }

    #[test]
    fn numeric_contact_fields_are_kept_as_text() {
        let profile = BusinessProfile::create(
            "user_1",
            fields(json!({"businessName": 42, "phone": 9876543210u64, "gst": false})),
            BrandingUploads::default(),
            18.0,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(profile.business_name, "42");
        assert_eq!(profile.phone, "9876543210");
        assert_eq!(profile.gst, "false");
    }

    #[test]
    fn business_name_is_required() {
        let result = BusinessProfile::create(
            "user_1",
            fields(json!({"email": "a@b.test"})),
            BrandingUploads::default(),
            18.0,
            Utc::now(),
        );
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn tax_percent_outside_range_is_rejected() {
        let result = BusinessProfile::create(
            "user_1",
            fields(json!({"businessName": "Acme", "defaultTaxPercent": "150"})),
            BrandingUploads::default(),
            18.0,
            Utc::now(),
        );
        assert!(matches!(result, Err(AppError::ValidationError(_))));
    }

    #[test]
    fn patch_reports_replaced_uploads() {
        let mut profile = BusinessProfile::create(
            "user_1",
            fields(json!({"businessName": "Acme"})),
            BrandingUploads {
                logo: Some("http://localhost:4000/uploads/old.png".to_string()),
                ..Default::default()
            },
            18.0,
            Utc::now(),
        )
        .unwrap();

        let replaced = profile
            .apply_patch(
                fields(json!({"phone": "555-0100", "defaultTaxPercent": 5})),
                BrandingUploads {
                    logo: Some("http://localhost:4000/uploads/new.png".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .unwrap();

        assert_eq!(replaced, vec!["http://localhost:4000/uploads/old.png".to_string()]);
        assert_eq!(profile.logo_url.as_deref(), Some("http://localhost:4000/uploads/new.png"));
        assert_eq!(profile.phone, "555-0100");
        assert_eq!(profile.default_tax_percent, 5.0);
        assert_eq!(profile.business_name, "Acme");
    }
}
