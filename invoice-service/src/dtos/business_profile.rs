use crate::models::BusinessProfile;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessProfileResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
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
    pub default_tax_percent: f64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<BusinessProfile> for BusinessProfileResponse {
    fn from(profile: BusinessProfile) -> Self {
        Self {
            id: profile.id,
            owner: profile.owner,
            business_name: profile.business_name,
            email: profile.email,
            address: profile.address,
            phone: profile.phone,
            gst: profile.gst,
            logo_url: profile.logo_url,
            stamp_url: profile.stamp_url,
            signature_url: profile.signature_url,
            signature_owner_name: profile.signature_owner_name,
            signature_owner_title: profile.signature_owner_title,
            default_tax_percent: profile.default_tax_percent,
            created_at: profile.created_at.to_rfc3339(),
            updated_at: profile.updated_at.to_rfc3339(),
        }
    }
}
