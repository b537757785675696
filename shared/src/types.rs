use crate::roles::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ========== IDENTITY ==========
/// Authentication identity as returned by the platform account API
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Identity {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    /// Token presented on later calls; only filled for server-created sessions
    #[serde(default, skip_serializing)]
    pub secret: String,
    #[serde(default)]
    pub expire: String,
}

// ========== PROFILE ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserProfile {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(rename = "$permissions", default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    #[serde(rename = "$collectionId", default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    #[serde(rename = "$databaseId", default, skip_serializing_if = "Option::is_none")]
    pub database_id: Option<String>,
}

/// Attributes written when a profile is first created
#[derive(Debug, Serialize, Clone)]
pub struct NewProfile {
    #[serde(rename = "userId")]
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdateProfileRequest {
    pub name: String,
}

// ========== ACTIVITY ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Activity {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName", default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NewActivity {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    pub category: String,
    pub description: String,
    pub date: String,
}

/// Body accepted from forms and the JSON API; ownership is filled in server-side
#[derive(Debug, Deserialize, Clone)]
pub struct CreateActivityRequest {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct UpdateActivityRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

// ========== LISTS ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DocumentList<T> {
    pub total: u64,
    pub documents: Vec<T>,
}

// ========== STATS ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct MostActiveIntern {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "userName")]
    pub user_name: String,
    pub count: u64,
}

pub type CategoryDistribution = BTreeMap<String, u64>;

/// Everything the manager dashboard shows. Each figure is independent, so a
/// failed one is `None` rather than failing the whole page.
#[derive(Debug, Serialize, Clone, Default)]
pub struct DashboardStats {
    pub total_interns: Option<u64>,
    pub today_active_interns: Option<u64>,
    pub total_activities: Option<u64>,
    pub most_active_intern: Option<MostActiveIntern>,
    pub category_distribution: Option<CategoryDistribution>,
    /// Set when the activity scan stopped at the configured cap
    pub truncated: bool,
}
