use serde::{Deserialize, Serialize};

/// The social profile of a Garmin Connect user.
///
/// The sign-in handshake scrapes this record for the authenticated user from
/// the activation page; it doubles as the response shape of the
/// `socialProfile` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "profileId", default)]
    pub profile_id: i64,
    #[serde(rename = "connectionRequestId", default)]
    pub connection_request_id: Option<i64>,
    #[serde(rename = "garminGUID", default)]
    pub garmin_guid: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: String,
    #[serde(rename = "fullName", default)]
    pub full_name: String,
    #[serde(rename = "userName", default)]
    pub user_name: Option<String>,
    #[serde(rename = "profileImageUrlLarge", default)]
    pub profile_image_url_large: Option<String>,
    #[serde(rename = "profileImageUrlMedium", default)]
    pub profile_image_url_medium: Option<String>,
    #[serde(rename = "profileImageUrlSmall", default)]
    pub profile_image_url_small: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(rename = "favoriteActivityTypes", default)]
    pub favorite_activity_types: Vec<String>,
    #[serde(rename = "userRoles", default)]
    pub user_roles: Vec<String>,
    #[serde(rename = "userProfileFullName", default)]
    pub user_profile_full_name: Option<String>,
    #[serde(rename = "userLevel", default)]
    pub user_level: Option<i64>,
    #[serde(rename = "userPoint", default)]
    pub user_point: Option<i64>,
}

impl Profile {
    /// Name to show for the user, falling back to the display name
    pub fn name(&self) -> &str {
        if self.full_name.is_empty() {
            &self.display_name
        } else {
            &self.full_name
        }
    }
}
