//! Request/response structs and payload normalization.

use crate::LifelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of emergency contacts per user.
pub const MAX_CONTACTS: usize = 5;

/// Identity facts used for both registration and login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityFacts {
    /// Full name, matched case-insensitively on login.
    pub full_name: String,
    /// Date of birth as `YYYY-MM-DD`.
    pub date_of_birth: String,
    /// Phone number in international format (e.g. "+11234567890").
    pub phone_number: String,
}

impl IdentityFacts {
    /// Construct identity facts.
    pub fn new(
        full_name: impl Into<String>,
        date_of_birth: impl Into<String>,
        phone_number: impl Into<String>,
    ) -> Self {
        Self {
            full_name: full_name.into(),
            date_of_birth: date_of_birth.into(),
            phone_number: phone_number.into(),
        }
    }

    /// Reject obviously incomplete input before any network call.
    pub fn validate(&self) -> Result<(), LifelineError> {
        if self.full_name.trim().is_empty() {
            return Err(validation("Full name is required."));
        }
        if chrono::NaiveDate::parse_from_str(&self.date_of_birth, "%Y-%m-%d").is_err() {
            return Err(validation("Date of birth must be a valid YYYY-MM-DD date."));
        }
        validate_phone(&self.phone_number)
    }

    /// Profile form of these facts. Date of birth is dropped.
    pub fn to_profile(&self, id: Option<String>) -> UserProfile {
        UserProfile {
            id,
            full_name: self.full_name.clone(),
            phone_number: self.phone_number.clone(),
        }
    }
}

/// Cached user profile. Never carries a date of birth or password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// Server id, absent for profiles built locally.
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display name.
    pub full_name: String,
    /// Phone number in international format.
    pub phone_number: String,
}

/// Raw auth response as sent by the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAuthResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
    #[serde(default)]
    user: Option<UserProfile>,
}

/// Successful login/register result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    /// Opaque bearer token.
    pub token: String,
    /// Credential lifetime in seconds, if the server sent one.
    pub expires_in: Option<u64>,
    /// Profile returned alongside the token.
    pub user: Option<UserProfile>,
}

/// Parse an auth response body. A missing or empty token is a hard failure.
pub fn parse_auth_response(body: &[u8]) -> Result<AuthResponse, LifelineError> {
    let raw: RawAuthResponse = serde_json::from_slice(body)
        .map_err(|e| LifelineError::InvalidResponse(format!("Failed to parse auth response: {}", e)))?;

    let token = raw
        .token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| LifelineError::InvalidResponse("auth response missing token".to_string()))?;

    Ok(AuthResponse {
        token,
        expires_in: raw.expires_in,
        user: raw.user,
    })
}

/// Emergency contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    /// Server-assigned id.
    #[serde(alias = "_id")]
    pub id: String,
    /// Contact name.
    pub name: String,
    /// Phone number in international format.
    pub phone_number: String,
    /// Creation time, when the server reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Contact creation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewContact {
    /// Contact name.
    pub name: String,
    /// Phone number in international format.
    pub phone_number: String,
}

impl NewContact {
    /// Construct a contact request.
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone_number: phone_number.into(),
        }
    }

    /// Reject incomplete input before any network call.
    pub fn validate(&self) -> Result<(), LifelineError> {
        if self.name.trim().is_empty() {
            return Err(validation("Contact name is required."));
        }
        validate_phone(&self.phone_number)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartialContact {
    #[serde(default, alias = "_id")]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    phone_number: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CreateContactResponse {
    #[serde(default)]
    contact: Option<PartialContact>,
    #[serde(flatten)]
    fields: PartialContact,
}

/// Normalize a contact creation response.
///
/// Accepts `{contact: {...}}` or a bare contact object; missing name or
/// phone are taken from the request. A missing id is an error: the server
/// id is the only handle usable for deletion.
pub fn parse_created_contact(body: &[u8], request: &NewContact) -> Result<Contact, LifelineError> {
    let response: CreateContactResponse = serde_json::from_slice(body)
        .map_err(|e| LifelineError::InvalidResponse(format!("Failed to parse contact: {}", e)))?;

    let partial = response.contact.unwrap_or(response.fields);
    let id = partial
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| LifelineError::InvalidResponse("created contact has no id".to_string()))?;

    Ok(Contact {
        id,
        name: partial.name.unwrap_or_else(|| request.name.clone()),
        phone_number: partial
            .phone_number
            .unwrap_or_else(|| request.phone_number.clone()),
        created_at: partial.created_at,
    })
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ContactListResponse {
    Bare(Vec<Contact>),
    Wrapped { contacts: Vec<Contact> },
    Data { data: Vec<Contact> },
}

/// Parse a contact list in any of the shapes the API has used.
pub fn parse_contact_list(body: &[u8]) -> Result<Vec<Contact>, LifelineError> {
    let response: ContactListResponse = serde_json::from_slice(body)
        .map_err(|e| LifelineError::InvalidResponse(format!("Failed to parse contacts: {}", e)))?;

    Ok(match response {
        ContactListResponse::Bare(list)
        | ContactListResponse::Wrapped { contacts: list }
        | ContactListResponse::Data { data: list } => list,
    })
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Extract a server-provided error message from a response body.
pub fn extract_error_message(body: &[u8]) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_slice(body).ok()?;
    parsed
        .message
        .or(parsed.error)
        .filter(|m| !m.trim().is_empty())
}

fn validate_phone(phone: &str) -> Result<(), LifelineError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let well_formed = phone.starts_with('+')
        && (7..=15).contains(&digits.len())
        && digits.chars().all(|c| c.is_ascii_digit());
    if well_formed {
        Ok(())
    } else {
        Err(validation(
            "Phone number must be in international format, e.g. +11234567890.",
        ))
    }
}

fn validation(message: &str) -> LifelineError {
    LifelineError::invalid_input(message)
}
