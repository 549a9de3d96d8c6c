use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    constants::CONTACT_SENT_MESSAGE,
    errors::IntakeError,
    validation::{sanitize, validate_email, validate_required},
};

/// Raw contact form as posted by the browser. Every field is optional so
/// a missing key and an empty string fail the same required-fields check.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub subject: Option<String>,

    #[serde(default)]
    pub message: Option<String>,
}

/// A form that passed the required-fields and email-shape checks.
/// Values are still exactly what the user typed.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedContact {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

impl TryFrom<ContactForm> for ValidatedContact {
    type Error = IntakeError;

    fn try_from(form: ContactForm) -> Result<Self, Self::Error> {
        if !validate_required(&form) {
            return Err(IntakeError::MissingFields);
        }

        let ContactForm { name, email, subject, message } = form;
        let (Some(name), Some(email), Some(subject), Some(message)) = (name, email, subject, message)
        else {
            return Err(IntakeError::MissingFields);
        };

        if !validate_email(&email) {
            return Err(IntakeError::InvalidEmail);
        }

        Ok(ValidatedContact { name, email, subject, message })
    }
}

/// The record written to the `contacts` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactSubmission {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
}

impl ContactSubmission {
    /// Sanitizes every text field of a validated form into a new, unread record.
    pub fn from_validated(contact: ValidatedContact, user_id: Option<Uuid>) -> Self {
        ContactSubmission {
            name: sanitize(&contact.name),
            email: sanitize(&contact.email),
            subject: sanitize(&contact.subject),
            message: sanitize(&contact.message),
            read: false,
            created_at: Utc::now(),
            user_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ContactResponse {
    pub message: String,
}

impl ContactResponse {
    pub fn sent() -> Self {
        ContactResponse {
            message: CONTACT_SENT_MESSAGE.to_string(),
        }
    }
}
