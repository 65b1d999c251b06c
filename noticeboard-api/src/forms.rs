/// Form parsing and validation
///
/// Each form type exposes `validate()`, returning either the validated
/// values (the draft that enters a confirm flow) or a structured set of
/// messages. Errors are field-scoped except cross-field mismatches, which
/// attach to the form as a whole. Validation never panics and performs no
/// IO, so every rule is unit-testable.
///
/// Wire field names (`_save`, `_cancel`, `passwordConfirm`, `post_status`,
/// `csv_file`) match the templates of the admin UI this backend serves.

use bytes::Bytes;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::ValidateEmail;

use noticeboard_shared::models::post::PostDraft;
use noticeboard_shared::models::post::PostStatus;
use noticeboard_shared::models::user::{Role, UserDraft, UserSearch};

use crate::error::ApiError;

/// A message attached to one input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Validation outcome of a submitted form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormErrors {
    /// Field-scoped messages
    pub fields: Vec<FieldError>,

    /// Form-scoped messages (cross-field rules, commit failures)
    pub form: Vec<String>,
}

impl FormErrors {
    pub fn add_field(&mut self, field: &str, message: &str) {
        self.fields.push(FieldError {
            field: field.to_string(),
            message: message.to_string(),
        });
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form.push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.form.is_empty()
    }

    /// A single form-scoped message (commit-time conflicts, upload failures)
    pub fn form_level(message: impl Into<String>) -> Self {
        let mut errors = Self::default();
        errors.add_form(message);
        errors
    }
}

/// Which submit button drove a POST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormIntent {
    Save,
    Cancel,
}

/// Decodes the `_save`/`_cancel` submit buttons
pub fn intent(save: Option<&str>, cancel: Option<&str>) -> Option<FormIntent> {
    if save.is_some() {
        Some(FormIntent::Save)
    } else if cancel.is_some() {
        Some(FormIntent::Cancel)
    } else {
        None
    }
}

/// Trims a submitted value, mapping blank to absent
fn cleaned(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Parses the role select; unknown values fall back to the restricted role
pub fn parse_role(raw: Option<&str>) -> Role {
    match raw.map(str::trim) {
        Some("0") | Some("admin") | Some("Admin") => Role::Admin,
        _ => Role::User,
    }
}

fn parse_date(
    raw: Option<&str>,
    field: &str,
    errors: &mut FormErrors,
) -> Option<NaiveDate> {
    let raw = cleaned(raw)?;
    match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add_field(field, "Enter a valid date.");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Login / signup / password reset
// ---------------------------------------------------------------------------

/// Login form body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub password: String,

    /// Where to go after a successful login
    #[serde(default)]
    pub next: Option<String>,
}

/// Signup form body
#[derive(Debug, Clone, Deserialize)]
pub struct SignupForm {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub password_confirmation: Option<String>,
}

/// Validated signup values
#[derive(Debug, Clone, PartialEq)]
pub struct Signup {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupForm {
    pub fn validate(&self) -> Result<Signup, FormErrors> {
        let mut errors = FormErrors::default();

        let name = cleaned(self.name.as_deref());
        let email = cleaned(self.email.as_deref());
        let password = cleaned(self.password.as_deref());
        let confirmation = cleaned(self.password_confirmation.as_deref());

        if name.is_none() {
            errors.add_field("name", "Name can't be blank");
        }
        match &email {
            None => errors.add_field("email", "E-Mail can't be blank"),
            Some(email) if !email.validate_email() => {
                errors.add_field("email", "Enter a valid email address.")
            }
            Some(_) => {}
        }
        if password.is_none() {
            errors.add_field("password", "Password can't be blank");
        }
        if confirmation.is_none() {
            errors.add_field("password_confirmation", "Password confirmation can't be blank");
        }
        if let (Some(password), Some(confirmation)) = (&password, &confirmation) {
            if password != confirmation {
                errors.add_form("password and password confirmation must be match.");
            }
        }

        match (name, email, password) {
            (Some(name), Some(email), Some(password)) if errors.is_empty() => Ok(Signup {
                name,
                email,
                password,
            }),
            _ => Err(errors),
        }
    }
}

/// Password-reset form body
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordResetForm {
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub new_password: Option<String>,

    #[serde(default)]
    pub new_password_confirm: Option<String>,
}

/// Validated password-reset values
#[derive(Debug, Clone, PartialEq)]
pub struct PasswordReset {
    pub current: String,
    pub new: String,
}

impl PasswordResetForm {
    pub fn validate(&self) -> Result<PasswordReset, FormErrors> {
        let mut errors = FormErrors::default();

        let current = cleaned(self.password.as_deref());
        let new = cleaned(self.new_password.as_deref());
        let confirm = cleaned(self.new_password_confirm.as_deref());

        if current.is_none() {
            errors.add_field("password", "Password can't be blank");
        }
        if new.is_none() {
            errors.add_field("new_password", "New password can't be blank");
        }
        if confirm.is_none() {
            errors.add_field("new_password_confirm", "New confirm password can't be blank");
        }
        if let (Some(new), Some(confirm)) = (&new, &confirm) {
            if new != confirm {
                errors.add_field(
                    "new_password_confirm",
                    "New password and new password confirmation is not match.",
                );
            }
        }

        match (current, new) {
            (Some(current), Some(new)) if errors.is_empty() => {
                Ok(PasswordReset { current, new })
            }
            _ => Err(errors),
        }
    }
}

// ---------------------------------------------------------------------------
// Post forms
// ---------------------------------------------------------------------------

/// Post list form body: a search or a jump to the create page
#[derive(Debug, Clone, Deserialize)]
pub struct PostListForm {
    #[serde(rename = "_search", default)]
    pub search: Option<String>,

    #[serde(rename = "_create", default)]
    pub create: Option<String>,

    #[serde(default)]
    pub keyword: Option<String>,
}

/// Post create/edit form body
#[derive(Debug, Clone, Deserialize)]
pub struct PostEditorForm {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    /// Status checkbox; absent means inactive
    #[serde(default)]
    pub post_status: Option<String>,

    #[serde(rename = "_save", default)]
    pub save: Option<String>,

    #[serde(rename = "_cancel", default)]
    pub cancel: Option<String>,
}

const POST_DESCRIPTION_MAX: usize = 255;

impl PostEditorForm {
    pub fn intent(&self) -> Option<FormIntent> {
        intent(self.save.as_deref(), self.cancel.as_deref())
    }

    /// Validates the post fields and decodes the status checkbox
    ///
    /// The checkbox decision is made here, once; the resulting status
    /// travels inside the draft and is never re-derived from the form.
    pub fn validate(&self) -> Result<PostDraft, FormErrors> {
        let mut errors = FormErrors::default();

        let title = cleaned(self.title.as_deref());
        let description = cleaned(self.description.as_deref());

        if title.is_none() {
            errors.add_field("title", "Title can't be blank");
        }
        match &description {
            None => errors.add_field("description", "Description can't be blank"),
            Some(description) if description.chars().count() > POST_DESCRIPTION_MAX => {
                errors.add_field("description", "255 characters is maximum allowed.")
            }
            Some(_) => {}
        }

        match (title, description) {
            (Some(title), Some(description)) if errors.is_empty() => Ok(PostDraft {
                title,
                description,
                status: PostStatus::from_checkbox(self.post_status.is_some()),
            }),
            _ => Err(errors),
        }
    }
}

// ---------------------------------------------------------------------------
// User search
// ---------------------------------------------------------------------------

/// User list search form body
#[derive(Debug, Clone, Deserialize)]
pub struct UserSearchForm {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub from_date: Option<String>,

    #[serde(default)]
    pub to_date: Option<String>,
}

impl UserSearchForm {
    /// All search fields are optional; only the dates can fail to parse
    pub fn validate(&self) -> Result<UserSearch, FormErrors> {
        let mut errors = FormErrors::default();

        let search = UserSearch {
            name: cleaned(self.name.as_deref()),
            email: cleaned(self.email.as_deref()),
            from_date: parse_date(self.from_date.as_deref(), "from_date", &mut errors),
            to_date: parse_date(self.to_date.as_deref(), "to_date", &mut errors),
        };

        if errors.is_empty() {
            Ok(search)
        } else {
            Err(errors)
        }
    }
}

// ---------------------------------------------------------------------------
// User create / edit (multipart)
// ---------------------------------------------------------------------------

/// One uploaded file from a multipart submission
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Original filename as submitted by the browser
    pub filename: String,

    /// Declared content type, if any
    pub content_type: Option<String>,

    pub bytes: Bytes,
}

/// A parsed multipart form: text fields plus uploaded files
///
/// File parts with an empty filename (an untouched `<input type="file">`)
/// count as absent.
#[derive(Debug, Default)]
pub struct MultipartForm {
    fields: HashMap<String, String>,
    files: HashMap<String, UploadedFile>,
}

impl MultipartForm {
    /// Drains an axum multipart body into memory
    pub async fn parse(mut multipart: axum::extract::Multipart) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
        {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(filename) if !filename.is_empty() => {
                    let content_type = field.content_type().map(str::to_string);
                    let bytes = field.bytes().await.map_err(|e| {
                        ApiError::BadRequest(format!("Failed to read upload: {}", e))
                    })?;
                    form.files.insert(
                        name,
                        UploadedFile {
                            filename,
                            content_type,
                            bytes,
                        },
                    );
                }
                _ => {
                    let text = field.text().await.map_err(|e| {
                        ApiError::BadRequest(format!("Failed to read field: {}", e))
                    })?;
                    form.fields.insert(name, text);
                }
            }
        }

        Ok(form)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    pub fn intent(&self) -> Option<FormIntent> {
        intent(self.text("_save"), self.text("_cancel"))
    }

    #[cfg(test)]
    pub fn from_fields<const N: usize>(fields: [(&str, &str); N]) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            files: HashMap::new(),
        }
    }
}

/// Validates the user-create form fields
///
/// The profile image is checked separately by the create flow (it is
/// required there but lives outside the text fields).
pub fn validate_user_create(form: &MultipartForm) -> Result<UserDraft, FormErrors> {
    let mut errors = FormErrors::default();

    let name = cleaned(form.text("name"));
    let email = cleaned(form.text("email"));
    let password = cleaned(form.text("password"));
    let confirmation = cleaned(form.text("passwordConfirm"));

    if name.is_none() {
        errors.add_field("name", "Name can't be blank");
    }
    match &email {
        None => errors.add_field("email", "E-Mail can't be blank"),
        Some(email) if !email.validate_email() => {
            errors.add_field("email", "Enter a valid email address.")
        }
        Some(_) => {}
    }
    if password.is_none() {
        errors.add_field("password", "Password can't be blank");
    }
    if confirmation.is_none() {
        errors.add_field("passwordConfirm", "Password confirmation can't be blank");
    }
    if let (Some(password), Some(confirmation)) = (&password, &confirmation) {
        if password != confirmation {
            errors.add_form("password and password confirmation must be match.");
        }
    }

    let date_of_birth = parse_date(form.text("dob"), "dob", &mut errors);

    match (name, email) {
        (Some(name), Some(email)) if errors.is_empty() => Ok(UserDraft {
            name,
            email,
            password,
            role: parse_role(form.text("type")),
            phone: cleaned(form.text("phone")),
            date_of_birth,
            address: cleaned(form.text("address")),
        }),
        _ => Err(errors),
    }
}

/// Validates the user-edit form fields
///
/// No password is carried into the draft; the edit flow never rewrites
/// credentials. The pair is still checked for consistency when both fields
/// were filled in.
pub fn validate_user_edit(form: &MultipartForm) -> Result<UserDraft, FormErrors> {
    let mut errors = FormErrors::default();

    let name = cleaned(form.text("name"));
    let email = cleaned(form.text("email"));

    if name.is_none() {
        errors.add_field("name", "Name can't be blank");
    }
    match &email {
        None => errors.add_field("email", "E-Mail can't be blank"),
        Some(email) if !email.validate_email() => {
            errors.add_field("email", "Enter a valid email address.")
        }
        Some(_) => {}
    }

    let password = cleaned(form.text("password"));
    let confirmation = cleaned(form.text("passwordConfirm"));
    if let (Some(password), Some(confirmation)) = (&password, &confirmation) {
        if password != confirmation {
            errors.add_form("password and password confirmation must be match.");
        }
    }

    let date_of_birth = parse_date(form.text("dob"), "dob", &mut errors);

    match (name, email) {
        (Some(name), Some(email)) if errors.is_empty() => Ok(UserDraft {
            name,
            email,
            password: None,
            role: parse_role(form.text("type")),
            phone: cleaned(form.text("phone")),
            date_of_birth,
            address: cleaned(form.text("address")),
        }),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_field_error(errors: &FormErrors, field: &str, message: &str) -> bool {
        errors
            .fields
            .iter()
            .any(|e| e.field == field && e.message == message)
    }

    #[test]
    fn test_intent_decoding() {
        assert_eq!(intent(Some(""), None), Some(FormIntent::Save));
        assert_eq!(intent(None, Some("")), Some(FormIntent::Cancel));
        assert_eq!(intent(Some(""), Some("")), Some(FormIntent::Save));
        assert_eq!(intent(None, None), None);
    }

    #[test]
    fn test_post_form_valid() {
        let form = PostEditorForm {
            title: Some("A title".to_string()),
            description: Some("A description".to_string()),
            post_status: None,
            save: Some("".to_string()),
            cancel: None,
        };

        let draft = form.validate().expect("valid form");
        assert_eq!(draft.title, "A title");
        assert_eq!(draft.description, "A description");
        assert_eq!(draft.status, PostStatus::Inactive);
    }

    #[test]
    fn test_post_form_checkbox_presence_means_active() {
        let form = PostEditorForm {
            title: Some("t".to_string()),
            description: Some("d".to_string()),
            post_status: Some("on".to_string()),
            save: None,
            cancel: None,
        };

        assert_eq!(form.validate().unwrap().status, PostStatus::Active);
    }

    #[test]
    fn test_post_form_blank_title() {
        let form = PostEditorForm {
            title: Some("   ".to_string()),
            description: Some("d".to_string()),
            post_status: None,
            save: None,
            cancel: None,
        };

        let errors = form.validate().unwrap_err();
        assert!(has_field_error(&errors, "title", "Title can't be blank"));
    }

    #[test]
    fn test_post_form_description_too_long() {
        let form = PostEditorForm {
            title: Some("t".to_string()),
            description: Some("x".repeat(256)),
            post_status: None,
            save: None,
            cancel: None,
        };

        let errors = form.validate().unwrap_err();
        assert!(has_field_error(
            &errors,
            "description",
            "255 characters is maximum allowed."
        ));

        // Exactly 255 characters is fine.
        let form = PostEditorForm {
            title: Some("t".to_string()),
            description: Some("x".repeat(255)),
            post_status: None,
            save: None,
            cancel: None,
        };
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_post_form_both_fields_blank() {
        let form = PostEditorForm {
            title: None,
            description: None,
            post_status: None,
            save: None,
            cancel: None,
        };

        let errors = form.validate().unwrap_err();
        assert_eq!(errors.fields.len(), 2);
    }

    #[test]
    fn test_signup_valid() {
        let form = SignupForm {
            name: Some("New User".to_string()),
            email: Some("new@example.com".to_string()),
            password: Some("secret123".to_string()),
            password_confirmation: Some("secret123".to_string()),
        };

        let signup = form.validate().expect("valid signup");
        assert_eq!(signup.email, "new@example.com");
    }

    #[test]
    fn test_signup_password_mismatch_is_form_scoped() {
        let form = SignupForm {
            name: Some("New User".to_string()),
            email: Some("new@example.com".to_string()),
            password: Some("secret123".to_string()),
            password_confirmation: Some("different".to_string()),
        };

        let errors = form.validate().unwrap_err();
        assert!(errors.fields.is_empty());
        assert_eq!(
            errors.form,
            vec!["password and password confirmation must be match.".to_string()]
        );
    }

    #[test]
    fn test_signup_invalid_email_format() {
        let form = SignupForm {
            name: Some("New User".to_string()),
            email: Some("not-an-email".to_string()),
            password: Some("secret123".to_string()),
            password_confirmation: Some("secret123".to_string()),
        };

        let errors = form.validate().unwrap_err();
        assert!(has_field_error(
            &errors,
            "email",
            "Enter a valid email address."
        ));
    }

    #[test]
    fn test_password_reset_all_blank() {
        let form = PasswordResetForm {
            password: None,
            new_password: None,
            new_password_confirm: None,
        };

        let errors = form.validate().unwrap_err();
        assert_eq!(errors.fields.len(), 3);
    }

    #[test]
    fn test_password_reset_mismatch_attaches_to_confirm_field() {
        let form = PasswordResetForm {
            password: Some("old".to_string()),
            new_password: Some("new1".to_string()),
            new_password_confirm: Some("new2".to_string()),
        };

        let errors = form.validate().unwrap_err();
        assert!(has_field_error(
            &errors,
            "new_password_confirm",
            "New password and new password confirmation is not match.",
        ));
    }

    #[test]
    fn test_user_search_dates() {
        let form = UserSearchForm {
            name: Some("  ".to_string()),
            email: None,
            from_date: Some("2023-01-15".to_string()),
            to_date: Some("".to_string()),
        };

        let search = form.validate().expect("valid search");
        assert!(search.name.is_none());
        assert_eq!(
            search.from_date,
            Some(NaiveDate::from_ymd_opt(2023, 1, 15).unwrap())
        );
        assert!(search.to_date.is_none());
    }

    #[test]
    fn test_user_search_bad_date() {
        let form = UserSearchForm {
            name: None,
            email: None,
            from_date: Some("15/01/2023".to_string()),
            to_date: None,
        };

        let errors = form.validate().unwrap_err();
        assert!(has_field_error(&errors, "from_date", "Enter a valid date."));
    }

    #[test]
    fn test_user_create_valid() {
        let form = MultipartForm::from_fields([
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("password", "pw123456"),
            ("passwordConfirm", "pw123456"),
            ("type", "0"),
            ("phone", "555-0100"),
            ("dob", "1990-06-01"),
            ("address", "1 Main St"),
        ]);

        let draft = validate_user_create(&form).expect("valid form");
        assert_eq!(draft.role, Role::Admin);
        assert_eq!(draft.password.as_deref(), Some("pw123456"));
        assert_eq!(
            draft.date_of_birth,
            Some(NaiveDate::from_ymd_opt(1990, 6, 1).unwrap())
        );
    }

    #[test]
    fn test_user_create_missing_required_fields() {
        let form = MultipartForm::from_fields([("phone", "555-0100")]);

        let errors = validate_user_create(&form).unwrap_err();
        assert!(has_field_error(&errors, "name", "Name can't be blank"));
        assert!(has_field_error(&errors, "email", "E-Mail can't be blank"));
        assert!(has_field_error(&errors, "password", "Password can't be blank"));
        assert!(has_field_error(
            &errors,
            "passwordConfirm",
            "Password confirmation can't be blank"
        ));
    }

    #[test]
    fn test_user_create_password_mismatch() {
        let form = MultipartForm::from_fields([
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("password", "one"),
            ("passwordConfirm", "two"),
        ]);

        let errors = validate_user_create(&form).unwrap_err();
        assert_eq!(
            errors.form,
            vec!["password and password confirmation must be match.".to_string()]
        );
    }

    #[test]
    fn test_user_edit_password_optional() {
        let form = MultipartForm::from_fields([
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("type", "1"),
        ]);

        let draft = validate_user_edit(&form).expect("valid form");
        assert!(draft.password.is_none());
        assert_eq!(draft.role, Role::User);
    }

    #[test]
    fn test_user_edit_filled_password_pair_must_match() {
        let form = MultipartForm::from_fields([
            ("name", "Alice"),
            ("email", "alice@example.com"),
            ("password", "one"),
            ("passwordConfirm", "two"),
        ]);

        let errors = validate_user_edit(&form).unwrap_err();
        assert!(!errors.form.is_empty());
    }

    #[test]
    fn test_parse_role_tokens() {
        assert_eq!(parse_role(Some("0")), Role::Admin);
        assert_eq!(parse_role(Some("admin")), Role::Admin);
        assert_eq!(parse_role(Some("1")), Role::User);
        assert_eq!(parse_role(Some("user")), Role::User);
        assert_eq!(parse_role(None), Role::User);
        assert_eq!(parse_role(Some("garbage")), Role::User);
    }
}
