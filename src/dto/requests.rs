use crate::store::Store;
use bytes::Bytes;
use serde::Deserialize;
use std::{borrow::Cow, collections::BTreeMap};
use validator::{Validate, ValidationError, ValidationErrors};

pub const REQUIRED_MESSAGE: &str = "Обязательное поле.";
pub const INVALID_CHOICE_MESSAGE: &str =
    "Выберите корректный вариант. Этого варианта нет среди допустимых значений.";
pub const INVALID_IMAGE_MESSAGE: &str = "Загрузите правильное изображение. Файл, который вы \
                                         загрузили, поврежден или не является изображением.";
pub const NON_FIELD_ERRORS: &str = "__all__";

/// Query parameters of every paginated listing. `page` is kept raw so that
/// garbage can fall back to the first page instead of failing extraction.
#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    pub page: Option<String>,
}

// ============================================================================
// FORM ERRORS
// ============================================================================

/// Field name -> messages, in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.fields
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn field(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn non_field(&self) -> &[String] {
        self.field(NON_FIELD_ERRORS)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<ValidationErrors> for FormErrors {
    fn from(errors: ValidationErrors) -> Self {
        let mut out = FormErrors::default();
        for (field, errs) in errors.field_errors() {
            for err in errs.iter() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| err.code.to_string());
                out.add(field.to_string(), message);
            }
        }
        out
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required").with_message(Cow::Borrowed(REQUIRED_MESSAGE)));
    }
    Ok(())
}

fn valid_username(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    let allowed = value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'));
    if !allowed {
        return Err(ValidationError::new("invalid_username").with_message(Cow::Borrowed(
            "Введите правильное имя пользователя. Оно может содержать только буквы, цифры и \
             знаки @/./+/-/_.",
        )));
    }
    Ok(())
}

// ============================================================================
// POSTS
// ============================================================================

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl ImageUpload {
    /// Browsers send an empty file part when nothing was picked.
    pub fn is_empty(&self) -> bool {
        self.filename.is_empty() && self.data.is_empty()
    }

    /// Extension must map to an image type, and the bytes must carry a known
    /// image signature.
    pub fn looks_like_image(&self) -> bool {
        let extension_ok = mime_guess::from_path(&self.filename)
            .first()
            .is_some_and(|mime| mime.type_() == mime_guess::mime::IMAGE);
        let declared_ok = self
            .content_type
            .as_deref()
            .is_none_or(|ct| ct.starts_with("image/") || ct == "application/octet-stream");
        extension_ok && declared_ok && has_image_signature(&self.data)
    }
}

fn has_image_signature(data: &[u8]) -> bool {
    const SIGNATURES: &[&[u8]] = &[
        b"GIF87a",
        b"GIF89a",
        b"\x89PNG\r\n\x1a\n",
        b"\xFF\xD8\xFF",
        b"BM",
        b"II*\x00",
        b"MM\x00*",
    ];
    if SIGNATURES.iter().any(|sig| data.starts_with(sig)) {
        return true;
    }
    data.len() >= 12 && &data[0..4] == b"RIFF" && &data[8..12] == b"WEBP"
}

/// Raw create/edit submission. Multipart bodies may carry an image;
/// urlencoded bodies never do.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct PostForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub text: String,
    /// Group id as submitted; empty means no group.
    #[serde(default)]
    pub group: Option<String>,
    #[serde(skip)]
    pub image: Option<ImageUpload>,
}

/// A post submission that passed validation.
#[derive(Debug, Clone)]
pub struct ValidPost {
    pub text: String,
    pub group_id: Option<u64>,
    pub image: Option<ImageUpload>,
}

impl PostForm {
    /// Validates every field and resolves the group against `store`.
    pub fn clean(&self, store: &Store) -> Result<ValidPost, FormErrors> {
        let mut errors = match self.validate() {
            Ok(()) => FormErrors::default(),
            Err(e) => FormErrors::from(e),
        };

        let group_id = match self.group.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<u64>().ok().and_then(|id| store.group(id)) {
                Some(group) => Some(group.id),
                None => {
                    errors.add("group", INVALID_CHOICE_MESSAGE);
                    None
                }
            },
        };

        let image = self.image.clone().filter(|upload| !upload.is_empty());
        if let Some(upload) = &image {
            if !upload.looks_like_image() {
                errors.add("image", INVALID_IMAGE_MESSAGE);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(ValidPost {
            text: self.text.trim().to_string(),
            group_id,
            image,
        })
    }

    pub fn selected_group(&self) -> Option<u64> {
        self.group.as_deref().and_then(|g| g.trim().parse().ok())
    }
}

// ============================================================================
// COMMENTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CommentForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub text: String,
}

// ============================================================================
// ACCOUNTS
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default)]
    #[validate(
        length(max = 150, message = "Убедитесь, что это значение содержит не более 150 символов."),
        custom(function = "valid_username")
    )]
    pub username: String,
    #[serde(default)]
    #[validate(email(message = "Введите правильный адрес электронной почты."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(
        min = 8,
        message = "Введённый пароль слишком короткий. Он должен содержать как минимум 8 символов."
    ))]
    pub password1: String,
    #[serde(default)]
    #[validate(must_match(other = "password1", message = "Введенные пароли не совпадают."))]
    pub password2: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub next: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SMALL_GIF: &[u8] = b"GIF89a\x02\x00\x01\x00\x80\x00\x00\x00\x00\x00\xFF\xFF\xFF\x21\xF9\x04\x00\x00\x00\x00\x00\x2C\x00\x00\x00\x00\x02\x00\x01\x00\x00\x02\x02\x0C\x0A\x00\x3B";

    fn gif() -> ImageUpload {
        ImageUpload {
            filename: "small.gif".into(),
            content_type: Some("image/gif".into()),
            data: Bytes::from_static(SMALL_GIF),
        }
    }

    #[test]
    fn empty_text_is_required() {
        let store = Store::new();
        for text in ["", "   \n"] {
            let form = PostForm {
                text: text.into(),
                ..Default::default()
            };
            let errors = form.clean(&store).unwrap_err();
            assert_eq!(errors.field("text"), [REQUIRED_MESSAGE.to_string()]);
        }
    }

    #[test]
    fn valid_form_trims_and_resolves_group() {
        let store = Store::new();
        let group = store.create_group("Cats", "cats", "").unwrap();
        let form = PostForm {
            text: "  hello  ".into(),
            group: Some(group.id.to_string()),
            image: Some(gif()),
        };

        let valid = form.clean(&store).unwrap();
        assert_eq!(valid.text, "hello");
        assert_eq!(valid.group_id, Some(group.id));
        assert!(valid.image.is_some());
    }

    #[test]
    fn unknown_group_is_an_invalid_choice() {
        let store = Store::new();
        let form = PostForm {
            text: "hello".into(),
            group: Some("42".into()),
            image: None,
        };
        let errors = form.clean(&store).unwrap_err();
        assert_eq!(errors.field("group"), [INVALID_CHOICE_MESSAGE.to_string()]);
    }

    #[test]
    fn blank_group_means_no_group() {
        let store = Store::new();
        let form = PostForm {
            text: "hello".into(),
            group: Some(String::new()),
            image: None,
        };
        assert_eq!(form.clean(&store).unwrap().group_id, None);
    }

    #[test]
    fn non_images_are_rejected() {
        let store = Store::new();
        let form = PostForm {
            text: "hello".into(),
            group: None,
            image: Some(ImageUpload {
                filename: "notes.txt".into(),
                content_type: Some("text/plain".into()),
                data: Bytes::from_static(b"just text"),
            }),
        };
        let errors = form.clean(&store).unwrap_err();
        assert_eq!(errors.field("image"), [INVALID_IMAGE_MESSAGE.to_string()]);
    }

    #[test]
    fn image_with_fake_signature_is_rejected() {
        let upload = ImageUpload {
            filename: "fake.png".into(),
            content_type: Some("image/png".into()),
            data: Bytes::from_static(b"not really a png"),
        };
        assert!(!upload.looks_like_image());
        assert!(gif().looks_like_image());
    }

    #[test]
    fn empty_file_part_is_ignored() {
        let store = Store::new();
        let form = PostForm {
            text: "hello".into(),
            group: None,
            image: Some(ImageUpload {
                filename: String::new(),
                content_type: Some("application/octet-stream".into()),
                data: Bytes::new(),
            }),
        };
        assert!(form.clean(&store).unwrap().image.is_none());
    }

    #[test]
    fn comment_text_is_required() {
        let form = CommentForm { text: " ".into() };
        let errors = FormErrors::from(form.validate().unwrap_err());
        assert_eq!(errors.field("text"), [REQUIRED_MESSAGE.to_string()]);
    }

    #[test]
    fn signup_checks_each_field() {
        let form = SignupForm {
            username: "bad name!".into(),
            email: "nope".into(),
            password1: "short".into(),
            password2: "different".into(),
        };
        let errors = FormErrors::from(form.validate().unwrap_err());
        assert!(!errors.field("username").is_empty());
        assert!(!errors.field("email").is_empty());
        assert!(!errors.field("password1").is_empty());
        assert!(!errors.field("password2").is_empty());
    }

    #[test]
    fn signup_accepts_reasonable_input() {
        let form = SignupForm {
            username: "leo.tolstoy".into(),
            email: "leo@example.com".into(),
            password1: "war-and-peace".into(),
            password2: "war-and-peace".into(),
        };
        assert!(form.validate().is_ok());
    }
}
