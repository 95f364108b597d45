use image::ImageFormat;
use serde::Deserialize;

use super::{clean_text, FormErrors, REQUIRED};

pub const DESCRIPTION_MAX: usize = 500;
pub const CONTENT_MAX: usize = 500;

const INVALID_IMAGE: &str =
    "Upload a valid image. The file you uploaded was either not an image or a corrupted image.";
const EMPTY_FILE: &str = "The submitted file is empty.";

/// Raw file part of a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct UploadedFile {
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
}

/// Photo upload: the `path` file part plus a `description` text part.
#[derive(Debug, Default)]
pub struct AddPhotoForm {
    pub path: Option<UploadedFile>,
    pub description: Option<String>,
}

/// An upload whose bytes decoded as an image.
#[derive(Debug)]
pub struct ValidImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
}

impl ValidImage {
    /// Canonical file extension for the detected format.
    pub fn extension(&self) -> &'static str {
        self.format.extensions_str().first().copied().unwrap_or("img")
    }
}

#[derive(Debug)]
pub struct NewPhoto {
    pub image: ValidImage,
    pub description: String,
}

impl AddPhotoForm {
    pub fn validate(self) -> Result<NewPhoto, FormErrors> {
        let mut errors = FormErrors::new();
        let description = clean_text(
            &mut errors,
            "description",
            self.description,
            DESCRIPTION_MAX,
            true,
        );

        let image = match self.path {
            None => {
                errors.add("path", REQUIRED);
                None
            }
            Some(file) if file.bytes.is_empty() => {
                // Browsers send an empty part with no name when nothing was picked.
                if file.file_name.as_deref().unwrap_or("").is_empty() {
                    errors.add("path", REQUIRED);
                } else {
                    errors.add("path", EMPTY_FILE);
                }
                None
            }
            Some(file) => match decode_image(file.bytes) {
                Some(image) => Some(image),
                None => {
                    errors.add("path", INVALID_IMAGE);
                    None
                }
            },
        };

        match image {
            Some(image) if errors.is_empty() => Ok(NewPhoto { image, description }),
            _ => Err(errors),
        }
    }
}

/// Sniff the format and fully decode, so truncated files are rejected too.
fn decode_image(bytes: Vec<u8>) -> Option<ValidImage> {
    let format = image::guess_format(&bytes).ok()?;
    image::load_from_memory_with_format(&bytes, format).ok()?;
    Some(ValidImage { bytes, format })
}

#[derive(Debug, Default, Deserialize)]
pub struct EditPhotoForm {
    pub description: Option<String>,
}

impl EditPhotoForm {
    /// The new description.
    pub fn validate(self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let description = clean_text(
            &mut errors,
            "description",
            self.description,
            DESCRIPTION_MAX,
            true,
        );
        errors.finish(description)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentCreationForm {
    pub content: Option<String>,
}

impl CommentCreationForm {
    /// The comment text.
    pub fn validate(self) -> Result<String, FormErrors> {
        let mut errors = FormErrors::new();
        let content = clean_text(&mut errors, "content", self.content, CONTENT_MAX, false);
        errors.finish(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        image::DynamicImage::new_rgb8(2, 2)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn upload(bytes: Vec<u8>) -> Option<UploadedFile> {
        Some(UploadedFile {
            file_name: Some("image.png".into()),
            bytes,
        })
    }

    #[test]
    fn valid_add_photo_form() {
        let form = AddPhotoForm {
            path: upload(png_bytes()),
            description: Some("This is description of another image".into()),
        };
        let photo = form.validate().unwrap();
        assert_eq!(photo.image.format, ImageFormat::Png);
        assert_eq!(photo.image.extension(), "png");
        assert_eq!(photo.description, "This is description of another image");
    }

    #[test]
    fn add_photo_form_without_image_is_invalid() {
        let form = AddPhotoForm {
            path: None,
            description: Some("This is description of another image".into()),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("path"), [REQUIRED.to_string()]);
    }

    #[test]
    fn add_photo_form_rejects_non_images() {
        let form = AddPhotoForm {
            path: upload(b"definitely not a picture".to_vec()),
            description: Some(String::new()),
        };
        let errors = form.validate().unwrap_err();
        assert_eq!(errors.get("path"), [INVALID_IMAGE.to_string()]);
    }

    #[test]
    fn add_photo_form_rejects_truncated_image() {
        let mut bytes = png_bytes();
        bytes.truncate(bytes.len() / 2);
        let form = AddPhotoForm {
            path: upload(bytes),
            description: Some(String::new()),
        };
        assert!(form.validate().unwrap_err().has("path"));
    }

    #[test]
    fn add_photo_form_distinguishes_empty_file_from_no_file() {
        let named = AddPhotoForm {
            path: upload(Vec::new()),
            description: Some(String::new()),
        };
        assert_eq!(
            named.validate().unwrap_err().get("path"),
            [EMPTY_FILE.to_string()]
        );

        let unnamed = AddPhotoForm {
            path: Some(UploadedFile::default()),
            description: Some(String::new()),
        };
        assert_eq!(
            unnamed.validate().unwrap_err().get("path"),
            [REQUIRED.to_string()]
        );
    }

    #[test]
    fn add_photo_form_limits_description() {
        let form = AddPhotoForm {
            path: upload(png_bytes()),
            description: Some("x".repeat(DESCRIPTION_MAX + 1)),
        };
        let errors = form.validate().unwrap_err();
        assert!(errors.has("description"));
        assert!(!errors.has("path"));
    }

    #[test]
    fn valid_edit_photo_form() {
        let form = EditPhotoForm {
            description: Some("New description".into()),
        };
        assert_eq!(form.validate().unwrap(), "New description");
    }

    #[test]
    fn edit_photo_form_with_wrong_field_name_is_invalid() {
        // Unknown keys are dropped during deserialization.
        let form = EditPhotoForm::default();
        assert!(form.validate().unwrap_err().has("description"));
    }

    #[test]
    fn valid_comment_creation_form() {
        let form = CommentCreationForm {
            content: Some("New comment".into()),
        };
        assert_eq!(form.validate().unwrap(), "New comment");
    }

    #[test]
    fn comment_form_with_wrong_field_name_is_invalid() {
        let form = CommentCreationForm::default();
        assert!(form.validate().unwrap_err().has("content"));
    }

    #[test]
    fn blank_comment_is_invalid() {
        let form = CommentCreationForm {
            content: Some("   ".into()),
        };
        assert!(form.validate().is_err());
    }
}
