use std::path::Path;
use thiserror::Error;

/// Extensions accepted for extraction, lowercase with the dot.
pub const ALLOWED_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".png", ".jpg", ".jpeg"];

pub const MAX_FILE_SIZE: usize = 10 * 1024 * 1024;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum UploadError {
    #[error("No file name was provided")]
    MissingFilename,
    #[error("No file uploaded")]
    Empty,
    #[error("Invalid file type '{0}'. Allowed types: .pdf, .doc, .docx, .png, .jpg, .jpeg")]
    UnsupportedExtension(String),
    #[error("File is {size} bytes, the limit is {max} bytes")]
    TooLarge { size: usize, max: usize },
}

/// Lowercased extension of `filename` including the dot, or an empty string.
pub fn file_extension(filename: &str) -> String {
    Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{}", ext.to_lowercase()))
        .unwrap_or_default()
}

/// Checks an upload before any record exists for it.
pub fn validate_upload(filename: &str, size: usize) -> Result<(), UploadError> {
    if filename.trim().is_empty() {
        return Err(UploadError::MissingFilename);
    }
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > MAX_FILE_SIZE {
        return Err(UploadError::TooLarge { size, max: MAX_FILE_SIZE });
    }

    let extension = file_extension(filename);
    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(UploadError::UnsupportedExtension(extension));
    }

    Ok(())
}

/// The declared content type, or one guessed from the file name.
pub fn resolve_mime_type(filename: &str, declared: Option<&str>) -> String {
    match declared.map(str::trim) {
        Some(mime) if !mime.is_empty() && mime != "application/octet-stream" => mime.to_string(),
        _ => mime_guess::from_path(filename).first_or_octet_stream().essence_str().to_string(),
    }
}

/// Name under which the upload is kept on disk.
pub fn stored_name(filename: &str) -> String {
    format!("{}{}", uuid::Uuid::new_v4(), file_extension(filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowed_extensions_are_case_insensitive() {
        tokio_test::assert_ok!(validate_upload("invoice.PDF", 10));
        tokio_test::assert_ok!(validate_upload("scan.JpEg", 10));
        tokio_test::assert_ok!(validate_upload("letter.docx", 10));
        tokio_test::assert_err!(validate_upload("notes.txt", 10));
    }

    #[test]
    fn test_rejections() {
        assert_eq!(validate_upload("", 10), Err(UploadError::MissingFilename));
        assert_eq!(validate_upload("a.pdf", 0), Err(UploadError::Empty));
        assert_eq!(
            validate_upload("sheet.xlsx", 10),
            Err(UploadError::UnsupportedExtension(".xlsx".to_string()))
        );
        assert_eq!(validate_upload("README", 10), Err(UploadError::UnsupportedExtension(String::new())));
        assert_eq!(
            validate_upload("big.pdf", MAX_FILE_SIZE + 1),
            Err(UploadError::TooLarge { size: MAX_FILE_SIZE + 1, max: MAX_FILE_SIZE })
        );
        assert!(validate_upload("edge.pdf", MAX_FILE_SIZE).is_ok());
    }

    #[test]
    fn test_resolve_mime_type() {
        assert_eq!(resolve_mime_type("a.pdf", Some("application/pdf")), "application/pdf");
        assert_eq!(resolve_mime_type("a.png", None), "image/png");
        assert_eq!(resolve_mime_type("a.jpg", Some("application/octet-stream")), "image/jpeg");
    }

    #[test]
    fn test_stored_name_keeps_extension() {
        let name = stored_name("Scan.PNG");
        assert!(name.ends_with(".png"));
        assert_ne!(name, stored_name("Scan.PNG"));
    }
}
