//! Markers distinguishing complete standalone documents from vector
//! fragments among stored artifacts. The visuals page embeds vector
//! markup inline and iframes full documents.

pub const HTML_DOC_PREFIX: &str = "<!DOCTYPE html>";
pub const XML_DOC_PREFIX: &str = "<?xml";

pub fn is_html_document(artifact: &str) -> bool {
    artifact.trim_start().starts_with(HTML_DOC_PREFIX)
}

pub fn is_vector_markup(artifact: &str) -> bool {
    let trimmed = artifact.trim_start();
    trimmed.starts_with(XML_DOC_PREFIX) || trimmed.starts_with("<svg")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_artifacts() {
        assert!(is_html_document("<!DOCTYPE html><html></html>"));
        assert!(is_vector_markup("<svg xmlns=\"http://www.w3.org/2000/svg\"/>"));
        assert!(is_vector_markup("<?xml version=\"1.0\"?><svg/>"));
        assert!(!is_html_document("<svg/>"));
        assert!(!is_vector_markup("<!DOCTYPE html>"));
    }
}
