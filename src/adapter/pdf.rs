//! Page text from PDF sources

use lopdf::Document;
use std::io::Cursor;
use tracing::debug;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Whether the bytes carry a PDF header. Some producers put junk before it,
/// so the first kilobyte is searched.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(1024)]
        .windows(PDF_MAGIC.len())
        .any(|window| window == PDF_MAGIC)
}

/// Text of each page in page order, at most `limit` pages.
///
/// A page whose text cannot be extracted comes back empty so later pages
/// keep their numbers.
pub fn page_texts(bytes: &[u8], limit: Option<usize>) -> Result<Vec<String>, lopdf::Error> {
    let doc = Document::load_from(Cursor::new(bytes))?;
    let pages = doc.get_pages();
    let take = limit.unwrap_or(usize::MAX);

    let mut texts = Vec::with_capacity(pages.len().min(take));
    for &number in pages.keys().take(take) {
        match doc.extract_text(&[number]) {
            Ok(text) => texts.push(text),
            Err(e) => {
                debug!(page = number, error = %e, "page text not extractable");
                texts.push(String::new());
            }
        }
    }
    if pages.len() > take {
        debug!(pages = pages.len(), limit = take, "pages past the limit ignored");
    }
    Ok(texts)
}
