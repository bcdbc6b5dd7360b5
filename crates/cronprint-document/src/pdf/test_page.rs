// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test page generator: a minimal, fully deterministic single-page PDF used to
// prove the print path works without needing a real document on disk.
//
// The file is written by hand rather than through a PDF library so that the
// output is byte-for-byte reproducible: no producer string, no creation date,
// no document ID.  Layout:
//
// ```text
// %PDF-1.4
// 1 0 obj  Catalog  -> /Pages 2 0 R
// 2 0 obj  Pages    -> /Kids [3 0 R] /Count 1
// 3 0 obj  Page     -> /Contents 4 0 R, /Font << /F1 5 0 R >>
// 4 0 obj  content stream (one line of text)
// 5 0 obj  Type1 Helvetica (standard 14 font, not embedded)
// xref     6 entries, 10-digit zero-padded offsets
// trailer  << /Size 6 /Root 1 0 R >>
// startxref <offset of xref>
// %%EOF
// ```

use tracing::debug;

/// Number of indirect objects in the generated document.
pub const OBJECT_COUNT: usize = 5;

/// Object number of the document catalog (`/Root`).
const CATALOG_OBJECT: usize = 1;

/// US Letter in PDF points.
const MEDIA_BOX: &str = "[0 0 612 792]";

/// Fixed prefix of the single line drawn on the page.
const HEADLINE: &str = "cronprint test page";

/// Generate the test page for `label`.
///
/// Calling this twice with the same label yields identical bytes.
pub fn generate(label: &str) -> Vec<u8> {
    let mut writer = PdfObjectWriter::new();

    writer.object(
        CATALOG_OBJECT,
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
    );
    writer.object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string());
    writer.object(
        3,
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox {MEDIA_BOX} /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> >> >>"
        ),
    );

    let content = format!(
        "BT /F1 24 Tf 72 700 Td ({}) Tj ET",
        escape_pdf_string(&format!("{HEADLINE} - {label}"))
    );
    writer.object(
        4,
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
    );

    writer.object(
        5,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_string(),
    );

    let bytes = writer.finish(CATALOG_OBJECT);
    debug!(label, bytes = bytes.len(), "generated test page");
    bytes
}

// ---------------------------------------------------------------------------
// Object writer
// ---------------------------------------------------------------------------

/// Appends numbered objects and remembers where each one starts so the
/// cross-reference table can point at them.
struct PdfObjectWriter {
    buf: Vec<u8>,
    /// Byte offset of each object's `N 0 obj` line, indexed by `N - 1`.
    offsets: Vec<usize>,
}

impl PdfObjectWriter {
    fn new() -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(b"%PDF-1.4\n");
        Self {
            buf,
            offsets: Vec::with_capacity(OBJECT_COUNT),
        }
    }

    /// Write object `number`. Objects must be written in ascending order
    /// starting at 1.
    fn object(&mut self, number: usize, body: String) {
        debug_assert_eq!(number, self.offsets.len() + 1, "objects out of order");
        self.offsets.push(self.buf.len());
        self.buf
            .extend_from_slice(format!("{number} 0 obj\n{body}\nendobj\n").as_bytes());
    }

    /// Append the xref table, trailer and `startxref` pointer.
    fn finish(mut self, root: usize) -> Vec<u8> {
        let xref_offset = self.buf.len();
        let size = self.offsets.len() + 1;

        let mut tail = format!("xref\n0 {size}\n0000000000 65535 f \n");
        for offset in &self.offsets {
            // Each entry is exactly 20 bytes including the two-byte EOL.
            tail.push_str(&format!("{offset:010} 00000 n \n"));
        }
        tail.push_str(&format!(
            "trailer\n<< /Size {size} /Root {root} 0 R >>\nstartxref\n{xref_offset}\n%%EOF\n"
        ));

        self.buf.extend_from_slice(tail.as_bytes());
        self.buf
    }
}

/// Escape text for a PDF literal string.
///
/// Parentheses and backslashes are escaped; anything outside printable ASCII
/// becomes `?` because the standard Helvetica encoding cannot show it.
fn escape_pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => out.push('?'),
        }
    }
    out
}
