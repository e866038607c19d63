//! Canonical text fed to the embedding provider.
//!
//! Ingestion and live queries must both go through [`build_text`]. Any
//! change to the layout moves every query away from every stored vector, so
//! an existing corpus has to be rebuilt after editing this file.

/// Build the canonical text for a pull request.
///
/// Line 1 is `Title: <title>`, line 2 is `Body: <body>`, then one changed
/// filename per line in the order given. No trailing newline.
pub fn build_text<S: AsRef<str>>(title: &str, body: &str, filenames: &[S]) -> String {
    let mut lines = Vec::with_capacity(filenames.len() + 2);
    lines.push(format!("Title: {title}"));
    lines.push(format!("Body: {body}"));
    lines.extend(filenames.iter().map(|f| f.as_ref().to_string()));
    lines.join("\n")
}
