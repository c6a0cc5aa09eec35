use std::path::Path;

use crate::gl::driver::Stage;
use crate::gl::error::GlError;

const MARKER: &str = "#shader";

/// Vertex and fragment sources split out of one annotated file.
///
/// File format: a line containing `#shader` plus `vertex` or `fragment`
/// starts a section; every following line belongs to it until the next
/// marker. Lines before the first marker are discarded.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct ShaderSource {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSource {
    /// Reads and splits the file at `path`.
    ///
    /// A file that cannot be read is `FileNotFound`; one that is not UTF-8
    /// is `MalformedShaderFile` at the first undecodable line.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, GlError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| GlError::FileNotFound {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes)
            .map_err(|e| undecodable_line(e.as_bytes(), e.utf8_error().valid_up_to()))?;

        log::debug!("loaded shader file {}", path.display());
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, GlError> {
        let mut out = ShaderSource::default();
        let mut active: Option<Stage> = None;
        let mut discarded = 0usize;

        for (index, line) in text.lines().enumerate() {
            if line.contains(MARKER) {
                active = Some(if line.contains("vertex") {
                    Stage::Vertex
                } else if line.contains("fragment") {
                    Stage::Fragment
                } else {
                    return Err(GlError::MalformedShaderFile {
                        line: index + 1,
                        text: line.to_string(),
                    });
                });
                continue;
            }

            let section = match active {
                Some(Stage::Vertex) => &mut out.vertex,
                Some(Stage::Fragment) => &mut out.fragment,
                None => {
                    discarded += 1;
                    continue;
                }
            };
            section.push_str(line);
            section.push('\n');
        }

        if discarded > 0 {
            log::debug!("discarded {discarded} line(s) before the first {MARKER} marker");
        }

        Ok(out)
    }

    pub fn stage(&self, stage: Stage) -> &str {
        match stage {
            Stage::Vertex => &self.vertex,
            Stage::Fragment => &self.fragment,
        }
    }

    /// Both stages have source text.
    pub fn is_complete(&self) -> bool {
        !self.vertex.is_empty() && !self.fragment.is_empty()
    }
}

fn undecodable_line(bytes: &[u8], bad: usize) -> GlError {
    let (before, after) = bytes.split_at(bad);
    let start = before.iter().rposition(|&b| b == b'\n').map_or(0, |i| i + 1);
    let end = after.iter().position(|&b| b == b'\n').map_or(bytes.len(), |i| bad + i);
    GlError::MalformedShaderFile {
        line: before.iter().filter(|&&b| b == b'\n').count() + 1,
        text: String::from_utf8_lossy(&bytes[start..end]).into_owned(),
    }
}
