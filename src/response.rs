use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseError {
    /// The response has an opening code fence but no closing one.
    UnterminatedFence,

    /// No code fence and nothing that looks like an encoding.
    NoCode,
}

impl fmt::Display for ResponseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResponseError::UnterminatedFence => write!(f, "unterminated code fence"),
            ResponseError::NoCode => write!(f, "no code found in response"),
        }
    }
}

/// Extracts the encoding from a raw model response.
///
/// Models usually wrap code in a markdown fence, with or without a language
/// tag, and often surround it with prose. We take the first fenced block.
/// A bare response that opens with a define form is accepted as-is, since
/// some prompts ask for code with no markup at all.
pub fn extract_code(content: &str) -> Result<String, ResponseError> {
    if let Some(start) = content.find("```") {
        let after_fence = &content[start + 3..];
        // The rest of the fence line is a language tag; drop it.
        let body_start = match after_fence.find('\n') {
            Some(i) => i + 1,
            None => return Err(ResponseError::UnterminatedFence),
        };
        let body = &after_fence[body_start..];
        let end = body.find("```").ok_or(ResponseError::UnterminatedFence)?;
        return Ok(body[..end].trim().to_string());
    }

    let trimmed = content.trim();
    if trimmed.starts_with("(define") || trimmed.starts_with(';') {
        return Ok(trimmed.to_string());
    }
    Err(ResponseError::NoCode)
}
