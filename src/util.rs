//! Small utility helpers used across modules.

/// Log-safe truncation for large strings (SQL text in particular).
/// Cuts on a char boundary so multi-byte text never panics.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}… ({} bytes total)", &s[..end], s.len())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncates_on_char_boundaries() {
    assert_eq!(trunc_for_log("SELECT 1", 80), "SELECT 1");
    assert_eq!(trunc_for_log("SELECT 'é'", 9), "SELECT '… (11 bytes total)");
  }
}
