//! Prompt construction for commit message generation.

use std::sync::LazyLock;

use regex_lite::Regex;

/// Maximum bytes of diff text sent to the provider.
pub const MAX_DIFF_BYTES: usize = 30_000;

const TRUNCATION_NOTE: &str =
    "\n[diff truncated; summarize the visible changes and the file list]";

/// Fixed system instruction: house style plus the required JSON shape.
pub const SYSTEM_INSTRUCTION: &str = r#"You are an expert at writing concise, meaningful Git commit messages following the Conventional Commits format.
Analyze the git diff and generate:
1. A summary (max 50 chars): type(scope): brief description
2. A detailed description explaining what changed and why
3. Commit type: feat, fix, docs, style, refactor, test, or chore

Respond with ONLY a JSON object:
{
  "summary": "feat(auth): add user authentication",
  "description": "Implemented JWT-based authentication with login/logout. Added middleware for protected routes and session management.",
  "type": "feat"
}"#;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)|\x1b[@-Z\\-_]")
        .expect("Invalid regex")
});

/// Build the user message for one generation request.
pub fn build_user_prompt(diff: &str, changed_files: &[String]) -> String {
    let files_section = changed_files
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Analyze this git diff and generate a commit message:\n\n\
         Changed Files:\n{files_section}\n\n\
         Git Diff:\n```diff\n{diff}\n```\n\n\
         Generate a commit message following conventional commits format.",
        diff = sanitize_diff(diff, MAX_DIFF_BYTES),
    )
}

/// Clean diff text for inclusion in a prompt.
///
/// Strips ANSI escapes, then control characters other than newline and tab,
/// then truncates to `max_bytes` on a char boundary, appending a note when
/// anything was cut.
pub fn sanitize_diff(text: &str, max_bytes: usize) -> String {
    let stripped = ANSI_ESCAPE.replace_all(text, "");
    let mut result: String = stripped
        .chars()
        .filter(|c| !c.is_control() || *c == '\n' || *c == '\t')
        .collect();

    if result.len() > max_bytes {
        let mut end = max_bytes;
        while end > 0 && !result.is_char_boundary(end) {
            end -= 1;
        }
        result.truncate(end);
        result.push_str(TRUNCATION_NOTE);
    }

    result
}
