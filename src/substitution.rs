//! Placeholder Substitution - Fixed Vocabulary, Single Pass
//!
//! Replacement is literal `{token}` matching, left to right, non-recursive.
//! Missing context values never fail; the marker is left in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The full token vocabulary. Case-sensitive, closed set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderToken {
    StudentName,
    TrackName,
    CompletionDate,
    CurrentDate,
    ManagerName,
    CompanyName,
    UserId,
}

impl PlaceholderToken {
    pub const ALL: [PlaceholderToken; 7] = [
        PlaceholderToken::StudentName,
        PlaceholderToken::TrackName,
        PlaceholderToken::CompletionDate,
        PlaceholderToken::CurrentDate,
        PlaceholderToken::ManagerName,
        PlaceholderToken::CompanyName,
        PlaceholderToken::UserId,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            PlaceholderToken::StudentName => "student_name",
            PlaceholderToken::TrackName => "track_name",
            PlaceholderToken::CompletionDate => "completion_date",
            PlaceholderToken::CurrentDate => "current_date",
            PlaceholderToken::ManagerName => "manager_name",
            PlaceholderToken::CompanyName => "company_name",
            PlaceholderToken::UserId => "user_id",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.key() == key)
    }
}

/// Identity snapshot supplied by the student record source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentProfile {
    pub student_name: String,
    pub track_name: String,
    pub user_id: String,
    #[serde(default)]
    pub completion_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub manager_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
}

/// Token -> value bindings for one substitution run.
/// Serializes as a bare `token -> value` map.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubstitutionContext {
    values: HashMap<PlaceholderToken, String>,
}

impl SubstitutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style binding.
    pub fn with(mut self, token: PlaceholderToken, value: impl Into<String>) -> Self {
        self.values.insert(token, value.into());
        self
    }

    pub fn set(&mut self, token: PlaceholderToken, value: impl Into<String>) {
        self.values.insert(token, value.into());
    }

    pub fn get(&self, token: PlaceholderToken) -> Option<&str> {
        self.values.get(&token).map(String::as_str)
    }

    pub fn from_profile(profile: &StudentProfile) -> Self {
        let mut context = Self::new()
            .with(PlaceholderToken::StudentName, &profile.student_name)
            .with(PlaceholderToken::TrackName, &profile.track_name)
            .with(PlaceholderToken::UserId, &profile.user_id);
        if let Some(date) = profile.completion_date {
            context.set(PlaceholderToken::CompletionDate, format_long_date(date));
        }
        if let Some(manager) = &profile.manager_name {
            context.set(PlaceholderToken::ManagerName, manager);
        }
        if let Some(company) = &profile.company_name {
            context.set(PlaceholderToken::CompanyName, company);
        }
        context
    }
}

/// Day + full English month name + year, e.g. "27 June 2025".
/// Locale settings never change this format.
pub fn format_long_date(date: DateTime<Utc>) -> String {
    date.format("%-d %B %Y").to_string()
}

/// Single left-to-right scan. Each recognized `{token}` is replaced by its
/// context value; `current_date` is computed internally and always resolves.
/// Everything else, including unmatched braces and unknown markers, passes
/// through literally. Replacement text is never re-scanned.
pub fn substitute(text: &str, context: &SubstitutionContext) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open..];

        let replaced = after.find('}').and_then(|close| {
            let token = PlaceholderToken::from_key(&after[1..close])?;
            let value = resolve(token, context)?;
            Some((value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                // Resume right after the brace so overlapping candidates
                // like "{x{student_name}" still match.
                out.push('{');
                rest = &after[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn resolve(token: PlaceholderToken, context: &SubstitutionContext) -> Option<String> {
    if token == PlaceholderToken::CurrentDate {
        return Some(format_long_date(Utc::now()));
    }
    context.get(token).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn replaces_bound_tokens() {
        let context = SubstitutionContext::new().with(PlaceholderToken::StudentName, "Asha");
        assert_eq!(
            substitute("Hello {student_name}", &context),
            "Hello Asha",
        );
    }

    #[test]
    fn missing_binding_is_left_literal() {
        let context = SubstitutionContext::new();
        assert_eq!(
            substitute("Hello {student_name}", &context),
            "Hello {student_name}",
        );
    }

    #[test]
    fn unknown_marker_is_left_literal() {
        let context = SubstitutionContext::new().with(PlaceholderToken::StudentName, "Asha");
        assert_eq!(
            substitute("{nope} {student_name}", &context),
            "{nope} Asha",
        );
    }

    #[test]
    fn unbalanced_brace_passes_through() {
        let context = SubstitutionContext::new().with(PlaceholderToken::StudentName, "Asha");
        assert_eq!(
            substitute("brace { and {student_name}", &context),
            "brace { and Asha",
        );
    }

    #[test]
    fn overlapping_candidate_still_matches() {
        let context = SubstitutionContext::new().with(PlaceholderToken::StudentName, "Asha");
        assert_eq!(substitute("{x{student_name}", &context), "{xAsha");
    }

    #[test]
    fn substitution_is_single_pass() {
        // A value that itself looks like a token must not be re-expanded.
        let context = SubstitutionContext::new()
            .with(PlaceholderToken::StudentName, "{track_name}")
            .with(PlaceholderToken::TrackName, "Systems");
        assert_eq!(substitute("{student_name}", &context), "{track_name}");
    }

    #[test]
    fn current_date_ignores_context() {
        let context = SubstitutionContext::new().with(PlaceholderToken::CurrentDate, "overridden");
        let output = substitute("{current_date}", &context);
        assert_ne!(output, "overridden");
        assert!(!output.contains('{'));
    }

    #[test]
    fn long_date_format() {
        let date = Utc.with_ymd_and_hms(2025, 6, 27, 12, 0, 0).unwrap();
        assert_eq!(format_long_date(date), "27 June 2025");
    }

    #[test]
    fn context_from_profile_binds_identity() {
        let profile = StudentProfile {
            student_name: "Asha Rao".to_string(),
            track_name: "Systems".to_string(),
            user_id: "u-1042".to_string(),
            completion_date: Some(Utc.with_ymd_and_hms(2025, 6, 27, 0, 0, 0).unwrap()),
            manager_name: Some("Priya N".to_string()),
            company_name: None,
        };
        let context = SubstitutionContext::from_profile(&profile);

        assert_eq!(
            substitute("{student_name} / {track_name} / {user_id}", &context),
            "Asha Rao / Systems / u-1042",
        );
        assert_eq!(
            substitute("{completion_date}", &context),
            "27 June 2025",
        );
        // Unbound company_name stays literal.
        assert_eq!(
            substitute("{manager_name} at {company_name}", &context),
            "Priya N at {company_name}",
        );
    }

    #[test]
    fn full_context_leaves_no_tokens() {
        let mut context = SubstitutionContext::new();
        for token in PlaceholderToken::ALL {
            context.set(token, "x");
        }
        let text = PlaceholderToken::ALL
            .map(|t| format!("{{{}}}", t.key()))
            .join(" ");
        let output = substitute(&text, &context);
        for token in PlaceholderToken::ALL {
            assert!(!output.contains(&format!("{{{}}}", token.key())));
        }
    }
}
