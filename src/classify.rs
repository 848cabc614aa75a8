//! Issue classifier.
//!
//! A pure function of the issue's source, description keywords and structural
//! hints in its id/location. Rules are checked in table order and the first
//! match wins, so the same issue always lands in the same category.
//!
//! Keywords match whole words of the text (a trailing `s` is allowed).
//! A keyword ending in `*` is a stem and matches any word it prefixes.
//! Multi-word keywords match consecutive words.

use crate::issue::{Category, FixType, Issue, IssueSource};

/// A keyword rule: any keyword matching assigns the classification.
struct KeywordRule {
    keywords: &'static [&'static str],
    category: Category,
    fix_type: FixType,
}

/// Description keywords, strongest signal first.
const DESCRIPTION_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &[
            "injection",
            "xss",
            "csrf",
            "vulnerab*",
            "insecure",
            "secret",
            "hardcoded password",
            "debug mode",
        ],
        category: Category::SecurityPatch,
        fix_type: FixType::SecurityPatch,
    },
    KeywordRule {
        keywords: &["authenticat*", "unauthenticat*", "login", "token", "jwt", "session"],
        category: Category::Authentication,
        fix_type: FixType::Authentication,
    },
    KeywordRule {
        keywords: &["permission", "forbidden", "authoriz*", "unauthoriz*", "access denied", "403"],
        category: Category::PermissionLogic,
        fix_type: FixType::PermissionLogic,
    },
    KeywordRule {
        keywords: &["integrity*", "constraint", "foreign key", "migration", "duplicate key"],
        category: Category::DatabaseIntegrity,
        fix_type: FixType::DatabaseConstraint,
    },
    KeywordRule {
        keywords: &["validation*", "invalid", "required field", "max_length", "blank"],
        category: Category::ModelValidation,
        fix_type: FixType::ModelFieldValidation,
    },
    KeywordRule {
        keywords: &["slow", "n+1", "query count", "performance", "latency"],
        category: Category::PerformanceOptimization,
        fix_type: FixType::PerformanceOptimization,
    },
    KeywordRule {
        keywords: &["requirement", "acceptance criteria"],
        category: Category::BusinessLogic,
        fix_type: FixType::DdRequirement,
    },
    KeywordRule {
        keywords: &[
            "style",
            "spacing",
            "whitespace",
            "indent*",
            "line too long",
            "naming",
            "unused import",
            "lint",
            "format*",
        ],
        category: Category::CodeStyle,
        fix_type: FixType::CodeStyle,
    },
];

/// Identifier/location hints, checked when no description rule matched.
const STRUCTURAL_RULES: &[KeywordRule] = &[
    KeywordRule {
        keywords: &["serializer"],
        category: Category::ApiContract,
        fix_type: FixType::DjangoPattern,
    },
    KeywordRule {
        keywords: &["view", "endpoint", "api"],
        category: Category::ApiContract,
        fix_type: FixType::DjangoPattern,
    },
    KeywordRule {
        keywords: &["model"],
        category: Category::ModelValidation,
        fix_type: FixType::ModelFieldValidation,
    },
];

/// Lowercased alphanumeric words of `text`.
pub(crate) fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

fn word_matches(pattern: &str, word: &str, stem: bool) -> bool {
    if stem {
        word.starts_with(pattern)
    } else {
        word == pattern || word.strip_suffix('s') == Some(pattern)
    }
}

fn keyword_matches(keyword: &str, text: &[String]) -> bool {
    let stem = keyword.ends_with('*');
    let pattern = words(keyword.trim_end_matches('*'));
    if pattern.is_empty() || pattern.len() > text.len() {
        return false;
    }
    let last = pattern.len() - 1;
    text.windows(pattern.len()).any(|window| {
        pattern
            .iter()
            .zip(window)
            .enumerate()
            .all(|(i, (p, w))| word_matches(p, w, stem && i == last))
    })
}

fn first_match(rules: &[KeywordRule], text: &[String]) -> Option<(Category, FixType)> {
    rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| keyword_matches(k, text)))
        .map(|rule| (rule.category, rule.fix_type))
}

fn source_fallback(source: IssueSource) -> (Category, FixType) {
    match source {
        IssueSource::SecurityScan => (Category::SecurityPatch, FixType::SecurityPatch),
        IssueSource::CodeReview => (Category::CodeStyle, FixType::CodeStyle),
        IssueSource::UnitTest => (Category::BusinessLogic, FixType::BusinessRule),
    }
}

/// Computes the classification of an issue without mutating it.
pub fn classification_of(issue: &Issue) -> (Category, FixType) {
    if let Some(found) = first_match(DESCRIPTION_RULES, &words(&issue.description)) {
        return found;
    }

    let structure = words(&format!(
        "{} {}",
        issue.id,
        issue.location.as_deref().unwrap_or_default()
    ));
    if let Some(found) = first_match(STRUCTURAL_RULES, &structure) {
        return found;
    }

    source_fallback(issue.source)
}

/// Fills in category and fix type for an issue.
///
/// Classifications already present (e.g. supplied by the caller) are kept.
pub fn classify(issue: &mut Issue) {
    let (category, fix_type) = classification_of(issue);
    if issue.category.is_none() {
        issue.category = Some(category);
    }
    if issue.fix_type.is_none() {
        issue.fix_type = Some(fix_type);
    }
}

/// Classifies every issue in place.
pub fn classify_all(issues: &mut [Issue]) {
    for issue in issues.iter_mut() {
        classify(issue);
        tracing::debug!(
            issue_id = %issue.id,
            category = %issue.category_or_default(),
            fix_type = %issue.fix_type_or_default(),
            "classified issue"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(source: IssueSource, description: &str) -> Issue {
        Issue::new("id", source, description)
    }

    #[test]
    fn injection_is_security_patch() {
        let i = issue(IssueSource::SecurityScan, "SQL injection in query builder");
        assert_eq!(
            classification_of(&i),
            (Category::SecurityPatch, FixType::SecurityPatch)
        );
    }

    #[test]
    fn permission_keyword_wins_regardless_of_source() {
        let i = issue(IssueSource::UnitTest, "User without permission can delete post");
        assert_eq!(
            classification_of(&i),
            (Category::PermissionLogic, FixType::PermissionLogic)
        );
    }

    #[test]
    fn authentication_keyword() {
        let i = issue(IssueSource::UnitTest, "Authentication required for profile endpoint");
        assert_eq!(
            classification_of(&i),
            (Category::Authentication, FixType::Authentication)
        );
    }

    #[test]
    fn integrity_maps_to_database_constraint() {
        let i = issue(IssueSource::UnitTest, "IntegrityError: UNIQUE failed on email");
        assert_eq!(
            classification_of(&i),
            (Category::DatabaseIntegrity, FixType::DatabaseConstraint)
        );
    }

    #[test]
    fn structural_hint_from_identifier() {
        let i = Issue::new(
            "unit_test:tests.test_serializers.OrderSerializerTest.test_total",
            IssueSource::UnitTest,
            "AssertionError: 10 != 12",
        );
        assert_eq!(
            classification_of(&i),
            (Category::ApiContract, FixType::DjangoPattern)
        );

        let m = Issue::new("unit_test:test_models.test_str", IssueSource::UnitTest, "boom");
        assert_eq!(
            classification_of(&m),
            (Category::ModelValidation, FixType::ModelFieldValidation)
        );
    }

    #[test]
    fn unmatched_issues_fall_back_by_source() {
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "expected 3 got 4")),
            (Category::BusinessLogic, FixType::BusinessRule)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::CodeReview, "consider refactoring")),
            (Category::CodeStyle, FixType::CodeStyle)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::SecurityScan, "B101 assert used")),
            (Category::SecurityPatch, FixType::SecurityPatch)
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let i = issue(IssueSource::CodeReview, "inconsistent spacing around operator");
        let first = classification_of(&i);
        for _ in 0..10 {
            assert_eq!(classification_of(&i), first);
        }
        assert_eq!(first, (Category::CodeStyle, FixType::CodeStyle));
    }

    #[test]
    fn keywords_do_not_match_inside_other_words() {
        assert_eq!(
            classification_of(&issue(
                IssueSource::UnitTest,
                "Sensitive information exposed by order endpoint"
            )),
            (Category::BusinessLogic, FixType::BusinessRule)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "Tokenizer returns wrong count")),
            (Category::BusinessLogic, FixType::BusinessRule)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "Possession check missing on update")),
            (Category::BusinessLogic, FixType::BusinessRule)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "expected 4030 items")),
            (Category::BusinessLogic, FixType::BusinessRule)
        );
    }

    #[test]
    fn stems_plurals_and_phrases_match() {
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "Unauthenticated user sees orders")),
            (Category::Authentication, FixType::Authentication)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "expired tokens accepted")),
            (Category::Authentication, FixType::Authentication)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "GET /orders returned 403")),
            (Category::PermissionLogic, FixType::PermissionLogic)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::UnitTest, "N+1 queries on order list")),
            (Category::PerformanceOptimization, FixType::PerformanceOptimization)
        );
        assert_eq!(
            classification_of(&issue(IssueSource::CodeReview, "Inconsistent formatting")),
            (Category::CodeStyle, FixType::CodeStyle)
        );
    }

    #[test]
    fn classify_keeps_supplied_classification() {
        let mut i = issue(IssueSource::SecurityScan, "SQL injection")
            .with_classification(Category::ApiContract, FixType::Unknown);
        classify(&mut i);
        assert_eq!(i.category, Some(Category::ApiContract));
        assert_eq!(i.fix_type, Some(FixType::Unknown));
    }

    #[test]
    fn classify_all_fills_every_issue() {
        let mut issues = vec![
            issue(IssueSource::UnitTest, "token expired"),
            issue(IssueSource::CodeReview, "trailing whitespace"),
        ];
        classify_all(&mut issues);
        assert!(issues.iter().all(|i| i.category.is_some() && i.fix_type.is_some()));
    }
}
