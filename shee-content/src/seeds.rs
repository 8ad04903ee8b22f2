use tracing::info;

use shee_database::Database;
use shee_database::impls::templates::insert_warning_templates;

use crate::violation::ViolationType;

/// Hard-coded bilingual fallbacks, two per violation type, so a warning pool
/// never starts from zero.
pub fn default_warning_templates(violation_type: ViolationType) -> [(String, i32); 2] {
    let pair: [&str; 2] = match violation_type {
        ViolationType::Spam => [
            "Sabar dulu {user}! Pelan-pelan aja chatnya, no need to flood ya.",
            "Hey {user}, easy on the spam — give the chat some breathing room ya.",
        ],
        ViolationType::Badword => [
            "Eh {user}, jaga kata-kata ya! Let's keep it friendly di sini.",
            "{user}, watch your language please — di server ini kita saling respect ya.",
        ],
        ViolationType::Link => [
            "{user}, link itu belum diizinkan di sini ya. Please check the rules dulu!",
            "Hold up {user} — that link isn't on our allowed list ya.",
        ],
    };

    pair.map(|content| (content.to_owned(), 1))
}

/// Insert the bilingual defaults for one violation type.
pub async fn seed_warning_defaults(
    db: &Database,
    violation_type: ViolationType,
) -> anyhow::Result<u64> {
    let entries = default_warning_templates(violation_type);
    let inserted = insert_warning_templates(db, violation_type.as_str(), &entries).await?;
    info!(%violation_type, inserted, "seeded default warning templates");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::default_warning_templates;
    use crate::violation::ViolationType;

    #[test]
    fn two_seeds_per_type_with_user_placeholder() {
        for violation_type in ViolationType::ALL {
            let seeds = default_warning_templates(violation_type);
            assert_eq!(seeds.len(), 2);
            for (content, severity) in &seeds {
                assert!(content.contains("{user}"), "seed missing placeholder: {content}");
                assert_eq!(*severity, 1);
            }
        }
    }
}
