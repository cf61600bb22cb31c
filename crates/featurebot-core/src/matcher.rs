//! Post definition matching.
//!
//! An observed post belongs to the first definition, in configuration order,
//! whose `pin_check` is a prefix of the post's name. Definitions whose prefixes
//! overlap are resolved purely by that order. An empty `pin_check` never
//! matches anything.

use crate::definitions::PostDefinition;

/// Return the first definition whose `pin_check` prefixes `post_name`.
pub fn match_definition<'a>(
    definitions: &'a [PostDefinition],
    post_name: &str,
) -> Option<&'a PostDefinition> {
    definitions
        .iter()
        .find(|def| !def.pin_check.is_empty() && post_name.starts_with(def.pin_check.as_str()))
}

/// Index pairs `(earlier, later)` where the earlier definition's `pin_check`
/// is a prefix of the later one's, so the later can never match.
pub fn shadowed_definitions(definitions: &[PostDefinition]) -> Vec<(usize, usize)> {
    let mut shadowed = Vec::new();
    for (i, earlier) in definitions.iter().enumerate() {
        if earlier.pin_check.is_empty() {
            continue;
        }
        for (j, later) in definitions.iter().enumerate().skip(i + 1) {
            if later.pin_check.starts_with(earlier.pin_check.as_str()) {
                shadowed.push((i, j));
            }
        }
    }
    shadowed
}
